use std::path::PathBuf;
use std::time::Duration;

use zk_executor_common::MAX_BATCH_L2_DATA_SIZE;

use crate::telemetry::DEFAULT_WINDOW;

pub mod cli;

/// Runtime behavior of the executor service.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutorConfig {
    pub max_batch_l2_data_size: usize,
    /// Reported in every response and in the flush status.
    pub prover_id: String,
    /// Where request and response dumps are written.
    pub output_dir: PathBuf,
    pub save_request_to_file: bool,
    pub save_response_to_file: bool,
    /// Log every response in full.
    pub log_executor_server_responses: bool,
    /// Append per-transaction details to the summary log line.
    pub log_executor_server_txs: bool,
    /// Log every request on arrival.
    pub log_executor_server_input: bool,
    /// Log the request of any batch executed below this many gas per second.
    /// Zero disables it.
    pub log_executor_server_input_gas_threshold: f64,
    pub opcode_tracer: bool,
    /// Log the accumulated time per phase after every batch.
    pub log_time_metrics: bool,
    pub throughput_window: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_batch_l2_data_size: MAX_BATCH_L2_DATA_SIZE,
            prover_id: String::new(),
            output_dir: PathBuf::from("runtime"),
            save_request_to_file: false,
            save_response_to_file: false,
            log_executor_server_responses: false,
            log_executor_server_txs: false,
            log_executor_server_input: false,
            log_executor_server_input_gas_threshold: 0.0,
            opcode_tracer: false,
            log_time_metrics: false,
            throughput_window: DEFAULT_WINDOW,
        }
    }
}
