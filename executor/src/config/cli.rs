use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, ValueHint};
use uuid::Uuid;
use zk_executor_common::MAX_BATCH_L2_DATA_SIZE;

const HELP_HEADING: &str = "Executor options";

/// Command line and environment form of [`super::ExecutorConfig`].
#[derive(Args, Clone, PartialEq, Debug)]
pub struct CliExecutorConfig {
    /// Largest accepted batch L2 data payload, in bytes.
    #[arg(long, env = "ZK_EXECUTOR_MAX_BATCH_L2_DATA_SIZE", help_heading = HELP_HEADING, default_value_t = MAX_BATCH_L2_DATA_SIZE)]
    max_batch_l2_data_size: usize,
    /// Identifier reported in responses. A random one is generated when
    /// empty.
    #[arg(long, env = "ZK_EXECUTOR_PROVER_ID", help_heading = HELP_HEADING, default_value = "")]
    prover_id: String,
    /// Directory where request and response dumps are written.
    #[arg(short = 'o', long, env = "ZK_EXECUTOR_OUTPUT_DIR", value_hint = ValueHint::DirPath, help_heading = HELP_HEADING, default_value = "runtime")]
    output_dir: PathBuf,
    /// Dump every request to the output directory.
    #[arg(long, env = "ZK_EXECUTOR_SAVE_REQUEST_TO_FILE", help_heading = HELP_HEADING, default_value_t = false)]
    save_request_to_file: bool,
    /// Dump every response to the output directory.
    #[arg(long, env = "ZK_EXECUTOR_SAVE_RESPONSE_TO_FILE", help_heading = HELP_HEADING, default_value_t = false)]
    save_response_to_file: bool,
    /// Log every response in full.
    #[arg(long, env = "ZK_EXECUTOR_LOG_SERVER_RESPONSES", help_heading = HELP_HEADING, default_value_t = false)]
    log_executor_server_responses: bool,
    /// Log per-transaction gas and error details.
    #[arg(long, env = "ZK_EXECUTOR_LOG_SERVER_TXS", help_heading = HELP_HEADING, default_value_t = false)]
    log_executor_server_txs: bool,
    /// Log every request on arrival.
    #[arg(long, env = "ZK_EXECUTOR_LOG_SERVER_INPUT", help_heading = HELP_HEADING, default_value_t = false)]
    log_executor_server_input: bool,
    /// Log the request of batches executed below this many gas per second.
    #[arg(long, env = "ZK_EXECUTOR_LOG_SERVER_INPUT_GAS_THRESHOLD", help_heading = HELP_HEADING, default_value_t = 0.0)]
    log_executor_server_input_gas_threshold: f64,
    /// Log a per-opcode summary after every batch.
    #[arg(long, env = "ZK_EXECUTOR_OPCODE_TRACER", help_heading = HELP_HEADING, default_value_t = false)]
    opcode_tracer: bool,
    /// Log the accumulated time per phase after every batch.
    #[arg(long, env = "ZK_EXECUTOR_LOG_TIME_METRICS", help_heading = HELP_HEADING, default_value_t = false)]
    log_time_metrics: bool,
    /// Length of the throughput window, in seconds.
    #[arg(long, env = "ZK_EXECUTOR_THROUGHPUT_WINDOW", help_heading = HELP_HEADING, default_value_t = 10)]
    throughput_window: u64,
}

impl From<CliExecutorConfig> for super::ExecutorConfig {
    fn from(cli: CliExecutorConfig) -> Self {
        Self {
            max_batch_l2_data_size: cli.max_batch_l2_data_size,
            prover_id: if cli.prover_id.is_empty() {
                Uuid::new_v4().to_string()
            } else {
                cli.prover_id
            },
            output_dir: cli.output_dir,
            save_request_to_file: cli.save_request_to_file,
            save_response_to_file: cli.save_response_to_file,
            log_executor_server_responses: cli.log_executor_server_responses,
            log_executor_server_txs: cli.log_executor_server_txs,
            log_executor_server_input: cli.log_executor_server_input,
            log_executor_server_input_gas_threshold: cli.log_executor_server_input_gas_threshold,
            opcode_tracer: cli.opcode_tracer,
            log_time_metrics: cli.log_time_metrics,
            throughput_window: Duration::from_secs(cli.throughput_window),
        }
    }
}
