//! The executor service: validation, dispatch and assembly of one batch,
//! the streaming loop built on it, and the flush status query.

use std::fmt::{Display, Write as _};
use std::pin::pin;
use std::sync::Arc;
use std::time::Instant;

use futures::{Sink, SinkExt, Stream, StreamExt};
use hashdb::{FlushStatus, HashDb};
use tracing::{error, info};
use uuid::Uuid;

use crate::codec::CodecError;
use crate::config::ExecutorConfig;
use crate::errors::{UnknownRomErrorTag, ZkResult};
use crate::executor::{ExecutionResult, Executor};
use crate::fs::{spawn_dump, DumpKind};
use crate::request::BatchRequest;
use crate::response;
use crate::telemetry::{opcode_summary, BatchSample, Throughput, TimeMetricStorage};
use crate::wire::{ProcessBatchRequest, ProcessBatchResponse};

#[derive(Debug, thiserror::Error)]
pub enum ProcessBatchError {
    /// The request was rejected before reaching the executor.
    #[error("request cancelled: {0}")]
    Cancelled(#[from] CodecError),
    /// The executor and this service disagree on the error vocabulary. The
    /// process is not expected to keep running after this.
    #[error("integration defect: {0}")]
    IntegrationDefect(#[from] UnknownRomErrorTag),
    #[error("batch worker failed: {0}")]
    Worker(#[from] tokio::task::JoinError),
}

/// Why a batch stream stopped. Every variant is a cancellation; responses
/// written before it stand.
#[derive(Debug, thiserror::Error)]
pub enum StreamTermination {
    /// The peer ended the stream.
    #[error("stream closed by peer, processed={processed}")]
    Closed { processed: u64 },
    /// The next request could not be read or parsed.
    #[error("failed reading request, processed={processed}")]
    ReadFailed { processed: u64 },
    #[error("failed processing request, processed={processed}: {source}")]
    ProcessFailed {
        processed: u64,
        #[source]
        source: ProcessBatchError,
    },
    #[error("failed writing response, processed={processed}")]
    WriteFailed { processed: u64 },
}

pub struct ExecutorService {
    executor: Arc<dyn Executor>,
    db: Arc<dyn HashDb>,
    config: ExecutorConfig,
    throughput: Throughput,
    time_metrics: TimeMetricStorage,
}

impl ExecutorService {
    pub fn new(executor: Arc<dyn Executor>, db: Arc<dyn HashDb>, config: ExecutorConfig) -> Self {
        Self {
            executor,
            db,
            throughput: Throughput::new(config.throughput_window),
            config,
            time_metrics: TimeMetricStorage::default(),
        }
    }

    pub fn throughput(&self) -> &Throughput {
        &self.throughput
    }

    pub fn time_metrics(&self) -> &TimeMetricStorage {
        &self.time_metrics
    }

    /// Snapshot of the store's durability pipeline, unmodified.
    pub fn get_flush_status(&self) -> FlushStatus {
        self.db.flush_status()
    }

    /// Runs one batch through validation, execution and assembly.
    ///
    /// Blocks for as long as the executor does. A batch the executor fails
    /// still yields `Ok`, with the failure in the response's `error` field.
    pub fn process_batch(
        &self,
        wire: &ProcessBatchRequest,
    ) -> Result<ProcessBatchResponse, ProcessBatchError> {
        let started = Instant::now();
        let uuid = Uuid::new_v4();

        if self.config.save_request_to_file {
            spawn_dump(&self.config.output_dir, &uuid, DumpKind::Request, wire.clone());
        }
        if self.config.log_executor_server_input {
            info!("ProcessBatch() got request: {}", to_json(wire));
        }

        let request = BatchRequest::from_wire(wire, self.config.max_batch_l2_data_size, uuid)?;
        self.time_metrics.add("validate", started.elapsed(), 1);
        info!("ProcessBatch() got {}", input_summary(&request));

        let result = self.dispatch(&request);
        if !result.result.is_success() {
            error!(
                "ProcessBatch() detected result={} uuid={uuid}",
                result.result
            );
        }

        let assembling = Instant::now();
        let response = response::assemble(&request, &result, &self.config.prover_id)
            .inspect_err(|e| error!("ProcessBatch() {e} uuid={uuid}"))?;
        self.time_metrics.add("assemble", assembling.elapsed(), 1);

        info!("ProcessBatch() returns {}", self.output_summary(&request, &result));
        if self.config.log_executor_server_responses {
            info!("ProcessBatch() returns:\n{}", to_json(&response));
        }
        if self.config.save_response_to_file {
            spawn_dump(
                &self.config.output_dir,
                &uuid,
                DumpKind::Response,
                response.clone(),
            );
        }
        if self.config.opcode_tracer {
            info!("{}", opcode_summary(&result.opcodes));
        }
        if self.config.log_time_metrics {
            info!("{}", self.time_metrics.report("ProcessBatch() time metrics"));
        }

        self.record_throughput(
            wire,
            BatchSample {
                gas: response.cumulative_gas_used,
                bytes: wire.batch_l2_data.len() as u64,
                txs: response.responses.len() as u64,
                elapsed: started.elapsed(),
            },
        );
        Ok(response)
    }

    /// [`Self::process_batch`] on a blocking worker.
    pub async fn process_batch_blocking(
        self: &Arc<Self>,
        wire: ProcessBatchRequest,
    ) -> Result<ProcessBatchResponse, ProcessBatchError> {
        let service = Arc::clone(self);
        tokio::task::spawn_blocking(move || service.process_batch(&wire)).await?
    }

    /// Reads requests and writes one response per request, in order, until
    /// reading, processing or writing fails.
    pub async fn process_batch_stream<S, E, K>(
        self: Arc<Self>,
        requests: S,
        responses: K,
    ) -> StreamTermination
    where
        S: Stream<Item = Result<ProcessBatchRequest, E>>,
        E: Display,
        K: Sink<ProcessBatchResponse>,
        K::Error: Display,
    {
        info!("ProcessBatchStream() stream starts");
        let mut requests = pin!(requests);
        let mut responses = pin!(responses);
        let mut processed = 0;
        let termination = loop {
            let request = match requests.next().await {
                Some(Ok(request)) => request,
                Some(Err(e)) => {
                    error!("ProcessBatchStream() failed reading request: {e}");
                    break StreamTermination::ReadFailed { processed };
                }
                None => break StreamTermination::Closed { processed },
            };
            let response = match self.process_batch_blocking(request).await {
                Ok(response) => response,
                Err(source) => break StreamTermination::ProcessFailed { processed, source },
            };
            if let Err(e) = responses.send(response).await {
                error!("ProcessBatchStream() failed writing response: {e}");
                break StreamTermination::WriteFailed { processed };
            }
            processed += 1;
        };
        error!("ProcessBatchStream() {termination}");
        termination
    }

    fn dispatch(&self, request: &BatchRequest) -> ExecutionResult {
        if !self.executor.supports_fork(request.fork_id) {
            error!(
                "ProcessBatch() got unsupported forkID={} uuid={}",
                request.fork_id, request.uuid
            );
            return ExecutionResult::from_result(ZkResult::InvalidForkId);
        }
        let started = Instant::now();
        let result = self.executor.execute(request);
        self.time_metrics.add("execute", started.elapsed(), 1);
        result
    }

    fn output_summary(&self, request: &BatchRequest, result: &ExecutionResult) -> String {
        let c = &result.counters;
        let mut s = format!(
            "result={} new_state_root={:?} new_acc_input_hash={:?} new_local_exit_root={:?} \
             steps={} gasUsed={} counters.keccakF={} counters.poseidonG={} \
             counters.paddingPG={} counters.memAlign={} counters.arith={} counters.binary={} \
             flush_id={} last_sent_flush_id={} externalRequestId={} nTxs={}",
            result.result,
            result.new_state_root,
            result.new_acc_input_hash,
            result.new_local_exit_root,
            c.steps,
            result.cumulative_gas_used,
            c.keccak_f,
            c.poseidon_g,
            c.padding_pg,
            c.mem_align,
            c.arith,
            c.binary,
            result.flush_id,
            result.last_sent_flush_id,
            request.external_request_id,
            result.responses.len(),
        );
        if self.config.log_executor_server_txs {
            for (i, tx) in result.responses.iter().enumerate() {
                let _ = write!(
                    s,
                    " tx[{i}].hash={:?} gasUsed={} gasLeft={} gasUsed+gasLeft={} gasRefunded={} error={}",
                    tx.tx_hash,
                    tx.gas_used,
                    tx.gas_left,
                    tx.gas_used.saturating_add(tx.gas_left),
                    tx.gas_refunded,
                    tx.error,
                );
            }
        }
        s
    }

    fn record_throughput(&self, wire: &ProcessBatchRequest, sample: BatchSample) {
        let totals = self.throughput.record(sample);
        let rates = sample.rates();
        info!(
            "ProcessBatch() done counter={} B={} TX={} gas={} time={:.6} \
             TP={:.2}B/s={:.2}TX/s={:.2}gas/s={:.2}gas/B \
             totalTP(window)={:.2}B/s={:.2}TX/s={:.2}gas/s={:.2}gas/B \
             totalTP(ever)={:.2}B/s={:.2}TX/s={:.2}gas/s={:.2}gas/B totalTime={:.6}",
            totals.counter,
            sample.bytes,
            sample.txs,
            sample.gas,
            sample.elapsed.as_secs_f64(),
            rates.bytes_per_sec,
            rates.txs_per_sec,
            rates.gas_per_sec,
            sample.gas as f64 / (sample.bytes as f64).max(1.0),
            totals.window.bytes_per_sec,
            totals.window.txs_per_sec,
            totals.window.gas_per_sec,
            totals.window.gas_per_byte(),
            totals.ever.bytes_per_sec,
            totals.ever.txs_per_sec,
            totals.ever.gas_per_sec,
            totals.ever.gas_per_byte(),
            totals.total_time.as_secs_f64(),
        );

        let threshold = self.config.log_executor_server_input_gas_threshold;
        if !self.config.log_executor_server_input
            && threshold > 0.0
            && rates.gas_per_sec < threshold
        {
            info!("TP={:.2}gas/s Input={}", rates.gas_per_sec, to_json(wire));
        }
    }
}

fn input_summary(request: &BatchRequest) -> String {
    let data = &request.batch_l2_data;
    let head = &data[..data.len().min(10)];
    let tail = &data[data.len().saturating_sub(10)..];
    format!(
        "uuid={} externalRequestId={} sequencerAddr={:?} batchL2DataLength={} \
         batchL2Data=0x{}...{} oldStateRoot={:x} oldAccInputHash={:x} oldBatchNum={} \
         chainId={} forkId={} globalExitRoot={:x} timestamp={} from={} \
         bUpdateMerkleTree={} bNoCounters={} traceFlags={:?}",
        request.uuid,
        request.external_request_id,
        request.sequencer_addr,
        data.len(),
        hex::encode(head),
        hex::encode(tail),
        request.old_state_root,
        request.old_acc_input_hash,
        request.old_batch_num,
        request.chain_id,
        request.fork_id,
        request.global_exit_root,
        request.timestamp,
        request.from,
        request.update_merkle_tree,
        request.no_counters,
        request.trace_config.flags(),
    )
}

fn to_json<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| format!("<unserializable: {e}>"))
}

#[cfg(test)]
mod tests {
    use futures::channel::mpsc;
    use hashdb::MemoryDb;

    use super::*;
    use crate::errors::ExecutorError;
    use crate::executor::{MockExecutor, TransactionOutcome};

    fn request() -> ProcessBatchRequest {
        ProcessBatchRequest {
            old_state_root: vec![0x01],
            chain_id: 1001,
            fork_id: 9,
            ..Default::default()
        }
    }

    fn service(executor: MockExecutor, config: ExecutorConfig) -> ExecutorService {
        ExecutorService::new(
            Arc::new(executor),
            Arc::new(MemoryDb::new("prover-test")),
            config,
        )
    }

    fn config() -> ExecutorConfig {
        ExecutorConfig {
            prover_id: "prover-test".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_zero_chain_id_never_reaches_executor() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().times(0);
        executor.expect_execute().times(0);
        let service = service(executor, config());

        let result = service.process_batch(&ProcessBatchRequest {
            chain_id: 0,
            ..request()
        });
        assert!(matches!(
            result,
            Err(ProcessBatchError::Cancelled(CodecError::ZeroChainId))
        ));
        assert_eq!(service.throughput().snapshot().counter, 0);
    }

    #[test]
    fn test_oversized_batch_data_never_reaches_executor() {
        let mut executor = MockExecutor::new();
        executor.expect_execute().times(0);
        let service = service(
            executor,
            ExecutorConfig {
                max_batch_l2_data_size: 4,
                ..config()
            },
        );
        let result = service.process_batch(&ProcessBatchRequest {
            batch_l2_data: vec![0; 5],
            ..request()
        });
        assert!(matches!(
            result,
            Err(ProcessBatchError::Cancelled(CodecError::BatchDataTooBig { .. }))
        ));
    }

    #[test]
    fn test_unsupported_fork_skips_execution() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().returning(|fork| fork == 9);
        executor.expect_execute().times(0);
        let service = service(executor, config());

        let response = service
            .process_batch(&ProcessBatchRequest {
                fork_id: 3,
                ..request()
            })
            .unwrap();
        assert_eq!(response.error, ExecutorError::UnsupportedForkId);
        assert!(response.responses.is_empty());
        assert_eq!(response.prover_id, "prover-test");
    }

    #[test]
    fn test_failed_batch_is_still_a_response() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor.expect_execute().times(1).returning(|request| {
            assert_eq!(request.chain_id, 1001);
            ExecutionResult {
                responses: vec![TransactionOutcome {
                    error: "OOCS".to_string(),
                    ..Default::default()
                }],
                ..ExecutionResult::from_result(ZkResult::OutOfCountersPoseidonG)
            }
        });
        let service = service(executor, config());

        let response = service.process_batch(&request()).unwrap();
        assert_eq!(response.error, ExecutorError::CountersOverflowPoseidon);
        assert_eq!(response.responses.len(), 1);
        assert_eq!(service.throughput().snapshot().counter, 1);
        assert_eq!(service.time_metrics().get("execute").unwrap().times, 1);
    }

    #[test]
    fn test_tx_log_tolerates_extreme_gas_values() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor.expect_execute().returning(|_| ExecutionResult {
            responses: vec![TransactionOutcome {
                gas_used: u64::MAX,
                gas_left: 1,
                ..Default::default()
            }],
            ..ExecutionResult::from_result(ZkResult::Success)
        });
        let service = service(
            executor,
            ExecutorConfig {
                log_executor_server_txs: true,
                ..config()
            },
        );

        let response = service.process_batch(&request()).unwrap();
        assert_eq!(response.responses[0].gas_used, u64::MAX);
        assert_eq!(response.responses[0].gas_left, 1);
    }

    #[test]
    fn test_unknown_tag_is_an_integration_defect() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor.expect_execute().returning(|_| ExecutionResult {
            responses: vec![TransactionOutcome {
                error: "notATag".to_string(),
                ..Default::default()
            }],
            ..ExecutionResult::from_result(ZkResult::Success)
        });
        let service = service(executor, config());
        assert!(matches!(
            service.process_batch(&request()),
            Err(ProcessBatchError::IntegrationDefect(_))
        ));
    }

    #[test]
    fn test_flush_status_is_the_store_snapshot() {
        let db = Arc::new(MemoryDb::new("prover-test"));
        db.write(hashdb::WriteBatch::default());
        let service = ExecutorService::new(Arc::new(MockExecutor::new()), db.clone(), config());
        assert_eq!(service.get_flush_status(), db.flush_status());
        assert_eq!(service.get_flush_status().last_flush_id, 1);
    }

    #[test]
    fn test_dumps_are_written() {
        let dir = tempfile::tempdir().unwrap();
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor
            .expect_execute()
            .returning(|_| ExecutionResult::from_result(ZkResult::Success));
        let service = service(
            executor,
            ExecutorConfig {
                output_dir: dir.path().to_path_buf(),
                save_request_to_file: true,
                save_response_to_file: true,
                ..config()
            },
        );
        service.process_batch(&request()).unwrap();

        // Dumps are written on detached threads.
        let deadline = Instant::now() + std::time::Duration::from_secs(5);
        let mut names = vec![];
        while Instant::now() < deadline {
            names = std::fs::read_dir(dir.path())
                .unwrap()
                .map(|entry| entry.unwrap().file_name().into_string().unwrap())
                .collect();
            if names.len() == 2 {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(10));
        }
        names.sort();
        assert_eq!(names.len(), 2, "{names:?}");
        assert!(names.iter().any(|n| n.ends_with(".executor_request.json")));
        assert!(names.iter().any(|n| n.ends_with(".executor_response.json")));
    }

    #[tokio::test]
    async fn test_stream_answers_in_order_until_closed() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor.expect_execute().returning(|request| ExecutionResult {
            new_batch_num: request.old_batch_num + 1,
            ..ExecutionResult::from_result(ZkResult::Success)
        });
        let service = Arc::new(service(executor, config()));

        let requests = futures::stream::iter(
            (0..3).map(|n| Ok::<_, String>(ProcessBatchRequest {
                old_batch_num: n,
                ..request()
            })),
        );
        let (tx, rx) = mpsc::unbounded();
        let termination = service.process_batch_stream(requests, tx).await;
        assert!(matches!(
            termination,
            StreamTermination::Closed { processed: 3 }
        ));
        let batch_nums: Vec<_> = rx.map(|r| r.new_batch_num).collect().await;
        assert_eq!(batch_nums, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_stream_stops_on_invalid_request() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor
            .expect_execute()
            .times(1)
            .returning(|_| ExecutionResult::from_result(ZkResult::Success));
        let service = Arc::new(service(executor, config()));

        let requests = futures::stream::iter(vec![
            Ok::<_, String>(request()),
            Ok(ProcessBatchRequest {
                chain_id: 0,
                ..request()
            }),
            Ok(request()),
        ]);
        let (tx, rx) = mpsc::unbounded();
        let termination = service.process_batch_stream(requests, tx).await;
        assert!(matches!(
            termination,
            StreamTermination::ProcessFailed {
                processed: 1,
                source: ProcessBatchError::Cancelled(CodecError::ZeroChainId)
            }
        ));
        assert_eq!(rx.collect::<Vec<_>>().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stream_stops_on_write_failure() {
        let mut executor = MockExecutor::new();
        executor.expect_supports_fork().return_const(true);
        executor
            .expect_execute()
            .returning(|_| ExecutionResult::from_result(ZkResult::Success));
        let service = Arc::new(service(executor, config()));

        let (tx, rx) = mpsc::unbounded();
        drop(rx);
        let requests = futures::stream::iter(vec![Ok::<_, String>(request())]);
        assert!(matches!(
            service.process_batch_stream(requests, tx).await,
            StreamTermination::WriteFailed { processed: 0 }
        ));
    }

    #[tokio::test]
    async fn test_stream_stops_on_read_failure() {
        let service = Arc::new(service(MockExecutor::new(), config()));
        let requests = futures::stream::iter(vec![Err::<ProcessBatchRequest, _>(
            "connection reset".to_string(),
        )]);
        let (tx, _rx) = mpsc::unbounded();
        assert!(matches!(
            service.process_batch_stream(requests, tx).await,
            StreamTermination::ReadFailed { processed: 0 }
        ));
    }
}
