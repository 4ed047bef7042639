//! End to end runs of the executor service over the reference transfer
//! executor and the in-memory store.

mod common;

use common::*;
use rstest::rstest;
use zk_executor::codec::CodecError;
use zk_executor::errors::{ExecutorError, RomError};
use zk_executor::service::ProcessBatchError;
use zk_executor::wire::{ProcessBatchRequest, TraceConfigRequest};

#[test]
fn test_single_transfer() {
    let h = harness();
    let request = request(signed_transfer(&secret_key(1), 0));

    let response = h.service.process_batch(&request).unwrap();

    assert_eq!(response.error, ExecutorError::NoError);
    assert_eq!(response.responses.len(), 1);
    let tx = &response.responses[0];
    assert_eq!(tx.error, RomError::NoError);
    assert_eq!(tx.gas_used + tx.gas_left, GAS_LIMIT);
    assert_eq!(tx.tx_hash, transfer_hash(&secret_key(1), 0));
    assert!(tx.call_trace.is_none());
    assert!(tx.execution_trace.is_empty());
    assert_eq!(response.new_state_root.len(), 32);
    assert_ne!(response.new_state_root, old_state_root());
    assert_eq!(response.new_batch_num, 2);
    assert_eq!(response.cumulative_gas_used, tx.gas_used);
    assert_eq!(response.prover_id, "test-prover");
    assert!(response.cnt_steps > 0);
    assert_eq!(h.executor.calls(), 1);
}

#[test]
fn test_oversized_old_state_root_is_cancelled() {
    let h = harness();
    let request = ProcessBatchRequest {
        old_state_root: vec![0xff; 33],
        ..request(signed_transfer(&secret_key(1), 0))
    };

    assert!(matches!(
        h.service.process_batch(&request),
        Err(ProcessBatchError::Cancelled(CodecError::TooLong { size: 33, .. }))
    ));
    assert_eq!(h.executor.calls(), 0);
}

#[rstest]
#[case::zero_chain_id(ProcessBatchRequest { chain_id: 0, ..request(vec![]) })]
#[case::long_coinbase(ProcessBatchRequest { coinbase: "0".repeat(41), ..request(vec![]) })]
#[case::non_hex_from(ProcessBatchRequest { from: "0xzz".to_string(), ..request(vec![]) })]
#[case::batch_too_big(ProcessBatchRequest { batch_l2_data: vec![0; 120_001], ..request(vec![]) })]
#[case::ragged_db_value(ProcessBatchRequest {
    db: [("01".to_string(), "0".repeat(17))].into(),
    ..request(vec![])
})]
#[case::long_trace_target(ProcessBatchRequest {
    trace_config: Some(TraceConfigRequest {
        tx_hash_to_generate_call_trace: vec![1; 33],
        ..Default::default()
    }),
    ..request(vec![])
})]
fn test_invalid_requests_never_reach_executor(#[case] wire: ProcessBatchRequest) {
    let h = harness();
    assert!(matches!(
        h.service.process_batch(&wire),
        Err(ProcessBatchError::Cancelled(_))
    ));
    assert_eq!(h.executor.calls(), 0);
}

#[test]
fn test_batch_data_at_limit_is_accepted() {
    let h = harness();
    // Not a valid batch, but within the size limit: the executor rejects it.
    let request = request(vec![0; 120_000]);

    let response = h.service.process_batch(&request).unwrap();
    assert_eq!(response.error, ExecutorError::Unspecified);
    assert_eq!(response.new_state_root, vec![0; 32]);
    assert_eq!(h.executor.calls(), 1);
}

#[test]
fn test_call_trace_target_absent_from_batch() {
    let h = harness();
    let request = ProcessBatchRequest {
        trace_config: Some(TraceConfigRequest {
            tx_hash_to_generate_call_trace: vec![0xab; 32],
            ..Default::default()
        }),
        ..request(signed_transfer(&secret_key(1), 0))
    };

    let response = h.service.process_batch(&request).unwrap();
    assert_eq!(response.error, ExecutorError::NoError);
    assert!(response.responses.iter().all(|tx| tx.call_trace.is_none()));
}

#[test]
fn test_call_trace_for_target() {
    let h = harness();
    let key = secret_key(2);
    let request = ProcessBatchRequest {
        trace_config: Some(TraceConfigRequest {
            tx_hash_to_generate_call_trace: transfer_hash(&key, 1),
            ..Default::default()
        }),
        ..request([signed_transfer(&key, 0), signed_transfer(&key, 1)].concat())
    };

    let response = h.service.process_batch(&request).unwrap();
    let traced: Vec<_> = response
        .responses
        .iter()
        .map(|tx| tx.call_trace.is_some())
        .collect();
    assert_eq!(traced, vec![false, true]);
    let context = &response.responses[1].call_trace.as_ref().unwrap().context;
    assert_eq!(context.call_type, "CALL");
    assert_eq!(context.value, "0x1");
    assert_eq!(context.gas_price, "0x3b9aca00");
    assert_eq!(context.old_state_root, response.responses[0].state_root);
}

#[test]
fn test_unsupported_fork() {
    let h = harness();
    let request = ProcessBatchRequest {
        fork_id: 6,
        ..request(signed_transfer(&secret_key(1), 0))
    };

    let response = h.service.process_batch(&request).unwrap();
    assert_eq!(response.error, ExecutorError::UnsupportedForkId);
    assert!(response.responses.is_empty());
    assert_eq!(h.executor.calls(), 0);
}

#[test]
fn test_flush_ids_follow_store() {
    let h = harness();
    let request = ProcessBatchRequest {
        update_merkle_tree: 1,
        ..request(signed_transfer(&secret_key(1), 0))
    };

    let response = h.service.process_batch(&request).unwrap();
    assert_eq!(response.flush_id, 1);
    assert_eq!(response.stored_flush_id, 0);

    let status = h.service.get_flush_status();
    assert_eq!(status.last_flush_id, 1);
    assert_eq!(status.pending_to_flush_nodes, 1);
    assert!(status.is_consistent());
    assert!(!status.is_durable(response.flush_id));

    h.db.flush();
    let status = h.service.get_flush_status();
    assert!(status.is_consistent());
    assert!(status.is_durable(response.flush_id));
    assert_eq!(status.prover_id, "test-prover");
}

#[test]
fn test_throughput_counts_completed_batches() {
    let h = harness();
    h.service
        .process_batch(&request(signed_transfer(&secret_key(1), 0)))
        .unwrap();
    let _ = h.service.process_batch(&ProcessBatchRequest {
        chain_id: 0,
        ..request(vec![])
    });

    let snapshot = h.service.throughput().snapshot();
    assert_eq!(snapshot.counter, 1);
    assert!(h.service.time_metrics().get("execute").is_some());
}

#[test]
fn test_time_metrics_cover_every_phase() {
    let h = harness_with(zk_executor::config::ExecutorConfig {
        prover_id: "test-prover".to_string(),
        log_time_metrics: true,
        ..Default::default()
    });
    h.service
        .process_batch(&request(signed_transfer(&secret_key(1), 0)))
        .unwrap();

    for phase in ["validate", "execute", "assemble"] {
        assert_eq!(h.service.time_metrics().get(phase).unwrap().times, 1);
    }
    let report = h.service.time_metrics().report("batch");
    assert_eq!(report.lines().count(), 4);
}

#[tokio::test]
async fn test_blocking_worker_matches_inline_call() {
    let h = harness();
    let request = request(signed_transfer(&secret_key(4), 0));

    let inline = h.service.process_batch(&request).unwrap();
    let worker = h.service.process_batch_blocking(request).await.unwrap();
    assert_eq!(inline.new_state_root, worker.new_state_root);
    assert_eq!(inline.responses, worker.responses);
}
