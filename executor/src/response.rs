//! Translation of an [`ExecutionResult`] into the wire response.

use tracing::debug;
use zk_executor_common::{u256_to_0x_hex, u256_to_hex_word};

use crate::errors::{ExecutorError, RomError, UnknownRomErrorTag};
use crate::executor::{
    CallTrace, ExecutionResult, ExecutionStep, LogEntry, TransactionOutcome, TransactionStep,
};
use crate::request::{BatchRequest, TraceConfig};
use crate::wire;

/// Builds the response of `request` from what the executor returned.
///
/// Roots come from the executor only when the batch succeeded; otherwise the
/// request's placeholders are reported. At most one transaction carries an
/// execution trace and at most one carries a call trace.
///
/// Fails only if the executor emitted an error tag outside the known
/// vocabulary.
pub fn assemble(
    request: &BatchRequest,
    result: &ExecutionResult,
    prover_id: &str,
) -> Result<wire::ProcessBatchResponse, UnknownRomErrorTag> {
    let (new_state_root, new_acc_input_hash, new_local_exit_root, new_batch_num) =
        if result.result.is_success() {
            (
                result.new_state_root,
                result.new_acc_input_hash,
                result.new_local_exit_root,
                result.new_batch_num,
            )
        } else {
            (
                request.new_state_root,
                request.new_acc_input_hash,
                request.new_local_exit_root,
                request.new_batch_num,
            )
        };

    let mut traces = TraceSlots::new(&request.trace_config);
    let responses = result
        .responses
        .iter()
        .map(|outcome| transaction_response(outcome, &mut traces))
        .collect::<Result<_, _>>()?;

    let counters = &result.counters;
    Ok(wire::ProcessBatchResponse {
        new_state_root: new_state_root.as_bytes().to_vec(),
        new_acc_input_hash: new_acc_input_hash.as_bytes().to_vec(),
        new_local_exit_root: new_local_exit_root.as_bytes().to_vec(),
        new_batch_num,
        cnt_keccak_hashes: counters.keccak_f,
        cnt_poseidon_hashes: counters.poseidon_g,
        cnt_poseidon_paddings: counters.padding_pg,
        cnt_mem_aligns: counters.mem_align,
        cnt_arithmetics: counters.arith,
        cnt_binaries: counters.binary,
        cnt_steps: counters.steps,
        cumulative_gas_used: result.cumulative_gas_used,
        responses,
        error: ExecutorError::from(result.result),
        read_write_addresses: result
            .read_write_addresses
            .iter()
            .flatten()
            .map(|(address, info)| {
                (
                    address.clone(),
                    wire::InfoReadWrite {
                        nonce: info.nonce.clone(),
                        balance: info.balance.clone(),
                    },
                )
            })
            .collect(),
        flush_id: result.flush_id,
        stored_flush_id: result.last_sent_flush_id,
        prover_id: prover_id.to_string(),
    })
}

/// Tracks which traces have already been attached to the response.
struct TraceSlots<'a> {
    config: &'a TraceConfig,
    execute_trace_taken: bool,
    call_trace_taken: bool,
}

impl<'a> TraceSlots<'a> {
    fn new(config: &'a TraceConfig) -> Self {
        Self {
            config,
            execute_trace_taken: false,
            call_trace_taken: false,
        }
    }

    fn take_execute_trace(&mut self, outcome: &TransactionOutcome) -> bool {
        let take = !self.execute_trace_taken && self.config.wants_execute_trace(&outcome.tx_hash);
        self.execute_trace_taken |= take;
        take
    }

    fn take_call_trace(&mut self, outcome: &TransactionOutcome) -> bool {
        let take = !self.call_trace_taken && self.config.wants_call_trace(&outcome.tx_hash);
        self.call_trace_taken |= take;
        take
    }
}

fn transaction_response(
    outcome: &TransactionOutcome,
    traces: &mut TraceSlots,
) -> Result<wire::ProcessTransactionResponse, UnknownRomErrorTag> {
    let execution_trace = if traces.take_execute_trace(outcome) {
        let missing_ops = outcome
            .execution_trace
            .iter()
            .filter(|step| step.op.is_none())
            .count();
        if missing_ops > 0 {
            debug!(
                "tx {:?}: {missing_ops} trace steps without opcode, counters disabled",
                outcome.tx_hash
            );
        }
        outcome
            .execution_trace
            .iter()
            .map(execution_trace_step)
            .collect::<Result<_, _>>()?
    } else {
        vec![]
    };
    let call_trace = match &outcome.call_trace {
        Some(trace) if traces.take_call_trace(outcome) => Some(call_trace(trace)?),
        _ => None,
    };

    Ok(wire::ProcessTransactionResponse {
        tx_hash: outcome.tx_hash.as_bytes().to_vec(),
        rlp_tx: outcome.rlp_tx.clone(),
        tx_type: outcome.tx_type,
        return_value: outcome.return_value.clone(),
        gas_left: outcome.gas_left,
        gas_used: outcome.gas_used,
        gas_refunded: outcome.gas_refunded,
        error: RomError::from_tag(&outcome.error)?,
        create_address: outcome.create_address.clone(),
        state_root: outcome.state_root.as_bytes().to_vec(),
        logs: outcome.logs.iter().map(log).collect(),
        execution_trace,
        call_trace,
        effective_gas_price: outcome.effective_gas_price.clone(),
        effective_percentage: outcome.effective_percentage,
    })
}

fn log(entry: &LogEntry) -> wire::Log {
    wire::Log {
        address: entry.address.clone(),
        topics: entry
            .topics
            .iter()
            .map(|topic| topic.as_bytes().to_vec())
            .collect(),
        data: entry.data.concat(),
        batch_number: entry.batch_number,
        tx_hash: entry.tx_hash.as_bytes().to_vec(),
        tx_index: entry.tx_index,
        batch_hash: entry.batch_hash.as_bytes().to_vec(),
        index: entry.index,
    }
}

fn execution_trace_step(step: &ExecutionStep) -> Result<wire::ExecutionTraceStep, UnknownRomErrorTag> {
    Ok(wire::ExecutionTraceStep {
        pc: step.pc,
        op: step.op.clone(),
        remaining_gas: step.gas,
        gas_cost: step.gas_cost,
        memory: step.memory.clone(),
        memory_size: step.memory_size,
        stack: step.stack.iter().copied().map(u256_to_hex_word).collect(),
        return_data: step.return_data.concat(),
        storage: step.storage.clone(),
        depth: step.depth,
        gas_refund: step.gas_refund,
        error: RomError::from_tag(&step.error)?,
    })
}

fn call_trace(trace: &CallTrace) -> Result<wire::CallTrace, UnknownRomErrorTag> {
    let context = &trace.context;
    Ok(wire::CallTrace {
        context: wire::TransactionContext {
            call_type: context.call_type.clone(),
            from: context.from.clone(),
            to: context.to.clone(),
            data: context.data.clone(),
            gas: context.gas,
            value: u256_to_0x_hex(context.value),
            batch: context.batch.as_bytes().to_vec(),
            output: context.output.clone(),
            gas_used: context.gas_used,
            gas_price: u256_to_0x_hex(context.gas_price),
            execution_time: context.execution_time,
            old_state_root: context.old_state_root.as_bytes().to_vec(),
        },
        steps: trace
            .steps
            .iter()
            .map(transaction_step)
            .collect::<Result<_, _>>()?,
    })
}

fn transaction_step(step: &TransactionStep) -> Result<wire::TransactionStep, UnknownRomErrorTag> {
    Ok(wire::TransactionStep {
        state_root: step.state_root.as_bytes().to_vec(),
        depth: step.depth,
        pc: step.pc,
        gas: step.gas,
        gas_cost: step.gas_cost,
        gas_refund: step.gas_refund,
        op: step.op.clone(),
        stack: step.stack.iter().copied().map(u256_to_hex_word).collect(),
        memory: step.memory.clone(),
        return_data: step.return_data.concat(),
        contract: wire::Contract {
            address: step.contract.address.clone(),
            caller: step.contract.caller.clone(),
            value: u256_to_0x_hex(step.contract.value),
            data: step.contract.data.clone(),
            gas: step.contract.gas,
            call_type: step.contract.call_type.clone(),
        },
        error: RomError::from_tag(&step.error)?,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use ethereum_types::{H256, U256};

    use super::*;
    use crate::errors::ZkResult;
    use crate::executor::{Counters, InfoReadWrite, TransactionContext};
    use crate::request::TraceOptions;
    use crate::wire::ProcessBatchRequest;

    fn request(trace_config: TraceConfig) -> BatchRequest {
        let wire = ProcessBatchRequest {
            chain_id: 1001,
            ..Default::default()
        };
        BatchRequest {
            trace_config,
            ..BatchRequest::from_wire(&wire, 100, uuid::Uuid::new_v4()).unwrap()
        }
    }

    fn traced_outcome(hash: u64) -> TransactionOutcome {
        TransactionOutcome {
            tx_hash: H256::from_low_u64_be(hash),
            gas_used: 21000,
            gas_left: 9000,
            execution_trace: vec![
                ExecutionStep {
                    op: Some("PUSH1".to_string()),
                    stack: vec![U256::from(0xff)],
                    return_data: vec![vec![1], vec![2, 3]],
                    ..Default::default()
                },
                ExecutionStep {
                    op: None,
                    error: "OOG".to_string(),
                    ..Default::default()
                },
            ],
            call_trace: Some(CallTrace {
                context: TransactionContext {
                    call_type: "CALL".to_string(),
                    value: U256::from(0x0100),
                    ..Default::default()
                },
                steps: vec![TransactionStep {
                    op: "STOP".to_string(),
                    ..Default::default()
                }],
            }),
            ..Default::default()
        }
    }

    fn success() -> ExecutionResult {
        ExecutionResult {
            result: ZkResult::Success,
            counters: Counters {
                keccak_f: 3,
                steps: 100,
                ..Default::default()
            },
            cumulative_gas_used: 42000,
            new_state_root: H256::repeat_byte(0xaa),
            new_batch_num: 8,
            flush_id: 5,
            last_sent_flush_id: 4,
            read_write_addresses: Some(HashMap::from([(
                "0x01".to_string(),
                InfoReadWrite {
                    balance: "10".to_string(),
                    nonce: "1".to_string(),
                },
            )])),
            responses: vec![traced_outcome(1), traced_outcome(2)],
            ..ExecutionResult::from_result(ZkResult::Success)
        }
    }

    #[test]
    fn test_success_reports_executor_roots() {
        let response = assemble(&request(TraceConfig::default()), &success(), "prover").unwrap();
        assert_eq!(response.error, ExecutorError::NoError);
        assert_eq!(response.new_state_root, vec![0xaa; 32]);
        assert_eq!(response.new_batch_num, 8);
        assert_eq!(response.cnt_keccak_hashes, 3);
        assert_eq!(response.cnt_steps, 100);
        assert_eq!(response.cumulative_gas_used, 42000);
        assert_eq!(response.flush_id, 5);
        assert_eq!(response.stored_flush_id, 4);
        assert_eq!(response.prover_id, "prover");
        assert_eq!(response.read_write_addresses["0x01"].balance, "10");
        assert_eq!(response.responses.len(), 2);
        assert!(response.responses.iter().all(|tx| tx.execution_trace.is_empty()));
        assert!(response.responses.iter().all(|tx| tx.call_trace.is_none()));
    }

    #[test]
    fn test_failure_reports_placeholders() {
        let result = ExecutionResult {
            result: ZkResult::OutOfCountersKeccakF,
            ..success()
        };
        let response = assemble(&request(TraceConfig::default()), &result, "prover").unwrap();
        assert_eq!(response.error, ExecutorError::CountersOverflowKeccak);
        assert_eq!(response.new_state_root, vec![0; 32]);
        assert_eq!(response.new_batch_num, 0);
        // Partial counters are still reported.
        assert_eq!(response.cnt_keccak_hashes, 3);
    }

    #[test]
    fn test_traces_attach_only_to_targets() {
        let config = TraceConfig::new(TraceOptions {
            tx_hash_to_generate_execute_trace: Some(H256::from_low_u64_be(2)),
            tx_hash_to_generate_call_trace: Some(H256::from_low_u64_be(1)),
            ..Default::default()
        });
        let response = assemble(&request(config), &success(), "prover").unwrap();
        let (first, second) = (&response.responses[0], &response.responses[1]);

        assert!(first.execution_trace.is_empty());
        assert_eq!(second.execution_trace.len(), 2);
        let step = &second.execution_trace[0];
        assert_eq!(step.op.as_deref(), Some("PUSH1"));
        assert_eq!(step.stack, vec![format!("{:0>64}", "ff")]);
        assert_eq!(step.return_data, vec![1, 2, 3]);
        assert_eq!(step.error, RomError::NoError);
        assert_eq!(second.execution_trace[1].op, None);
        assert_eq!(second.execution_trace[1].error, RomError::OutOfGas);

        let call_trace = first.call_trace.as_ref().unwrap();
        assert_eq!(call_trace.context.value, "0x100");
        assert_eq!(call_trace.context.gas_price, "0x0");
        assert_eq!(call_trace.steps[0].op, "STOP");
        assert!(second.call_trace.is_none());
    }

    #[test]
    fn test_duplicate_target_gets_one_trace() {
        let config = TraceConfig::new(TraceOptions {
            tx_hash_to_generate_execute_trace: Some(H256::from_low_u64_be(1)),
            tx_hash_to_generate_call_trace: Some(H256::from_low_u64_be(1)),
            ..Default::default()
        });
        let result = ExecutionResult {
            responses: vec![traced_outcome(1), traced_outcome(1)],
            ..success()
        };
        let response = assemble(&request(config), &result, "prover").unwrap();
        let executed = response
            .responses
            .iter()
            .filter(|tx| !tx.execution_trace.is_empty())
            .count();
        let called = response
            .responses
            .iter()
            .filter(|tx| tx.call_trace.is_some())
            .count();
        assert_eq!((executed, called), (1, 1));
    }

    #[test]
    fn test_unmatched_call_target_attaches_nothing() {
        let config = TraceConfig::new(TraceOptions {
            tx_hash_to_generate_call_trace: Some(H256::repeat_byte(0xee)),
            ..Default::default()
        });
        let response = assemble(&request(config), &success(), "prover").unwrap();
        assert_eq!(response.responses.len(), 2);
        assert!(response.responses.iter().all(|tx| tx.call_trace.is_none()));
    }

    #[test]
    fn test_log_data_is_concatenated_in_order() {
        let mut outcome = traced_outcome(1);
        outcome.logs = vec![LogEntry {
            topics: vec![H256::repeat_byte(1)],
            data: vec![vec![0xde, 0xad], vec![], vec![0xbe, 0xef]],
            index: 3,
            ..Default::default()
        }];
        let result = ExecutionResult {
            responses: vec![outcome],
            ..success()
        };
        let response = assemble(&request(TraceConfig::default()), &result, "prover").unwrap();
        let log = &response.responses[0].logs[0];
        assert_eq!(log.data, vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(log.topics, vec![vec![1; 32]]);
        assert_eq!(log.index, 3);
    }

    #[test]
    fn test_unknown_tag_is_a_defect() {
        let mut outcome = traced_outcome(1);
        outcome.error = "outOfThinAir".to_string();
        let result = ExecutionResult {
            responses: vec![outcome],
            ..success()
        };
        assert_eq!(
            assemble(&request(TraceConfig::default()), &result, "prover"),
            Err(UnknownRomErrorTag("outOfThinAir".to_string()))
        );
    }

    #[test]
    fn test_unknown_tag_in_untraced_step_is_ignored() {
        let mut outcome = traced_outcome(1);
        outcome.execution_trace[0].error = "outOfThinAir".to_string();
        let result = ExecutionResult {
            responses: vec![outcome],
            ..success()
        };
        assert!(assemble(&request(TraceConfig::default()), &result, "prover").is_ok());
    }
}
