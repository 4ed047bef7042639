//! Contract with the deterministic execution engine.
//!
//! The engine itself lives outside this crate (see [`crate::transfer`] for a
//! reference implementation). It receives a fully validated
//! [`BatchRequest`] and reports back everything its full tracer collected:
//! the result code, circuit counters, resulting roots and one
//! [`TransactionOutcome`] per executed transaction, in execution order.

use std::collections::HashMap;
use std::time::Duration;

use ethereum_types::{H256, U256};

use crate::errors::ZkResult;
use crate::request::BatchRequest;

/// Circuit resource usage of one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counters {
    pub keccak_f: u64,
    pub poseidon_g: u64,
    pub padding_pg: u64,
    pub mem_align: u64,
    pub arith: u64,
    pub binary: u64,
    pub steps: u64,
}

/// Balance and nonce of an address touched during execution, as decimal
/// strings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InfoReadWrite {
    pub balance: String,
    pub nonce: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogEntry {
    pub address: String,
    pub topics: Vec<H256>,
    /// Data as emitted, possibly in several segments.
    pub data: Vec<Vec<u8>>,
    pub batch_number: u64,
    pub tx_hash: H256,
    pub tx_index: u32,
    pub batch_hash: H256,
    pub index: u32,
}

/// One step of a full execution trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionStep {
    pub pc: u64,
    /// Opcode name; absent when the batch ran without counters.
    pub op: Option<String>,
    pub gas: u64,
    pub gas_cost: u64,
    pub memory: Vec<u8>,
    pub memory_size: u32,
    pub stack: Vec<U256>,
    pub return_data: Vec<Vec<u8>>,
    pub storage: HashMap<String, String>,
    pub depth: u32,
    pub gas_refund: u64,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionContext {
    /// `CALL` or `CREATE`.
    pub call_type: String,
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub gas: u64,
    pub gas_price: U256,
    pub value: U256,
    pub batch: H256,
    pub output: Vec<u8>,
    pub gas_used: u64,
    pub execution_time: u32,
    pub old_state_root: H256,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractInfo {
    pub address: String,
    pub caller: String,
    pub value: U256,
    pub data: Vec<u8>,
    pub gas: u64,
    pub call_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionStep {
    pub state_root: H256,
    pub depth: u32,
    pub pc: u64,
    pub gas: u64,
    pub gas_cost: u64,
    pub gas_refund: u64,
    pub op: String,
    pub stack: Vec<U256>,
    pub memory: Vec<u8>,
    pub return_data: Vec<Vec<u8>>,
    pub contract: ContractInfo,
    pub error: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallTrace {
    pub context: TransactionContext,
    pub steps: Vec<TransactionStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionOutcome {
    pub tx_hash: H256,
    pub rlp_tx: Vec<u8>,
    pub tx_type: u32,
    pub return_value: Vec<u8>,
    pub gas_left: u64,
    pub gas_used: u64,
    pub gas_refunded: u64,
    /// Instruction-level error tag, empty on success.
    pub error: String,
    pub create_address: String,
    pub state_root: H256,
    pub effective_gas_price: String,
    pub effective_percentage: u32,
    pub logs: Vec<LogEntry>,
    pub execution_trace: Vec<ExecutionStep>,
    pub call_trace: Option<CallTrace>,
}

/// Per-opcode timing sample collected by the executor's opcode tracer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpcodeInfo {
    pub op: u8,
    pub opcode: String,
    pub gas_cost: u64,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    pub result: ZkResult,
    pub counters: Counters,
    pub cumulative_gas_used: u64,
    pub new_state_root: H256,
    pub new_acc_input_hash: H256,
    pub new_local_exit_root: H256,
    pub new_batch_num: u64,
    pub read_write_addresses: Option<HashMap<String, InfoReadWrite>>,
    pub responses: Vec<TransactionOutcome>,
    /// Flush id the store assigned to this batch's writes.
    pub flush_id: u64,
    /// Highest flush id known to be durable when the writes were accepted.
    pub last_sent_flush_id: u64,
    pub opcodes: Vec<OpcodeInfo>,
}

impl ExecutionResult {
    /// An empty result carrying only a result code.
    pub fn from_result(result: ZkResult) -> Self {
        Self {
            result,
            counters: Counters::default(),
            cumulative_gas_used: 0,
            new_state_root: H256::zero(),
            new_acc_input_hash: H256::zero(),
            new_local_exit_root: H256::zero(),
            new_batch_num: 0,
            read_write_addresses: None,
            responses: vec![],
            flush_id: 0,
            last_sent_flush_id: 0,
            opcodes: vec![],
        }
    }
}

/// A deterministic batch execution engine.
///
/// `execute` blocks until the batch is processed, never mutates its input
/// and always returns a complete result, also when the batch fails.
#[cfg_attr(test, mockall::automock)]
pub trait Executor: Send + Sync {
    /// Whether this engine has a rule set for `fork_id`.
    fn supports_fork(&self, fork_id: u64) -> bool;

    fn execute(&self, request: &BatchRequest) -> ExecutionResult;
}
