//! JSON messages exchanged with callers.
//!
//! Field names and enum spellings follow the `executor.v1` protocol. Byte
//! fields are hex strings with an optional `0x` prefix on input and always
//! carry one on output. Absent fields take their zero value.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::errors::{ExecutorError, RomError};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessBatchRequest {
    #[serde(with = "crate::hex")]
    pub old_state_root: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub old_acc_input_hash: Vec<u8>,
    pub old_batch_num: u64,
    pub chain_id: u64,
    pub fork_id: u64,
    #[serde(with = "crate::hex")]
    pub batch_l2_data: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub global_exit_root: Vec<u8>,
    pub eth_timestamp: u64,
    pub coinbase: String,
    pub update_merkle_tree: u32,
    pub no_counters: u64,
    pub from: String,
    /// Pre-state snapshot: hex key to concatenated 16 hex character field
    /// elements.
    pub db: BTreeMap<String, String>,
    pub contracts_bytecode: BTreeMap<String, String>,
    pub trace_config: Option<TraceConfigRequest>,
    /// Opaque caller token, echoed in logs and file dumps only.
    pub external_request_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceConfigRequest {
    pub disable_storage: u32,
    pub disable_stack: u32,
    pub enable_memory: u32,
    pub enable_return_data: u32,
    #[serde(with = "crate::hex")]
    pub tx_hash_to_generate_execute_trace: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub tx_hash_to_generate_call_trace: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessBatchResponse {
    #[serde(with = "crate::hex")]
    pub new_state_root: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub new_acc_input_hash: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub new_local_exit_root: Vec<u8>,
    pub new_batch_num: u64,
    pub cnt_keccak_hashes: u64,
    pub cnt_poseidon_hashes: u64,
    pub cnt_poseidon_paddings: u64,
    pub cnt_mem_aligns: u64,
    pub cnt_arithmetics: u64,
    pub cnt_binaries: u64,
    pub cnt_steps: u64,
    pub cumulative_gas_used: u64,
    pub responses: Vec<ProcessTransactionResponse>,
    pub error: ExecutorError,
    pub read_write_addresses: HashMap<String, InfoReadWrite>,
    pub flush_id: u64,
    pub stored_flush_id: u64,
    pub prover_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessTransactionResponse {
    #[serde(with = "crate::hex")]
    pub tx_hash: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub rlp_tx: Vec<u8>,
    #[serde(rename = "type")]
    pub tx_type: u32,
    #[serde(with = "crate::hex")]
    pub return_value: Vec<u8>,
    pub gas_left: u64,
    pub gas_used: u64,
    pub gas_refunded: u64,
    pub error: RomError,
    pub create_address: String,
    #[serde(with = "crate::hex")]
    pub state_root: Vec<u8>,
    pub logs: Vec<Log>,
    pub execution_trace: Vec<ExecutionTraceStep>,
    pub call_trace: Option<CallTrace>,
    pub effective_gas_price: String,
    pub effective_percentage: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Log {
    pub address: String,
    #[serde(with = "crate::hex::seq")]
    pub topics: Vec<Vec<u8>>,
    #[serde(with = "crate::hex")]
    pub data: Vec<u8>,
    pub batch_number: u64,
    #[serde(with = "crate::hex")]
    pub tx_hash: Vec<u8>,
    pub tx_index: u32,
    #[serde(with = "crate::hex")]
    pub batch_hash: Vec<u8>,
    pub index: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionTraceStep {
    pub pc: u64,
    /// Absent when the batch ran without counters.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub op: Option<String>,
    pub remaining_gas: u64,
    pub gas_cost: u64,
    #[serde(with = "crate::hex")]
    pub memory: Vec<u8>,
    pub memory_size: u32,
    /// 64 hex character words, bottom of the stack first.
    pub stack: Vec<String>,
    #[serde(with = "crate::hex")]
    pub return_data: Vec<u8>,
    pub storage: HashMap<String, String>,
    pub depth: u32,
    pub gas_refund: u64,
    pub error: RomError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CallTrace {
    pub context: TransactionContext,
    pub steps: Vec<TransactionStep>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionContext {
    #[serde(rename = "type")]
    pub call_type: String,
    pub from: String,
    pub to: String,
    #[serde(with = "crate::hex")]
    pub data: Vec<u8>,
    pub gas: u64,
    pub value: String,
    #[serde(with = "crate::hex")]
    pub batch: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub output: Vec<u8>,
    pub gas_used: u64,
    pub gas_price: String,
    pub execution_time: u32,
    #[serde(with = "crate::hex")]
    pub old_state_root: Vec<u8>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionStep {
    #[serde(with = "crate::hex")]
    pub state_root: Vec<u8>,
    pub depth: u32,
    pub pc: u64,
    pub gas: u64,
    pub gas_cost: u64,
    pub gas_refund: u64,
    pub op: String,
    /// 64 hex character words, bottom of the stack first.
    pub stack: Vec<String>,
    #[serde(with = "crate::hex")]
    pub memory: Vec<u8>,
    #[serde(with = "crate::hex")]
    pub return_data: Vec<u8>,
    pub contract: Contract,
    pub error: RomError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Contract {
    pub address: String,
    pub caller: String,
    pub value: String,
    #[serde(with = "crate::hex")]
    pub data: Vec<u8>,
    pub gas: u64,
    #[serde(rename = "type")]
    pub call_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InfoReadWrite {
    pub nonce: String,
    pub balance: String,
}
