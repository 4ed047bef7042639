//! Normalized execution requests.

use std::collections::HashMap;

use bitflags::bitflags;
use ethereum_types::{H160, H256, U256};
use hashdb::{Key, F};
use tracing::error;
use uuid::Uuid;

use crate::codec::{self, CodecError};
use crate::wire::{ProcessBatchRequest, TraceConfigRequest};

bitflags! {
    /// Consolidated trace level handed to the executor.
    #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
    pub struct TraceFlags: u8 {
        const ENABLED = 1 << 0;
        const EXECUTE_TRACE = 1 << 1;
        const CALL_TRACE = 1 << 2;
        const STORAGE = 1 << 3;
        const STACK = 1 << 4;
        const MEMORY = 1 << 5;
        const RETURN_DATA = 1 << 6;
    }
}

/// Caller supplied tracing options, before flag consolidation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceOptions {
    pub disable_storage: bool,
    pub disable_stack: bool,
    pub enable_memory: bool,
    pub enable_return_data: bool,
    pub tx_hash_to_generate_execute_trace: Option<H256>,
    pub tx_hash_to_generate_call_trace: Option<H256>,
}

/// Tracing configuration of one request. The default is fully disabled.
///
/// Flags are derived once at construction and the configuration is
/// immutable afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceConfig {
    options: TraceOptions,
    flags: TraceFlags,
}

impl TraceConfig {
    /// An enabled configuration, as created when the caller sends one.
    pub fn new(options: TraceOptions) -> Self {
        let mut flags = TraceFlags::ENABLED;
        flags.set(
            TraceFlags::EXECUTE_TRACE,
            options.tx_hash_to_generate_execute_trace.is_some(),
        );
        flags.set(
            TraceFlags::CALL_TRACE,
            options.tx_hash_to_generate_call_trace.is_some(),
        );
        flags.set(TraceFlags::STORAGE, !options.disable_storage);
        flags.set(TraceFlags::STACK, !options.disable_stack);
        flags.set(TraceFlags::MEMORY, options.enable_memory);
        flags.set(TraceFlags::RETURN_DATA, options.enable_return_data);
        Self { options, flags }
    }

    pub fn enabled(&self) -> bool {
        self.flags.contains(TraceFlags::ENABLED)
    }

    pub fn flags(&self) -> TraceFlags {
        self.flags
    }

    pub fn options(&self) -> &TraceOptions {
        &self.options
    }

    /// Whether `tx_hash` is the target of the full execution trace.
    pub fn wants_execute_trace(&self, tx_hash: &H256) -> bool {
        self.enabled() && self.options.tx_hash_to_generate_execute_trace.as_ref() == Some(tx_hash)
    }

    /// Whether `tx_hash` is the target of the call trace.
    pub fn wants_call_trace(&self, tx_hash: &H256) -> bool {
        self.enabled() && self.options.tx_hash_to_generate_call_trace.as_ref() == Some(tx_hash)
    }
}

/// A validated execution unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchRequest {
    /// Identifies the request in logs and file dumps.
    pub uuid: Uuid,
    pub external_request_id: String,
    pub old_state_root: U256,
    pub old_acc_input_hash: U256,
    pub global_exit_root: U256,
    pub old_batch_num: u64,
    pub chain_id: u64,
    pub fork_id: u64,
    pub batch_l2_data: Vec<u8>,
    pub timestamp: u64,
    pub sequencer_addr: H160,
    pub from: String,
    pub update_merkle_tree: bool,
    pub no_counters: bool,
    pub pre_state: HashMap<Key, Vec<F>>,
    pub contracts_bytecode: HashMap<Key, Vec<u8>>,
    pub trace_config: TraceConfig,
    pub new_state_root: H256,
    pub new_acc_input_hash: H256,
    pub new_local_exit_root: H256,
    pub new_batch_num: u64,
}

impl BatchRequest {
    /// Validates every field of `wire` and builds the request identified by
    /// `uuid`.
    ///
    /// Fields are checked in wire order and the first failure is logged and
    /// returned; nothing is built from a partially valid request.
    pub fn from_wire(
        wire: &ProcessBatchRequest,
        max_batch_l2_data_size: usize,
        uuid: Uuid,
    ) -> Result<Self, CodecError> {
        Self::normalize(wire, max_batch_l2_data_size, uuid).inspect_err(|e| error!("{e}"))
    }

    fn normalize(
        wire: &ProcessBatchRequest,
        max_batch_l2_data_size: usize,
        uuid: Uuid,
    ) -> Result<Self, CodecError> {
        let old_state_root = codec::decode_scalar("oldStateRoot", &wire.old_state_root)?;
        let old_acc_input_hash =
            codec::decode_scalar("oldAccInputHash", &wire.old_acc_input_hash)?;
        let chain_id = codec::check_chain_id(wire.chain_id)?;
        codec::check_batch_data(&wire.batch_l2_data, max_batch_l2_data_size)?;
        let global_exit_root = codec::decode_scalar("globalExitRoot", &wire.global_exit_root)?;
        let sequencer_addr = codec::decode_sequencer_address(&wire.coinbase)?;
        let from = codec::normalize_from(&wire.from)?;
        let trace_config = match &wire.trace_config {
            Some(config) => TraceConfig::new(trace_options(config)?),
            None => TraceConfig::default(),
        };

        let pre_state = wire
            .db
            .iter()
            .map(|(key, value)| {
                let key = codec::normalize_key("db key", key)?;
                let value = codec::decode_db_value(&format!("{key:x}"), value)?;
                Ok((key, value))
            })
            .collect::<Result<_, CodecError>>()?;
        let contracts_bytecode = wire
            .contracts_bytecode
            .iter()
            .map(|(key, value)| {
                Ok((
                    codec::normalize_key("contracts bytecode key", key)?,
                    codec::decode_program(value)?,
                ))
            })
            .collect::<Result<_, CodecError>>()?;

        Ok(Self {
            uuid,
            external_request_id: wire.external_request_id.clone(),
            old_state_root,
            old_acc_input_hash,
            global_exit_root,
            old_batch_num: wire.old_batch_num,
            chain_id,
            fork_id: wire.fork_id,
            batch_l2_data: wire.batch_l2_data.clone(),
            timestamp: wire.eth_timestamp,
            sequencer_addr,
            from,
            update_merkle_tree: wire.update_merkle_tree != 0,
            no_counters: wire.no_counters != 0,
            pre_state,
            contracts_bytecode,
            trace_config,
            new_state_root: H256::zero(),
            new_acc_input_hash: H256::zero(),
            new_local_exit_root: H256::zero(),
            new_batch_num: 0,
        })
    }
}

fn trace_options(config: &TraceConfigRequest) -> Result<TraceOptions, CodecError> {
    Ok(TraceOptions {
        disable_storage: config.disable_storage != 0,
        disable_stack: config.disable_stack != 0,
        enable_memory: config.enable_memory != 0,
        enable_return_data: config.enable_return_data != 0,
        tx_hash_to_generate_execute_trace: codec::decode_tx_hash(
            "txHashToGenerateExecuteTrace",
            &config.tx_hash_to_generate_execute_trace,
        )?,
        tx_hash_to_generate_call_trace: codec::decode_tx_hash(
            "txHashToGenerateCallTrace",
            &config.tx_hash_to_generate_call_trace,
        )?,
    })
}
