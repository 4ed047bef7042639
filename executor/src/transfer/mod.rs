//! Reference [`Executor`] for batches of plain value transfers.
//!
//! No contract code runs: every transaction only pays its intrinsic gas.
//! The state root is advanced by hashing the previous root together with
//! each successful transaction hash, which keeps results deterministic and
//! sensitive to batch contents without a Merkle tree behind them.

pub mod batch_data;

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Instant;

use ethereum_types::{Address, H256};
use hashdb::fea::scalar_to_fea8;
use hashdb::poseidon::{hash_bytes, hashout_to_h256};
use hashdb::{FlushTicket, HashDb, WriteBatch};
use keccak_hash::keccak;
use rlp::RlpStream;
use tracing::{debug, warn};
use zk_executor_common::{h256_to_u256, u256_to_0x_hex, u256_to_h256};

use self::batch_data::{decode_batch, RawTransaction};
use crate::errors::ZkResult;
use crate::executor::{
    CallTrace, Counters, ExecutionResult, Executor, TransactionContext, TransactionOutcome,
};
use crate::request::BatchRequest;

pub const SUPPORTED_FORKS: RangeInclusive<u64> = 7..=9;

pub const BATCH_GAS_LIMIT: u64 = 30_000_000;

const TX_GAS: u64 = 21_000;
const TX_CREATE_GAS: u64 = 32_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NON_ZERO_GAS: u64 = 16;

const KECCAK_RATE: usize = 136;
const POSEIDON_BYTES_PER_PERMUTATION: usize = 56;

/// Circuit capacity of one batch.
pub const COUNTER_LIMITS: Counters = Counters {
    keccak_f: 2_145,
    poseidon_g: 252_357,
    padding_pg: 135_191,
    mem_align: 236_585,
    arith: 236_585,
    binary: 473_170,
    steps: 8_388_608,
};

pub struct TransferExecutor {
    db: Arc<dyn HashDb>,
    limits: Counters,
}

impl TransferExecutor {
    pub fn new(db: Arc<dyn HashDb>) -> Self {
        Self {
            db,
            limits: COUNTER_LIMITS,
        }
    }

    pub fn with_limits(self, limits: Counters) -> Self {
        Self { limits, ..self }
    }
}

impl Executor for TransferExecutor {
    fn supports_fork(&self, fork_id: u64) -> bool {
        SUPPORTED_FORKS.contains(&fork_id)
    }

    fn execute(&self, request: &BatchRequest) -> ExecutionResult {
        let txs = match decode_batch(&request.batch_l2_data) {
            Ok(txs) => txs,
            Err(e) => {
                warn!("uuid={} invalid batch L2 data: {e}", request.uuid);
                return ExecutionResult::from_result(ZkResult::InvalidBatchL2Data);
            }
        };

        let counters = if request.no_counters {
            Counters::default()
        } else {
            let counters = batch_counters(request, &txs);
            if let Some(overflow) = first_overflow(&counters, &self.limits) {
                debug!("uuid={} counters {counters:?} exceed limits", request.uuid);
                return ExecutionResult {
                    counters,
                    ..ExecutionResult::from_result(overflow)
                };
            }
            counters
        };

        let mut run = BatchRun::new(request);
        for tx in &txs {
            run.apply(tx);
        }
        let writes = run.writes;
        let ticket = if request.update_merkle_tree && !writes.is_empty() {
            self.db.write(writes)
        } else {
            let status = self.db.flush_status();
            FlushTicket {
                flush_id: status.last_flush_id,
                last_sent_flush_id: status.stored_flush_id,
            }
        };

        ExecutionResult {
            result: ZkResult::Success,
            counters,
            cumulative_gas_used: run.cumulative_gas_used,
            new_state_root: run.root,
            new_acc_input_hash: acc_input_hash(request),
            // Transfers never touch the bridge.
            new_local_exit_root: H256::zero(),
            new_batch_num: request.old_batch_num.saturating_add(1),
            read_write_addresses: None,
            responses: run.responses,
            flush_id: ticket.flush_id,
            last_sent_flush_id: ticket.last_sent_flush_id,
            opcodes: vec![],
        }
    }
}

/// Mutable state while the transactions of one batch are applied.
struct BatchRun<'a> {
    request: &'a BatchRequest,
    batch_hash: H256,
    root: H256,
    cumulative_gas_used: u64,
    next_nonce: HashMap<Address, u64>,
    writes: WriteBatch,
    responses: Vec<TransactionOutcome>,
}

impl<'a> BatchRun<'a> {
    fn new(request: &'a BatchRequest) -> Self {
        Self {
            request,
            batch_hash: keccak(&request.batch_l2_data),
            root: u256_to_h256(request.old_state_root),
            cumulative_gas_used: 0,
            next_nonce: HashMap::new(),
            writes: WriteBatch::default(),
            responses: vec![],
        }
    }

    fn apply(&mut self, tx: &RawTransaction) {
        let started = Instant::now();
        let hash = tx.hash();
        let sender = tx.sender();
        let intrinsic_gas = intrinsic_gas(tx);
        let error = self.intrinsic_error(tx, sender, intrinsic_gas);
        let old_root = self.root;

        let gas_used = if error.is_empty() { intrinsic_gas } else { 0 };
        let create_address = match (sender, tx.is_create()) {
            (Some(from), true) => Some(create_address(from, tx.nonce)),
            _ => None,
        };
        if let (Some(from), true) = (sender, error.is_empty()) {
            self.commit(tx, from, hash);
            self.cumulative_gas_used += gas_used;
        }

        let from = sender.map(|a| format!("{a:#x}")).unwrap_or_default();
        let to = tx
            .to
            .or(create_address)
            .map(|a| format!("{a:#x}"))
            .unwrap_or_default();
        let trace_config = &self.request.trace_config;
        let call_trace = trace_config.wants_call_trace(&hash).then(|| CallTrace {
            context: TransactionContext {
                call_type: if tx.is_create() { "CREATE" } else { "CALL" }.to_string(),
                from,
                to,
                data: tx.data.clone(),
                gas: tx.gas_limit,
                gas_price: tx.effective_gas_price(),
                value: tx.value,
                batch: self.batch_hash,
                output: vec![],
                gas_used,
                execution_time: u32::try_from(started.elapsed().as_micros()).unwrap_or(u32::MAX),
                old_state_root: old_root,
            },
            steps: vec![],
        });

        self.responses.push(TransactionOutcome {
            tx_hash: hash,
            rlp_tx: tx.signed_rlp(),
            tx_type: 0,
            return_value: vec![],
            gas_left: tx.gas_limit - gas_used,
            gas_used,
            gas_refunded: 0,
            error: error.to_string(),
            create_address: create_address
                .map(|a| format!("{a:#x}"))
                .unwrap_or_default(),
            state_root: self.root,
            effective_gas_price: u256_to_0x_hex(tx.effective_gas_price()),
            effective_percentage: u32::from(tx.effective_percentage),
            logs: vec![],
            // No code runs, so a traced transfer has no steps.
            execution_trace: vec![],
            call_trace,
        });
    }

    fn intrinsic_error(
        &self,
        tx: &RawTransaction,
        sender: Option<Address>,
        intrinsic_gas: u64,
    ) -> &'static str {
        let Some(from) = sender else {
            return "intrinsic_invalid_signature";
        };
        if tx.chain_id.is_some_and(|id| id != self.request.chain_id) {
            "intrinsic_invalid_chain_id"
        } else if self.next_nonce.get(&from).is_some_and(|n| *n != tx.nonce)
            || tx.nonce.checked_add(1).is_none()
        {
            // A sender at the last nonce can never send again.
            "intrinsic_invalid_nonce"
        } else if tx.gas_limit < intrinsic_gas {
            "intrinsic_invalid_gas_limit"
        } else if self.cumulative_gas_used.saturating_add(tx.gas_limit) > BATCH_GAS_LIMIT {
            "intrinsic_invalid_batch_gas_limit"
        } else {
            ""
        }
    }

    fn commit(&mut self, tx: &RawTransaction, from: Address, hash: H256) {
        let next = next_state_root(self.root, hash);
        let node = scalar_to_fea8(h256_to_u256(self.root))
            .into_iter()
            .chain(scalar_to_fea8(h256_to_u256(hash)))
            .collect();
        self.writes.nodes.insert(next, node);
        if tx.is_create() && !tx.data.is_empty() {
            self.writes
                .programs
                .insert(hashout_to_h256(hash_bytes(&tx.data)), tx.data.clone());
        }
        self.next_nonce.insert(from, tx.nonce.saturating_add(1));
        self.root = next;
    }
}

pub fn intrinsic_gas(tx: &RawTransaction) -> u64 {
    let data_gas: u64 = tx
        .data
        .iter()
        .map(|b| {
            if *b == 0 {
                TX_DATA_ZERO_GAS
            } else {
                TX_DATA_NON_ZERO_GAS
            }
        })
        .sum();
    let create_gas = if tx.is_create() { TX_CREATE_GAS } else { 0 };
    TX_GAS + data_gas + create_gas
}

fn next_state_root(root: H256, tx_hash: H256) -> H256 {
    let mut input = root.as_bytes().to_vec();
    input.extend_from_slice(tx_hash.as_bytes());
    hashout_to_h256(hash_bytes(&input))
}

/// `keccak(rlp([sender, nonce]))[12..]`.
fn create_address(sender: Address, nonce: u64) -> Address {
    let mut s = RlpStream::new_list(2);
    s.append(&sender);
    s.append(&nonce);
    Address::from_slice(&keccak(s.out())[12..])
}

/// `keccak(old_acc_input_hash || keccak(batch_l2_data) || global_exit_root
/// || timestamp || sequencer_addr)`, timestamp as 8 big-endian bytes.
pub fn acc_input_hash(request: &BatchRequest) -> H256 {
    let mut input = Vec::with_capacity(32 * 3 + 8 + 20);
    input.extend_from_slice(u256_to_h256(request.old_acc_input_hash).as_bytes());
    input.extend_from_slice(keccak(&request.batch_l2_data).as_bytes());
    input.extend_from_slice(u256_to_h256(request.global_exit_root).as_bytes());
    input.extend_from_slice(&request.timestamp.to_be_bytes());
    input.extend_from_slice(request.sequencer_addr.as_bytes());
    keccak(input)
}

fn keccak_rounds(len: usize) -> u64 {
    (len / KECCAK_RATE + 1) as u64
}

fn batch_counters(request: &BatchRequest, txs: &[RawTransaction]) -> Counters {
    // Batch hash plus accumulated input hash.
    let mut counters = Counters {
        keccak_f: keccak_rounds(request.batch_l2_data.len()) + keccak_rounds(32 * 3 + 8 + 20),
        poseidon_g: 1,
        padding_pg: 0,
        mem_align: 0,
        arith: 0,
        binary: 0,
        steps: 200,
    };
    for tx in txs {
        let data_len = tx.data.len() as u64;
        // Signing hash, sender address, transaction hash.
        counters.keccak_f += keccak_rounds(tx.unsigned_rlp.len())
            + keccak_rounds(64)
            + keccak_rounds(tx.unsigned_rlp.len() + 64);
        counters.poseidon_g += 1;
        counters.padding_pg += (tx.data.len() / POSEIDON_BYTES_PER_PERMUTATION + 1) as u64;
        counters.mem_align += data_len.div_ceil(32);
        // Signature recovery.
        counters.arith += 2;
        counters.binary += 30 + data_len;
        counters.steps += 600 + 8 * data_len;
    }
    counters
}

fn first_overflow(counters: &Counters, limits: &Counters) -> Option<ZkResult> {
    [
        (counters.steps, limits.steps, ZkResult::OutOfCountersSteps),
        (counters.keccak_f, limits.keccak_f, ZkResult::OutOfCountersKeccakF),
        (counters.poseidon_g, limits.poseidon_g, ZkResult::OutOfCountersPoseidonG),
        (counters.padding_pg, limits.padding_pg, ZkResult::OutOfCountersPaddingPg),
        (counters.mem_align, limits.mem_align, ZkResult::OutOfCountersMemAlign),
        (counters.arith, limits.arith, ZkResult::OutOfCountersArith),
        (counters.binary, limits.binary, ZkResult::OutOfCountersBinary),
    ]
    .into_iter()
    .find_map(|(used, limit, result)| (used > limit).then_some(result))
}
