#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use ethereum_types::{Address, U256};
use hashdb::MemoryDb;
pub use keccak_hash::keccak as k;
use rlp::RlpStream;
use zk_executor::config::ExecutorConfig;
use zk_executor::executor::{ExecutionResult, Executor};
use zk_executor::request::BatchRequest;
use zk_executor::service::ExecutorService;
use zk_executor::transfer::TransferExecutor;
use zk_executor::wire::ProcessBatchRequest;

pub const CHAIN_ID: u64 = 1001;
pub const FORK_ID: u64 = 9;
pub const GAS_LIMIT: u64 = 30_000;

/// [`TransferExecutor`] that counts how often it is invoked.
pub struct CountingExecutor {
    inner: TransferExecutor,
    calls: AtomicUsize,
}

impl CountingExecutor {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Executor for CountingExecutor {
    fn supports_fork(&self, fork_id: u64) -> bool {
        self.inner.supports_fork(fork_id)
    }

    fn execute(&self, request: &BatchRequest) -> ExecutionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.execute(request)
    }
}

pub struct Harness {
    pub service: Arc<ExecutorService>,
    pub executor: Arc<CountingExecutor>,
    pub db: Arc<MemoryDb>,
}

pub fn harness() -> Harness {
    harness_with(ExecutorConfig {
        prover_id: "test-prover".to_string(),
        ..Default::default()
    })
}

pub fn harness_with(config: ExecutorConfig) -> Harness {
    let db = Arc::new(MemoryDb::new(config.prover_id.clone()));
    let executor = Arc::new(CountingExecutor {
        inner: TransferExecutor::new(db.clone()),
        calls: AtomicUsize::new(0),
    });
    let service = Arc::new(ExecutorService::new(executor.clone(), db.clone(), config));
    Harness {
        service,
        executor,
        db,
    }
}

/// `0x00..01`, as 32 bytes.
pub fn old_state_root() -> Vec<u8> {
    let mut root = vec![0; 32];
    root[31] = 1;
    root
}

pub fn request(batch_l2_data: Vec<u8>) -> ProcessBatchRequest {
    ProcessBatchRequest {
        old_state_root: old_state_root(),
        old_acc_input_hash: vec![0; 32],
        old_batch_num: 1,
        chain_id: CHAIN_ID,
        fork_id: FORK_ID,
        batch_l2_data,
        global_exit_root: vec![0; 32],
        eth_timestamp: 1_700_000_000,
        coinbase: "0x617b3a3528F9cDd6630fd3301B9c8911F7Bf063D".to_string(),
        external_request_id: "integration".to_string(),
        ..Default::default()
    }
}

pub fn secret_key(seed: u8) -> secp256k1::SecretKey {
    secp256k1::SecretKey::from_slice(&[seed; 32]).unwrap()
}

/// Batch encoding of an EIP-155 value transfer signed with `key`.
pub fn signed_transfer(key: &secp256k1::SecretKey, nonce: u64) -> Vec<u8> {
    let mut s = RlpStream::new_list(9);
    s.append(&nonce);
    s.append(&U256::from(1_000_000_000u64));
    s.append(&GAS_LIMIT);
    s.append(&Address::repeat_byte(0x22));
    s.append(&U256::from(1u64));
    s.append(&Vec::<u8>::new());
    s.append(&CHAIN_ID);
    s.append(&0u8);
    s.append(&0u8);
    let mut out = s.out().to_vec();

    let message = secp256k1::Message::from_digest(k(&out).to_fixed_bytes());
    let (recovery_id, compact) = secp256k1::SECP256K1
        .sign_ecdsa_recoverable(&message, key)
        .serialize_compact();
    out.extend_from_slice(&compact);
    out.push(27 + i32::from(recovery_id) as u8);
    out.push(0xff);
    out
}

/// Hash of the transaction [`signed_transfer`] produces, as the executor
/// reports it.
pub fn transfer_hash(key: &secp256k1::SecretKey, nonce: u64) -> Vec<u8> {
    let batch = signed_transfer(key, nonce);
    let txs = zk_executor::transfer::batch_data::decode_batch(&batch).unwrap();
    txs[0].hash().as_bytes().to_vec()
}
