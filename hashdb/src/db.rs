use std::collections::HashMap;

use ethereum_types::H256;
use parking_lot::Mutex;
use tracing::debug;

use crate::fea::F;
use crate::flush::{FlushPipeline, FlushStatus};

/// Canonical 32-byte key of a node or program.
pub type Key = H256;

/// A set of writes that share one flush id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteBatch {
    pub nodes: HashMap<Key, Vec<F>>,
    pub programs: HashMap<Key, Vec<u8>>,
}

impl WriteBatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.programs.is_empty()
    }
}

/// Result of handing a [`WriteBatch`] to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushTicket {
    /// Flush id assigned to the batch.
    pub flush_id: u64,
    /// Highest flush id already durable when the batch was accepted.
    pub last_sent_flush_id: u64,
}

/// Store contract used by executors and by the flush status query.
///
/// Implementations are internally synchronized; callers never lock around
/// them.
pub trait HashDb: Send + Sync {
    fn get_node(&self, key: &Key) -> Option<Vec<F>>;

    fn get_program(&self, key: &Key) -> Option<Vec<u8>>;

    /// Makes the writes readable right away and queues them for persistence.
    fn write(&self, batch: WriteBatch) -> FlushTicket;

    fn flush_status(&self) -> FlushStatus;
}

#[derive(Debug, Default)]
struct Inner {
    nodes: HashMap<Key, Vec<F>>,
    programs: HashMap<Key, Vec<u8>>,
    pipeline: FlushPipeline,
}

/// In-memory [`HashDb`]. Persistence is simulated by [`MemoryDb::flush`],
/// which a caller is expected to drive periodically.
#[derive(Debug, Default)]
pub struct MemoryDb {
    prover_id: String,
    inner: Mutex<Inner>,
}

impl MemoryDb {
    pub fn new(prover_id: impl Into<String>) -> Self {
        Self {
            prover_id: prover_id.into(),
            inner: Mutex::default(),
        }
    }

    /// Starts persisting everything pending. Returns the flush id now being
    /// stored, if any.
    pub fn begin_flush(&self) -> Option<u64> {
        self.inner.lock().pipeline.begin_flush()
    }

    /// Finishes the in-progress flush. Returns the newly stored flush id, if
    /// a flush was in progress.
    pub fn complete_flush(&self) -> Option<u64> {
        self.inner.lock().pipeline.complete_flush()
    }

    /// Runs one whole flush cycle: completes the in-progress flush, then
    /// persists whatever is pending.
    pub fn flush(&self) -> u64 {
        let mut inner = self.inner.lock();
        inner.pipeline.complete_flush();
        if let Some(id) = inner.pipeline.begin_flush() {
            debug!("storing flush id {id}");
            inner.pipeline.complete_flush();
        }
        inner.pipeline.stored_flush_id()
    }
}

impl HashDb for MemoryDb {
    fn get_node(&self, key: &Key) -> Option<Vec<F>> {
        self.inner.lock().nodes.get(key).cloned()
    }

    fn get_program(&self, key: &Key) -> Option<Vec<u8>> {
        self.inner.lock().programs.get(key).cloned()
    }

    fn write(&self, batch: WriteBatch) -> FlushTicket {
        let mut inner = self.inner.lock();
        let flush_id = inner
            .pipeline
            .register(batch.nodes.len() as u64, batch.programs.len() as u64);
        inner.nodes.extend(batch.nodes);
        inner.programs.extend(batch.programs);
        FlushTicket {
            flush_id,
            last_sent_flush_id: inner.pipeline.stored_flush_id(),
        }
    }

    fn flush_status(&self) -> FlushStatus {
        self.inner.lock().pipeline.status(&self.prover_id)
    }
}
