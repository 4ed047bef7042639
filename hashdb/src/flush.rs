//! Flush-id bookkeeping.
//!
//! Every write batch handed to the store gets the next flush id. The
//! background flusher picks up everything pending, marks it as being stored,
//! and eventually reports it as stored:
//!
//! ```text
//! pending --begin_flush--> storing --complete_flush--> stored
//! ```
//!
//! so `stored_flush_id <= storing_flush_id <= last_flush_id` always holds.

use serde::{Deserialize, Serialize};

/// Snapshot of the durability pipeline of the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlushStatus {
    /// Highest flush id that is durably persisted.
    pub stored_flush_id: u64,
    /// Flush id currently being persisted.
    pub storing_flush_id: u64,
    /// Highest flush id handed out to any writer.
    pub last_flush_id: u64,
    pub pending_to_flush_nodes: u64,
    pub pending_to_flush_program: u64,
    pub storing_nodes: u64,
    pub storing_program: u64,
    pub prover_id: String,
}

impl FlushStatus {
    pub fn is_consistent(&self) -> bool {
        self.stored_flush_id <= self.storing_flush_id
            && self.storing_flush_id <= self.last_flush_id
    }

    /// Whether the writes tagged with `flush_id` have reached storage.
    pub fn is_durable(&self, flush_id: u64) -> bool {
        flush_id <= self.stored_flush_id
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Counts {
    nodes: u64,
    programs: u64,
}

impl Counts {
    fn absorb(&mut self, other: Counts) {
        self.nodes += other.nodes;
        self.programs += other.programs;
    }
}

#[derive(Debug, Default)]
pub(crate) struct FlushPipeline {
    last_flush_id: u64,
    storing_flush_id: u64,
    stored_flush_id: u64,
    pending: Counts,
    storing: Option<Counts>,
}

impl FlushPipeline {
    /// Registers a new write batch and returns its flush id.
    pub(crate) fn register(&mut self, nodes: u64, programs: u64) -> u64 {
        self.last_flush_id += 1;
        self.pending.absorb(Counts { nodes, programs });
        self.last_flush_id
    }

    /// Moves everything pending into the storing stage. Returns the flush id
    /// being stored, or `None` if there was nothing to do or a previous flush
    /// is still in progress.
    pub(crate) fn begin_flush(&mut self) -> Option<u64> {
        if self.storing.is_some() || self.last_flush_id == self.stored_flush_id {
            return None;
        }
        self.storing = Some(std::mem::take(&mut self.pending));
        self.storing_flush_id = self.last_flush_id;
        Some(self.storing_flush_id)
    }

    /// Marks the in-progress flush as durable.
    pub(crate) fn complete_flush(&mut self) -> Option<u64> {
        self.storing.take()?;
        self.stored_flush_id = self.storing_flush_id;
        Some(self.stored_flush_id)
    }

    pub(crate) fn stored_flush_id(&self) -> u64 {
        self.stored_flush_id
    }

    pub(crate) fn status(&self, prover_id: &str) -> FlushStatus {
        let storing = self.storing.unwrap_or_default();
        let status = FlushStatus {
            stored_flush_id: self.stored_flush_id,
            storing_flush_id: self.storing_flush_id,
            last_flush_id: self.last_flush_id,
            pending_to_flush_nodes: self.pending.nodes,
            pending_to_flush_program: self.pending.programs,
            storing_nodes: storing.nodes,
            storing_program: storing.programs,
            prover_id: prover_id.to_string(),
        };
        debug_assert!(status.is_consistent(), "flush ids out of order: {status:?}");
        status
    }
}
