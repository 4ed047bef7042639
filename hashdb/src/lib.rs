#![allow(clippy::too_long_first_doc_paragraph)]

//! Key/value store contract used by the batch executor.
//!
//! Values are sequences of Goldilocks field elements (Merkle tree nodes) or
//! raw bytes (contract programs), addressed by 32-byte keys. Writes become
//! visible immediately but only become durable once a background flusher
//! persists them; every write batch is tagged with a monotonically increasing
//! flush id so callers can later learn whether their batch is durable by
//! polling [`FlushStatus`].

pub mod db;
pub mod fea;
pub mod flush;
pub mod poseidon;

pub use db::{FlushTicket, HashDb, Key, MemoryDb, WriteBatch};
pub use fea::F;
pub use flush::FlushStatus;
