//! Buffer Module
//!
//! In-memory, per-transaction store of pending writes.
//!
//! ## Responsibilities
//! - Hold at most one entry per key (last write wins)
//! - Represent deletes as tombstones (a zero-length value)
//! - Ordered iteration from a start key for merged range scans
//! - Track approximate size for the transaction size limit
//!
//! ## Implementations
//! - [`MemDbBuffer`]: BTreeMap, O(log n) writes anywhere in the key space
//! - [`SortedVecBuffer`]: contiguous sorted Vec, cheap scans and reuse for
//!   small or append-mostly transactions
//!
//! Neither has internal locking: a buffer is owned by exactly one
//! transaction at a time, and sharing happens only through [`BufferPool`].

mod pool;
mod sorted;
mod table;

use bytes::Bytes;

use crate::{Key, Value};

pub use pool::{BufferPool, PoolStats};
pub use sorted::SortedVecBuffer;
pub use table::{BufferIterator, MemDbBuffer};

/// Entry stored in a transaction buffer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BufferEntry {
    /// A live value (never empty)
    Value(Value),

    /// A tombstone (deleted in this transaction)
    Tombstone,
}

impl BufferEntry {
    /// Build an entry from a raw value; zero length means tombstone
    pub fn from_raw(value: Value) -> Self {
        if value.is_empty() {
            BufferEntry::Tombstone
        } else {
            BufferEntry::Value(value)
        }
    }

    pub fn is_tombstone(&self) -> bool {
        matches!(self, BufferEntry::Tombstone)
    }

    /// Raw bytes of the entry; empty for a tombstone
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            BufferEntry::Value(v) => v,
            BufferEntry::Tombstone => &[],
        }
    }

    /// The entry as a raw value; empty for a tombstone
    pub fn into_raw(self) -> Value {
        match self {
            BufferEntry::Value(v) => v,
            BufferEntry::Tombstone => Bytes::new(),
        }
    }

    /// Number of value bytes held by this entry
    pub fn value_len(&self) -> usize {
        self.as_bytes().len()
    }
}

/// Capability contract for a transaction buffer
///
/// Iteration order is ascending unsigned byte-wise key order, the same order a
/// [`Snapshot`](crate::snapshot::Snapshot) iterates in.
pub trait MemBuffer: Send {
    /// Exact lookup. `None` means the key was never written in this buffer,
    /// which is distinct from `Some(BufferEntry::Tombstone)`.
    fn get(&self, key: &[u8]) -> Option<BufferEntry>;

    /// Unconditional upsert; an empty value stores a tombstone.
    fn set(&mut self, key: Key, value: Value) -> crate::Result<()>;

    /// Entries with key >= `start`, ascending, as they were at call time.
    fn iter_from(&self, start: &[u8]) -> BufferIterator;

    /// Remove every entry
    fn reset(&mut self);

    /// Number of entries, tombstones included
    fn len(&self) -> usize;

    /// Approximate size in bytes (keys + values)
    fn size(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
