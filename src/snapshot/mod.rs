//! Snapshot Module
//!
//! Read-only, sorted, point-in-time views of committed state.
//!
//! ## Responsibilities
//! - Point lookups and ascending iteration from a start key
//! - Never carry tombstones: a deleted key is simply absent
//! - Release underlying resources once the overlay is done
//!
//! ## Backends
//! - [`MemSnapshot`]: shared in-memory BTreeMap (tests, embedding)
//! - [`SSTableSnapshot`]: an immutable sorted table file on disk

mod memory;
pub mod sstable;

pub use memory::MemSnapshot;
pub use sstable::SSTableSnapshot;

use crate::error::Result;
use crate::{Key, Value};

/// Lazy ascending sequence of committed `(key, value)` pairs
pub type SnapshotIter<'a> = Box<dyn Iterator<Item = Result<(Key, Value)>> + 'a>;

/// Capability contract for a committed, read-only view
///
/// `Send` so an overlay bound to a snapshot can move to another thread.
pub trait Snapshot: Send {
    /// Point lookup. `Ok(None)` means the key does not exist.
    fn get(&self, key: &[u8]) -> Result<Option<Value>>;

    /// Entries with key >= `start`, ascending. Single-pass; call again to re-scan.
    fn iter_from(&self, start: &[u8]) -> Result<SnapshotIter<'_>>;

    /// Signal that the reader is done with this view
    fn release(&mut self);
}

impl<S: Snapshot + ?Sized> Snapshot for Box<S> {
    fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        (**self).get(key)
    }

    fn iter_from(&self, start: &[u8]) -> Result<SnapshotIter<'_>> {
        (**self).iter_from(start)
    }

    fn release(&mut self) {
        (**self).release()
    }
}
