//! Overlay Store
//!
//! One transaction's read/write view: a pooled buffer of pending writes
//! layered over a read-only snapshot.
//!
//! ## Responsibilities
//! - Read-your-writes: the buffer is consulted before the snapshot
//! - Deletes are tombstones that shadow snapshot values
//! - Merged range scans via [`UnionIter`]
//! - Carry each key's commit precondition for the commit layer
//! - Return the buffer to the pool exactly once

use std::collections::BTreeMap;
use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, trace, warn};

use crate::buffer::{BufferEntry, BufferPool, MemBuffer, MemDbBuffer};
use crate::config::Config;
use crate::error::Result;
use crate::merge::UnionIter;
use crate::snapshot::Snapshot;
use crate::{Key, OverlayError, Value};

/// Precondition a commit layer must verify for a pending write
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// Valid only if the key had no prior value
    NotExists,
    /// Valid only if the stored value still equals the originally observed one
    Equals(Value),
    /// No precondition
    Force,
}

/// A buffered write together with its recorded condition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingWrite {
    pub key: Key,
    pub entry: BufferEntry,
    pub condition: Condition,
}

/// Transactional overlay over a snapshot
///
/// ## Lifecycle: Open → Closed
///
/// - Created open; [`close`](Self::close) releases the snapshot and returns
///   the buffer to the pool
/// - Every operation after close panics: it is a lifecycle bug, not a
///   recoverable error
/// - Dropping an open store closes it
///
/// Not internally synchronized; drive one store from one thread at a time.
pub struct OverlayStore<S: Snapshot, B: MemBuffer + Default = MemDbBuffer> {
    pool: Arc<BufferPool<B>>,
    /// `None` once closed
    dirty: Option<B>,
    snapshot: S,
    /// First condition recorded per key
    conditions: BTreeMap<Key, Condition>,
    max_buffer_bytes: usize,
}

impl<S: Snapshot, B: MemBuffer + Default> OverlayStore<S, B> {
    /// Acquire a buffer from `pool` and bind `snapshot` for reads
    pub fn new(snapshot: S, pool: Arc<BufferPool<B>>, config: &Config) -> Self {
        let dirty = pool.acquire();
        debug!("overlay store opened");

        Self {
            pool,
            dirty: Some(dirty),
            snapshot,
            conditions: BTreeMap::new(),
            max_buffer_bytes: config.max_buffer_bytes,
        }
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get the visible value of a key
    ///
    /// Search order:
    /// 1. Buffer (a tombstone here means `NotFound`, whatever the snapshot holds)
    /// 2. Snapshot
    pub fn get(&self, key: &[u8]) -> Result<Value> {
        trace!(key = %key.escape_ascii(), "get");

        match self.dirty().get(key) {
            Some(BufferEntry::Value(value)) => Ok(value),
            Some(BufferEntry::Tombstone) => Err(OverlayError::NotFound),
            None => self.snapshot_get("get", key)?.ok_or(OverlayError::NotFound),
        }
    }

    /// Whether the key is visible; `NotFound` maps to `false`
    pub fn contains_key(&self, key: &[u8]) -> Result<bool> {
        match self.get(key) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Scan all visible entries with key >= `start`, in ascending key order
    ///
    /// The buffer side is copied at call time; the store cannot be mutated
    /// while the iterator is alive.
    pub fn seek(&self, start: &[u8]) -> Result<UnionIter<'_>> {
        trace!(start = %start.escape_ascii(), "seek");

        let dirty = self.dirty().iter_from(start);
        let snapshot = self
            .snapshot
            .iter_from(start)
            .map_err(|e| Self::propagate("seek", start, e))?;

        Ok(UnionIter::new(dirty, snapshot, start))
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Buffer a write with no precondition
    ///
    /// Empty values are reserved for tombstones and rejected with
    /// `InvalidArgument`.
    pub fn set(&mut self, key: &[u8], value: &[u8]) -> Result<()> {
        self.set_with_condition(key, value, Condition::Force)
    }

    /// Buffer a write and record `condition` for the commit layer
    ///
    /// Only the first condition recorded for a key is kept, since it
    /// describes the state originally observed by this transaction.
    pub fn set_with_condition(
        &mut self,
        key: &[u8],
        value: &[u8],
        condition: Condition,
    ) -> Result<()> {
        if value.is_empty() {
            return Err(OverlayError::InvalidArgument(format!(
                "empty value for key \"{}\" is reserved for deletes",
                key.escape_ascii()
            )));
        }
        trace!(key = %key.escape_ascii(), len = value.len(), "set");

        self.check_size(key, value.len())?;
        self.dirty_mut()
            .set(key.to_vec(), Bytes::copy_from_slice(value))?;
        self.conditions.entry(key.to_vec()).or_insert(condition);
        Ok(())
    }

    /// Delete a visible key
    ///
    /// Fails with `NotFound` (and changes nothing) if neither the buffer nor
    /// the snapshot has a live value for the key.
    pub fn delete(&mut self, key: &[u8]) -> Result<()> {
        trace!(key = %key.escape_ascii(), "delete");

        let condition = match self.dirty().get(key) {
            Some(BufferEntry::Value(_)) => Condition::Force,
            Some(BufferEntry::Tombstone) => return Err(OverlayError::NotFound),
            None => match self.snapshot_get("delete", key)? {
                Some(observed) => Condition::Equals(observed),
                None => return Err(OverlayError::NotFound),
            },
        };

        self.check_size(key, 0)?;
        self.dirty_mut().set(key.to_vec(), Bytes::new())?;
        self.conditions.entry(key.to_vec()).or_insert(condition);
        Ok(())
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Release the snapshot and return the reset buffer to the pool
    ///
    /// # Panics
    /// If the store is already closed.
    pub fn close(&mut self) {
        let dirty = self.take_dirty();
        self.finish(dirty);
        debug!("overlay store closed");
    }

    pub fn is_closed(&self) -> bool {
        self.dirty.is_none()
    }

    // =========================================================================
    // Pending State (for the commit layer)
    // =========================================================================

    /// Condition recorded for a key, if it was written in this transaction
    pub fn condition(&self, key: &[u8]) -> Option<&Condition> {
        self.ensure_open();
        self.conditions.get(key)
    }

    /// All buffered writes with their conditions, in key order
    pub fn pending(&self) -> impl Iterator<Item = PendingWrite> + '_ {
        self.dirty().iter_from(&[]).map(move |(key, entry)| {
            let condition = self
                .conditions
                .get(&key)
                .cloned()
                .unwrap_or(Condition::Force);
            PendingWrite {
                key,
                entry,
                condition,
            }
        })
    }

    /// Number of buffered entries, tombstones included
    pub fn len(&self) -> usize {
        self.dirty().len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirty().is_empty()
    }

    /// Approximate size of buffered writes (in bytes)
    pub fn buffer_size(&self) -> usize {
        self.dirty().size()
    }

    /// The bound snapshot
    pub fn snapshot(&self) -> &S {
        &self.snapshot
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    fn ensure_open(&self) {
        if self.dirty.is_none() {
            panic!("overlay store used after close");
        }
    }

    fn dirty(&self) -> &B {
        self.dirty
            .as_ref()
            .unwrap_or_else(|| panic!("overlay store used after close"))
    }

    fn dirty_mut(&mut self) -> &mut B {
        self.dirty
            .as_mut()
            .unwrap_or_else(|| panic!("overlay store used after close"))
    }

    fn take_dirty(&mut self) -> B {
        self.dirty
            .take()
            .unwrap_or_else(|| panic!("overlay store closed twice"))
    }

    fn finish(&mut self, dirty: B) {
        self.snapshot.release();
        self.conditions.clear();
        self.pool.release(dirty);
    }

    fn snapshot_get(&self, op: &'static str, key: &[u8]) -> Result<Option<Value>> {
        self.snapshot
            .get(key)
            .map_err(|e| Self::propagate(op, key, e))
    }

    fn propagate(op: &'static str, key: &[u8], err: OverlayError) -> OverlayError {
        warn!(op, key = %key.escape_ascii(), error = %err, "snapshot error");
        OverlayError::backend(op, key, err)
    }

    /// Reject a write that would push the buffer over `max_buffer_bytes`
    fn check_size(&self, key: &[u8], value_len: usize) -> Result<()> {
        let dirty = self.dirty();
        let projected = match dirty.get(key) {
            Some(existing) => dirty.size() - existing.value_len() + value_len,
            None => dirty.size() + key.len() + value_len,
        };

        if projected > self.max_buffer_bytes {
            return Err(OverlayError::TxnTooLarge {
                size: projected,
                limit: self.max_buffer_bytes,
            });
        }
        Ok(())
    }
}

impl<S: Snapshot, B: MemBuffer + Default> Drop for OverlayStore<S, B> {
    fn drop(&mut self) {
        if let Some(dirty) = self.dirty.take() {
            warn!(pending = dirty.len(), "overlay store dropped without close");
            self.finish(dirty);
        }
    }
}
