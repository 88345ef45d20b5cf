//! Merge Iterator
//!
//! Sorted union of a transaction buffer and a snapshot, where the buffer
//! overrides the snapshot.
//!
//! ## Rules (per step)
//! - Smaller key wins and only that side advances
//! - Equal keys: the buffer entry wins and both sides advance
//! - Buffer tombstones are consumed but never emitted
//!
//! Holds only the current head of each side, so memory use does not grow
//! with the size of the key space.

use std::cmp::Ordering;
use std::iter::{FusedIterator, Peekable};

use tracing::warn;

use crate::buffer::{BufferEntry, BufferIterator};
use crate::error::Result;
use crate::snapshot::SnapshotIter;
use crate::{Key, OverlayError, Value};

/// Ascending, duplicate-free view of "buffer over snapshot"
///
/// A snapshot error is yielded once (annotated as a `seek` failure on the
/// start key) and then the iterator ends.
pub struct UnionIter<'a> {
    dirty: Peekable<BufferIterator>,
    snapshot: SnapshotIter<'a>,
    /// Pending snapshot entry not yet emitted or shadowed
    snapshot_head: Option<(Key, Value)>,
    start: Key,
    done: bool,
}

impl<'a> UnionIter<'a> {
    pub fn new(dirty: BufferIterator, snapshot: SnapshotIter<'a>, start: &[u8]) -> Self {
        Self {
            dirty: dirty.peekable(),
            snapshot,
            snapshot_head: None,
            start: start.to_vec(),
            done: false,
        }
    }

    /// Pull the next snapshot entry into `snapshot_head` if it is empty
    fn fill_snapshot_head(&mut self) -> Result<()> {
        if self.snapshot_head.is_none() {
            if let Some(next) = self.snapshot.next() {
                let entry = next.map_err(|e| {
                    warn!(
                        op = "seek",
                        key = %self.start.escape_ascii(),
                        error = %e,
                        "snapshot error during scan"
                    );
                    OverlayError::backend("seek", &self.start, e)
                })?;
                self.snapshot_head = Some(entry);
            }
        }
        Ok(())
    }
}

impl Iterator for UnionIter<'_> {
    type Item = Result<(Key, Value)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            if let Err(e) = self.fill_snapshot_head() {
                self.done = true;
                return Some(Err(e));
            }

            let order = match (self.dirty.peek(), &self.snapshot_head) {
                (None, None) => {
                    self.done = true;
                    return None;
                }
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (Some((dirty_key, _)), Some((snap_key, _))) => dirty_key.cmp(snap_key),
            };

            match order {
                Ordering::Greater => return self.snapshot_head.take().map(Ok),
                // Buffer shadows the snapshot value for this key
                Ordering::Equal => self.snapshot_head = None,
                Ordering::Less => {}
            }

            match self.dirty.next()? {
                (key, BufferEntry::Value(value)) => return Some(Ok((key, value))),
                (_, BufferEntry::Tombstone) => continue,
            }
        }
    }
}

impl FusedIterator for UnionIter<'_> {}
