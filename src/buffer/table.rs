//! MemDbBuffer implementation
//!
//! BTreeMap-based transaction buffer with size tracking.

use std::collections::BTreeMap;
use std::ops::Bound;

use crate::error::Result;
use crate::{Key, Value};

use super::{BufferEntry, MemBuffer};

/// In-memory ordered buffer of one transaction's pending writes
#[derive(Debug, Default)]
pub struct MemDbBuffer {
    data: BTreeMap<Key, BufferEntry>,
    /// Sum of key and value lengths over all entries
    size: usize,
}

impl MemDbBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self::default()
    }
}

impl MemBuffer for MemDbBuffer {
    fn get(&self, key: &[u8]) -> Option<BufferEntry> {
        self.data.get(key).cloned()
    }

    fn set(&mut self, key: Key, value: Value) -> Result<()> {
        let entry = BufferEntry::from_raw(value);
        let added = key.len() + entry.value_len();

        match self.data.get_mut(&key) {
            Some(existing) => {
                // Key bytes are already counted; swap only the value part
                self.size = self.size - existing.value_len() + entry.value_len();
                *existing = entry;
            }
            None => {
                self.size += added;
                self.data.insert(key, entry);
            }
        }
        Ok(())
    }

    fn iter_from(&self, start: &[u8]) -> BufferIterator {
        // Copy-on-iterate: values are `Bytes`, so this clones refcounts, not payloads
        let entries: Vec<(Key, BufferEntry)> = self
            .data
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        BufferIterator::new(entries)
    }

    fn reset(&mut self) {
        self.data.clear();
        self.size = 0;
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn size(&self) -> usize {
        self.size
    }
}

/// Ascending iterator over a buffer's entries, detached from the buffer
pub struct BufferIterator {
    inner: std::vec::IntoIter<(Key, BufferEntry)>,
}

impl BufferIterator {
    /// Wrap entries already copied out of a buffer, in ascending key order
    pub(super) fn new(entries: Vec<(Key, BufferEntry)>) -> Self {
        Self {
            inner: entries.into_iter(),
        }
    }
}

impl Iterator for BufferIterator {
    type Item = (Key, BufferEntry);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
