//! SortedVecBuffer implementation
//!
//! Transaction buffer kept as a single sorted Vec with binary-search upsert.

use crate::{Key, Value};

use super::{BufferEntry, BufferIterator, MemBuffer};

/// Ordered buffer backed by one contiguous Vec
///
/// Lookups are O(log n); inserting a new key shifts the tail, so writes in
/// ascending key order are the cheap case. `reset` keeps the allocation,
/// which a pooled buffer reuses on the next transaction.
#[derive(Debug, Default)]
pub struct SortedVecBuffer {
    /// Sorted by key, at most one entry per key
    entries: Vec<(Key, BufferEntry)>,
    /// Sum of key and value lengths over all entries
    size: usize,
}

impl SortedVecBuffer {
    /// Create a new empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// `Ok(index)` of the key, or `Err(index)` where it would be inserted
    fn search(&self, key: &[u8]) -> std::result::Result<usize, usize> {
        self.entries
            .binary_search_by(|(existing, _)| existing.as_slice().cmp(key))
    }
}

impl MemBuffer for SortedVecBuffer {
    fn get(&self, key: &[u8]) -> Option<BufferEntry> {
        self.search(key)
            .ok()
            .map(|index| self.entries[index].1.clone())
    }

    fn set(&mut self, key: Key, value: Value) -> crate::Result<()> {
        let entry = BufferEntry::from_raw(value);

        match self.search(&key) {
            Ok(index) => {
                let slot = &mut self.entries[index].1;
                self.size = self.size - slot.value_len() + entry.value_len();
                *slot = entry;
            }
            Err(index) => {
                self.size += key.len() + entry.value_len();
                self.entries.insert(index, (key, entry));
            }
        }
        Ok(())
    }

    fn iter_from(&self, start: &[u8]) -> BufferIterator {
        let from = self
            .entries
            .partition_point(|(key, _)| key.as_slice() < start);
        BufferIterator::new(self.entries[from..].to_vec())
    }

    fn reset(&mut self) {
        self.entries.clear();
        self.size = 0;
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn size(&self) -> usize {
        self.size
    }
}
