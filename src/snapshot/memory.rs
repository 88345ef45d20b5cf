//! In-memory snapshot
//!
//! Cheaply cloneable view over a shared BTreeMap.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use crate::error::Result;
use crate::{Key, OverlayError, Value};

use super::{Snapshot, SnapshotIter};

/// Snapshot backed by an immutable, shared BTreeMap
///
/// Clones share the data but track release independently.
#[derive(Debug, Clone, Default)]
pub struct MemSnapshot {
    data: Arc<BTreeMap<Key, Value>>,
    released: bool,
}

impl MemSnapshot {
    pub fn new(data: BTreeMap<Key, Value>) -> Self {
        // Snapshots never hold tombstones
        let data = data.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        Self {
            data: Arc::new(data),
            released: false,
        }
    }

    /// Whether `release` has been called on this handle
    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn ensure_live(&self) -> Result<()> {
        if self.released {
            return Err(OverlayError::Storage("snapshot released".to_string()));
        }
        Ok(())
    }
}

impl<K: Into<Key>, V: Into<Value>> FromIterator<(K, V)> for MemSnapshot {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl Snapshot for MemSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Value>> {
        self.ensure_live()?;
        Ok(self.data.get(key).cloned())
    }

    fn iter_from(&self, start: &[u8]) -> Result<SnapshotIter<'_>> {
        self.ensure_live()?;
        let iter = self
            .data
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .map(|(k, v)| Ok((k.clone(), v.clone())));
        Ok(Box::new(iter))
    }

    fn release(&mut self) {
        self.released = true;
    }
}
