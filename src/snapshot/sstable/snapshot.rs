//! SSTable-backed snapshot
//!
//! Serves one immutable SSTable file through the [`Snapshot`] contract.

use std::path::Path;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::debug;

use crate::error::Result;
use crate::snapshot::{Snapshot, SnapshotIter};
use crate::OverlayError;

use super::SSTableReader;

/// Read-only view over a single SSTable file
///
/// ## Concurrency:
/// - `reader`: point lookups seek the shared file handle, so they go through
///   a Mutex; range scans open their own handle and never hold the lock
/// - `None` once released
pub struct SSTableSnapshot {
    reader: Mutex<Option<SSTableReader>>,
}

impl SSTableSnapshot {
    /// Open and validate an SSTable as a snapshot
    pub fn open(path: &Path) -> Result<Self> {
        let reader = SSTableReader::open(path)?;
        debug!(
            path = %path.display(),
            entries = reader.entry_count(),
            "opened sstable snapshot"
        );
        Ok(Self {
            reader: Mutex::new(Some(reader)),
        })
    }

    pub fn entry_count(&self) -> u64 {
        self.reader.lock().as_ref().map_or(0, |r| r.entry_count())
    }

    pub fn is_released(&self) -> bool {
        self.reader.lock().is_none()
    }
}

fn released() -> OverlayError {
    OverlayError::Storage("snapshot released".to_string())
}

impl Snapshot for SSTableSnapshot {
    fn get(&self, key: &[u8]) -> Result<Option<Bytes>> {
        let mut guard = self.reader.lock();
        let reader = guard.as_mut().ok_or_else(released)?;

        // Skip the file if key is outside its range (O(1) check)
        if !reader.might_contain(key) {
            return Ok(None);
        }
        reader.get(key)
    }

    fn iter_from(&self, start: &[u8]) -> Result<SnapshotIter<'_>> {
        let guard = self.reader.lock();
        let reader = guard.as_ref().ok_or_else(released)?;
        Ok(Box::new(reader.iter_from(start)?))
    }

    fn release(&mut self) {
        if let Some(reader) = self.reader.get_mut().take() {
            debug!(path = %reader.path().display(), "released sstable snapshot");
        }
    }
}
