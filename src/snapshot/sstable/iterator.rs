//! SSTable Iterator
//!
//! Sequential iteration over a suffix of an SSTable's data block.

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use bytes::Bytes;

use crate::error::Result;
use crate::OverlayError;

use super::{le_u32, ENTRY_HEADER_SIZE};

/// Iterator over SSTable entries in sorted key order
///
/// Stops for good after the first error.
pub struct SSTableIterator {
    file: BufReader<File>,
    /// Stop reading when we reach this offset (start of index block)
    end_offset: u64,
    /// Current position in file
    current_offset: u64,
    failed: bool,
}

impl SSTableIterator {
    /// Open a dedicated handle positioned at `start_offset`
    pub(super) fn open(path: &Path, start_offset: u64, end_offset: u64) -> Result<Self> {
        let mut file = BufReader::new(File::open(path)?);
        file.seek(SeekFrom::Start(start_offset))?;
        Ok(Self {
            file,
            end_offset,
            current_offset: start_offset,
            failed: false,
        })
    }

    fn read_entry(&mut self) -> Result<(Vec<u8>, Bytes)> {
        let mut header = [0u8; ENTRY_HEADER_SIZE as usize];
        self.file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]) as usize;
        let val_len = le_u32(&header[4..8]) as usize;

        let entry_size = ENTRY_HEADER_SIZE + key_len as u64 + val_len as u64;
        if self.current_offset + entry_size > self.end_offset {
            return Err(OverlayError::Storage(format!(
                "SSTable entry at offset {} overruns data block",
                self.current_offset
            )));
        }

        let mut key = vec![0u8; key_len];
        self.file.read_exact(&mut key)?;

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        self.current_offset += entry_size;
        Ok((key, Bytes::from(value)))
    }
}

impl Iterator for SSTableIterator {
    type Item = Result<(Vec<u8>, Bytes)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.current_offset >= self.end_offset {
            return None;
        }

        let entry = self.read_entry();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}
