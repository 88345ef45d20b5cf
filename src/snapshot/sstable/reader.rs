//! SSTable Reader
//!
//! Opens SSTable files and provides O(log n) key lookups via in-memory index.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::ops::Bound;
use std::path::{Path, PathBuf};

use bytes::Bytes;

use crate::error::Result;
use crate::OverlayError;

use super::iterator::SSTableIterator;
use super::{le_u32, le_u64, ENTRY_HEADER_SIZE, FOOTER_SIZE, HEADER_SIZE, MAGIC, VERSION};

/// Reader for SSTable files with in-memory index for O(log n) lookups
pub struct SSTableReader {
    path: PathBuf,
    /// File handle for point lookups
    file: BufReader<File>,
    /// In-memory index: key → file offset
    index: BTreeMap<Vec<u8>, u64>,
    entry_count: u64,
    /// Index block starting offset (end of data block)
    index_offset: u64,
}

impl SSTableReader {
    /// Open an SSTable for reading
    ///
    /// Validates header and data CRC, then loads the entire index into memory,
    /// rejecting offsets that fall outside the data block.
    pub fn open(path: &Path) -> Result<Self> {
        let mut file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size < HEADER_SIZE + FOOTER_SIZE {
            return Err(OverlayError::Storage(format!(
                "SSTable too small: {} bytes",
                file_size
            )));
        }

        // Read and validate header
        let mut header = [0u8; HEADER_SIZE as usize];
        file.read_exact(&mut header)?;

        if &header[0..4] != MAGIC {
            return Err(OverlayError::Storage(format!(
                "Invalid SSTable magic: expected OVKV, got {:?}",
                &header[0..4]
            )));
        }

        let version = u16::from_le_bytes([header[4], header[5]]);
        if version != VERSION {
            return Err(OverlayError::Storage(format!(
                "Unsupported SSTable version: {}",
                version
            )));
        }

        let entry_count = le_u64(&header[6..14]);

        // Footer: index offset + data CRC
        file.seek(SeekFrom::End(-(FOOTER_SIZE as i64)))?;
        let mut footer = [0u8; FOOTER_SIZE as usize];
        file.read_exact(&mut footer)?;

        let index_offset = le_u64(&footer[0..8]);
        let data_crc = le_u32(&footer[8..12]);

        if index_offset < HEADER_SIZE || index_offset > file_size - FOOTER_SIZE {
            return Err(OverlayError::Storage(format!(
                "Invalid SSTable index offset: {}",
                index_offset
            )));
        }

        // Verify data block checksum
        file.seek(SeekFrom::Start(HEADER_SIZE))?;
        let mut data = vec![0u8; (index_offset - HEADER_SIZE) as usize];
        file.read_exact(&mut data)?;
        let actual_crc = crc32fast::hash(&data);
        if actual_crc != data_crc {
            return Err(OverlayError::Storage(format!(
                "SSTable data checksum mismatch: expected {:08x}, got {:08x}",
                data_crc, actual_crc
            )));
        }

        // Index block size = file_size - footer_size - index_offset
        let index_block_size = file_size - FOOTER_SIZE - index_offset;
        let mut index_data = vec![0u8; index_block_size as usize];
        file.read_exact(&mut index_data)?;

        // [key_len(4)][offset(8)][key]
        // Offsets must point into the data block and ascend with the keys
        let mut index = BTreeMap::new();
        let mut pos = 0;
        let mut next_min_offset = HEADER_SIZE;
        while pos < index_data.len() {
            if pos + 12 > index_data.len() {
                return Err(OverlayError::Storage("Truncated SSTable index".to_string()));
            }
            let key_len = le_u32(&index_data[pos..pos + 4]) as usize;
            let offset = le_u64(&index_data[pos + 4..pos + 12]);
            pos += 12;

            if offset < next_min_offset
                || offset.saturating_add(ENTRY_HEADER_SIZE + key_len as u64) > index_offset
            {
                return Err(OverlayError::Storage(format!(
                    "SSTable index offset {} out of order or outside data block",
                    offset
                )));
            }
            next_min_offset = offset + ENTRY_HEADER_SIZE + key_len as u64;

            if pos + key_len > index_data.len() {
                return Err(OverlayError::Storage("Truncated SSTable index".to_string()));
            }
            index.insert(index_data[pos..pos + key_len].to_vec(), offset);
            pos += key_len;
        }

        if index.len() as u64 != entry_count {
            return Err(OverlayError::Storage(format!(
                "SSTable entry count mismatch: header says {}, index has {}",
                entry_count,
                index.len()
            )));
        }

        file.seek(SeekFrom::Start(0))?;

        Ok(Self {
            path: path.to_path_buf(),
            file: BufReader::new(file),
            index,
            entry_count,
            index_offset,
        })
    }

    /// Get a value by key — O(log n) lookup via in-memory index
    ///
    /// Returns `Ok(None)` if the key is not in this SSTable.
    pub fn get(&mut self, key: &[u8]) -> Result<Option<Bytes>> {
        let offset = match self.index.get(key) {
            Some(&off) => off,
            None => return Ok(None),
        };

        self.file.seek(SeekFrom::Start(offset))?;

        let mut header = [0u8; 8];
        self.file.read_exact(&mut header)?;

        let key_len = le_u32(&header[0..4]) as usize;
        let val_len = le_u32(&header[4..8]) as usize;

        if offset + ENTRY_HEADER_SIZE + key_len as u64 + val_len as u64 > self.index_offset {
            return Err(OverlayError::Storage(format!(
                "SSTable entry at offset {} overruns data block",
                offset
            )));
        }

        let mut stored_key = vec![0u8; key_len];
        self.file.read_exact(&mut stored_key)?;
        if stored_key != key {
            return Err(OverlayError::Storage(format!(
                "SSTable index points at \"{}\" for key \"{}\"",
                stored_key.escape_ascii(),
                key.escape_ascii()
            )));
        }

        let mut value = vec![0u8; val_len];
        self.file.read_exact(&mut value)?;

        Ok(Some(Bytes::from(value)))
    }

    /// Get entry count
    pub fn entry_count(&self) -> u64 {
        self.entry_count
    }

    /// Path of the underlying file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the minimum key in this SSTable (for range filtering)
    pub fn min_key(&self) -> Option<&[u8]> {
        self.index.keys().next().map(|k| k.as_slice())
    }

    /// Get the maximum key in this SSTable (for range filtering)
    pub fn max_key(&self) -> Option<&[u8]> {
        self.index.keys().next_back().map(|k| k.as_slice())
    }

    /// Quick check if a key might be in this SSTable (range check)
    /// Returns false only if the key is definitely outside [min_key, max_key]
    pub fn might_contain(&self, key: &[u8]) -> bool {
        match (self.min_key(), self.max_key()) {
            (Some(min), Some(max)) => key >= min && key <= max,
            _ => false, // Empty SSTable
        }
    }

    /// Iterate entries with key >= `start`
    ///
    /// The iterator opens its own file handle, so it does not borrow the
    /// reader and is unaffected by concurrent point lookups.
    pub fn iter_from(&self, start: &[u8]) -> Result<SSTableIterator> {
        let start_offset = self
            .index
            .range::<[u8], _>((Bound::Included(start), Bound::Unbounded))
            .next()
            .map(|(_, &offset)| offset)
            .unwrap_or(self.index_offset);

        SSTableIterator::open(&self.path, start_offset, self.index_offset)
    }
}
