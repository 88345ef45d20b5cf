//! Error types for OverlayKV
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using OverlayError
pub type Result<T> = std::result::Result<T, OverlayError>;

/// Unified error type for OverlayKV operations
#[derive(Debug, Error)]
pub enum OverlayError {
    // -------------------------------------------------------------------------
    // Lookup Errors
    // -------------------------------------------------------------------------
    /// Key absent from the merged view, or target of a delete with nothing to delete
    #[error("Key not found")]
    NotFound,

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Transaction too large: {size} bytes buffered, limit is {limit}")]
    TxnTooLarge { size: usize, limit: usize },

    // -------------------------------------------------------------------------
    // Snapshot Errors
    // -------------------------------------------------------------------------
    /// A snapshot failure, annotated with the overlay operation and key
    #[error("{op} failed for key \"{}\": {source}", .key.escape_ascii())]
    Backend {
        op: &'static str,
        key: Vec<u8>,
        #[source]
        source: Box<OverlayError>,
    },

    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl OverlayError {
    /// True if this is the "key not found" condition
    pub fn is_not_found(&self) -> bool {
        match self {
            OverlayError::NotFound => true,
            OverlayError::Backend { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Wrap a snapshot failure with the operation and key that triggered it
    pub(crate) fn backend(op: &'static str, key: &[u8], source: OverlayError) -> Self {
        OverlayError::Backend {
            op,
            key: key.to_vec(),
            source: Box::new(source),
        }
    }
}
