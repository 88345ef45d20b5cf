//! # OverlayKV
//!
//! The transactional read/write overlay beneath a SQL execution engine:
//! - Read-your-writes over a read-only snapshot of committed state
//! - Deletes as tombstones that shadow committed values
//! - Merged, sorted, duplicate-free range scans
//! - Pooled, reset-before-reuse transaction buffers
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    Transaction / Commit                      │
//! │             (one OverlayStore per transaction)               │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ get / set / delete / seek / close
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                     OverlayStore                             │
//! │        reads: buffer first, then snapshot                    │
//! │        writes: buffer only                                   │
//! └──────────┬───────────────────────────────────┬──────────────┘
//!            │                                   │
//!            ▼                                   ▼
//!   ┌─────────────────┐   acquire/release ┌─────────────────┐
//!   │   MemBuffer     │◄─────────────────►│   BufferPool    │
//!   │ (pending writes)│                   │ (shared, Arc)   │
//!   └────────┬────────┘                   └─────────────────┘
//!            │        ┌─────────────┐
//!            └───────►│  UnionIter  │◄──── Snapshot (read-only,
//!                     │   (seek)    │      MemSnapshot / SSTable)
//!                     └─────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod buffer;
pub mod snapshot;
pub mod merge;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{OverlayError, Result};
pub use config::Config;
pub use buffer::{BufferEntry, BufferPool, MemBuffer, MemDbBuffer, SortedVecBuffer};
pub use snapshot::{MemSnapshot, SSTableSnapshot, Snapshot};
pub use merge::UnionIter;
pub use store::{Condition, OverlayStore, PendingWrite};

/// Keys are arbitrary byte strings, ordered unsigned byte-wise
pub type Key = Vec<u8>;

/// Values are byte strings; a zero-length value is a tombstone
pub type Value = bytes::Bytes;

// =============================================================================
// Version Info
// =============================================================================

/// Current version of OverlayKV
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
