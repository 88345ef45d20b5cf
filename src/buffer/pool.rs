//! Buffer Pool
//!
//! Shared cache of reusable transaction buffers.
//!
//! ## Concurrency:
//! - `idle`: lock-free bounded queue, so concurrent acquire/release never
//!   hand the same buffer to two transactions
//! - Counters are atomics (diagnostics only)
//! - All methods use `&self`; share the pool as `Arc<BufferPool>`

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::ArrayQueue;
use tracing::{debug, trace};

use crate::config::Config;
use crate::error::Result;
use crate::OverlayError;

use super::{MemBuffer, MemDbBuffer};

/// Counters describing pool activity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Buffers constructed because the pool was empty
    pub created: u64,
    /// Acquisitions served by a recycled buffer
    pub reused: u64,
    /// Released buffers dropped because the pool was full
    pub discarded: u64,
    /// Buffers currently idle in the pool
    pub idle: usize,
}

/// Pool of empty buffers, explicitly constructed and passed to each overlay
pub struct BufferPool<B: MemBuffer + Default = MemDbBuffer> {
    idle: ArrayQueue<B>,
    created: AtomicU64,
    reused: AtomicU64,
    discarded: AtomicU64,
}

impl<B: MemBuffer + Default> BufferPool<B> {
    /// Create a pool retaining at most `config.pool_capacity` idle buffers
    pub fn new(config: &Config) -> Result<Self> {
        if config.pool_capacity == 0 {
            return Err(OverlayError::Config(
                "pool_capacity must be at least 1".to_string(),
            ));
        }

        debug!(capacity = config.pool_capacity, "buffer pool created");

        Ok(Self {
            idle: ArrayQueue::new(config.pool_capacity),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            discarded: AtomicU64::new(0),
        })
    }

    /// Take an empty buffer, recycling an idle one when available
    pub fn acquire(&self) -> B {
        match self.idle.pop() {
            Some(buffer) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                trace!("buffer reused from pool");
                buffer
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                trace!("buffer pool empty, allocating new buffer");
                B::default()
            }
        }
    }

    /// Reset a buffer and make it available for the next transaction
    pub fn release(&self, mut buffer: B) {
        buffer.reset();
        debug_assert!(buffer.is_empty());

        if self.idle.push(buffer).is_err() {
            self.discarded.fetch_add(1, Ordering::Relaxed);
            trace!("buffer pool full, dropping released buffer");
        }
    }

    /// Max number of idle buffers retained
    pub fn capacity(&self) -> usize {
        self.idle.capacity()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            idle: self.idle.len(),
        }
    }
}
