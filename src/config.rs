//! Configuration for OverlayKV
//!
//! Centralized configuration with sensible defaults.

/// Main configuration shared by the buffer pool and every overlay store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Buffer Pool Configuration
    // -------------------------------------------------------------------------
    /// Max number of idle buffers kept for reuse.
    /// Released buffers beyond this are dropped.
    pub pool_capacity: usize,

    // -------------------------------------------------------------------------
    // Transaction Buffer Configuration
    // -------------------------------------------------------------------------
    /// Max approximate size of one transaction's pending writes (in bytes)
    pub max_buffer_bytes: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pool_capacity: 100,
            max_buffer_bytes: 64 * 1024 * 1024, // 64 MB
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the number of idle buffers the pool retains
    pub fn pool_capacity(mut self, capacity: usize) -> Self {
        self.config.pool_capacity = capacity;
        self
    }

    /// Set the per-transaction buffer size limit (in bytes)
    pub fn max_buffer_bytes(mut self, size: usize) -> Self {
        self.config.max_buffer_bytes = size;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
