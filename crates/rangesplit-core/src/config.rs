//! Splitter configuration that downstream crates can serialize/deserialize.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Smallest row count worth splitting further.
pub const DEFAULT_SPLIT_THRESHOLD: i64 = 1000;

/// Upper bound on the number of chunks an automatically sized split produces.
pub const DEFAULT_MAX_CHUNKS: i64 = 10_000;

/// Batches buffered between the producer and the consumer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SplitterConfig {
    /// Target rows per chunk. Zero or negative means "derive from statistics".
    pub chunk_size: i64,

    /// Minimum split granularity; the derived chunk size never drops below
    /// twice this value.
    pub split_threshold: i64,

    /// Chunk budget used when deriving the chunk size from the row total.
    pub max_chunks: i64,

    /// Capacity of the bounded batch queue. Production stalls once it is full.
    pub channel_capacity: usize,

    /// ID given to the first emitted chunk.
    pub start_chunk_id: u64,
}

impl Default for SplitterConfig {
    fn default() -> Self {
        Self {
            chunk_size: 0,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
            max_chunks: DEFAULT_MAX_CHUNKS,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            start_chunk_id: 0,
        }
    }
}

impl SplitterConfig {
    /// Default config with an explicit chunk size.
    pub fn with_chunk_size(chunk_size: i64) -> Self {
        Self {
            chunk_size,
            ..Self::default()
        }
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `RANGESPLIT_CHUNK_SIZE`: target rows per chunk (<= 0 for automatic)
    /// - `RANGESPLIT_SPLIT_THRESHOLD`: minimum split granularity
    /// - `RANGESPLIT_MAX_CHUNKS`: chunk budget for automatic sizing
    /// - `RANGESPLIT_CHANNEL_CAPACITY`: batches buffered ahead of the consumer
    /// - `RANGESPLIT_START_CHUNK_ID`: first chunk ID
    pub fn from_env() -> Self {
        let mut cfg = Self::default();

        if let Ok(s) = std::env::var("RANGESPLIT_CHUNK_SIZE") {
            if let Ok(v) = s.parse::<i64>() {
                cfg.chunk_size = v;
            }
        }

        if let Ok(s) = std::env::var("RANGESPLIT_SPLIT_THRESHOLD") {
            if let Ok(v) = s.parse::<i64>() {
                cfg.split_threshold = v;
            }
        }

        if let Ok(s) = std::env::var("RANGESPLIT_MAX_CHUNKS") {
            if let Ok(v) = s.parse::<i64>() {
                cfg.max_chunks = v;
            }
        }

        if let Ok(s) = std::env::var("RANGESPLIT_CHANNEL_CAPACITY") {
            if let Ok(v) = s.parse::<usize>() {
                cfg.channel_capacity = v;
            }
        }

        if let Ok(s) = std::env::var("RANGESPLIT_START_CHUNK_ID") {
            if let Ok(v) = s.parse::<u64>() {
                cfg.start_chunk_id = v;
            }
        }

        cfg
    }

    pub fn validate(&self) -> Result<()> {
        if self.split_threshold <= 0 {
            return Err(Error::Config(format!(
                "split_threshold must be positive, got {}",
                self.split_threshold
            )));
        }
        if self.max_chunks <= 0 {
            return Err(Error::Config(format!(
                "max_chunks must be positive, got {}",
                self.max_chunks
            )));
        }
        if self.channel_capacity == 0 {
            return Err(Error::Config("channel_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
