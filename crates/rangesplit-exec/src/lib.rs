#![forbid(unsafe_code)]
//! rangesplit-exec: the bucket iterator.
//!
//! `BucketIterator` picks an index with histogram statistics, derives a chunk
//! size, and starts a background producer that merges buckets into ranges and
//! splits them into chunks. The caller pulls chunks one at a time while the
//! producer keeps working ahead through a bounded queue.

pub mod iterator;
pub mod metrics;
mod producer;
pub mod sizing;

pub use iterator::{BucketIterator, Chunks};
pub use metrics::MetricsSnapshot;
pub use sizing::{derive_chunk_size, sub_chunk_count};
