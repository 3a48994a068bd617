#![forbid(unsafe_code)]
//! rangesplit-core: data model shared by every rangesplit crate.
//!
//! Tables, indexes, histogram buckets, chunk ranges, and checkpoints live here,
//! together with the canonical error type and splitter configuration.
//! No threads, channels, or database access in this crate.

pub mod bucket;
pub mod cancel;
pub mod checkpoint;
pub mod chunk;
pub mod config;
pub mod error;
pub mod id;
pub mod prelude;
pub mod schema;

/// Crate version, surfaced in logs by the exec layer.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
