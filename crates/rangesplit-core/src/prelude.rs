//! Convenient re-exports for downstream crates.

pub use crate::bucket::{decode_bucket_bound, encode_bucket_bound, total_rows, BucketStat};
pub use crate::cancel::CancelToken;
pub use crate::checkpoint::{ColumnBound, RangeInfo};
pub use crate::chunk::{init_chunks, Bound, ChunkIndex, ChunkRange, ChunkType, Predicate};
pub use crate::config::{
    SplitterConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_MAX_CHUNKS, DEFAULT_SPLIT_THRESHOLD,
};
pub use crate::error::{Error, Result};
pub use crate::id::{ChunkId, IndexId};
pub use crate::schema::{ColumnInfo, DataType, IndexInfo, TableDiff, TableInfo};
