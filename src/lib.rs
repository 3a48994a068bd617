#![forbid(unsafe_code)]
//! rangesplit: split a large table into contiguous key-range chunks using
//! the histogram statistics of one of its indexes.
//!
//! ```no_run
//! use std::sync::Arc;
//! use rangesplit::prelude::*;
//!
//! # fn run(table: TableDiff, source: MemorySource) -> Result<()> {
//! let mut iter = BucketIterator::new(Arc::new(table), Arc::new(source), 0)?;
//! while let Some(chunk) = iter.next()? {
//!     println!("{chunk}: {}", chunk.where_clause);
//! }
//! # Ok(())
//! # }
//! ```

pub use rangesplit_core;
pub use rangesplit_exec;
pub use rangesplit_source;

pub mod prelude {
    pub use rangesplit_core::prelude::*;
    pub use rangesplit_exec::{BucketIterator, Chunks, MetricsSnapshot};
    pub use rangesplit_source::{
        MemorySource, Operation, RowCounter, SplitSource, StatisticsProvider, SubRangeSplitter,
    };
}
