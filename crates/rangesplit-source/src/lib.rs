#![forbid(unsafe_code)]
//! rangesplit-source: the database-facing side of the splitter.
//!
//! The iterator never talks to a database directly. It goes through the
//! traits in [`traits`]: a statistics provider for histogram buckets and index
//! metadata, a row counter, and a sub-range splitter. Production deployments
//! implement them over a SQL connection; [`memory_source::MemorySource`]
//! implements them over in-memory rows for tests and benches.

pub mod memory_source;
pub mod traits;

pub use memory_source::{MemorySource, Operation, TableFixture};
pub use traits::{row_count_query, RowCounter, SplitSource, StatisticsProvider, SubRangeSplitter};
