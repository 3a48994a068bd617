//! Resumption token for a partially completed split.
//!
//! A checkpoint names the index that was being split, the bucket the last
//! completed chunk came from, and that chunk's upper values. Resuming starts
//! right after those values. The splitter only reads checkpoints; persisting
//! them is the caller's business.

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkRange;
use crate::error::{Error, Result};
use crate::id::IndexId;
use crate::schema::ColumnInfo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnBound {
    pub column: String,
    pub upper: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeInfo {
    pub index_id: IndexId,
    pub bucket_id: usize,
    pub column_bounds: Vec<ColumnBound>,
}

impl RangeInfo {
    /// Checkpoint taken after `chunk` (split over `index_id`) completed.
    /// A chunk that is unbounded above yields no column bounds.
    pub fn from_chunk(index_id: IndexId, chunk: &ChunkRange) -> Self {
        let column_bounds = chunk
            .bounds
            .iter()
            .filter(|b| b.has_upper)
            .map(|b| ColumnBound {
                column: b.column.clone(),
                upper: b.upper.clone(),
            })
            .collect();
        Self {
            index_id,
            bucket_id: chunk.bucket_id,
            column_bounds,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self> {
        Ok(serde_json::from_str(s)?)
    }

    /// The saved bounds must name exactly the index columns, in order.
    /// An empty bound list is allowed (the completed chunk had no upper side).
    pub fn check_columns(&self, columns: &[ColumnInfo]) -> Result<()> {
        if self.column_bounds.is_empty() {
            return Ok(());
        }
        let saved = self.column_bounds.iter().map(|b| b.column.as_str());
        let expected = columns.iter().map(|c| c.name.as_str());
        if !saved.eq(expected) {
            return Err(Error::Checkpoint(format!(
                "checkpoint columns [{}] do not match index columns [{}]",
                self.column_bounds
                    .iter()
                    .map(|b| b.column.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
                columns
                    .iter()
                    .map(|c| c.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            )));
        }
        Ok(())
    }

    /// Fresh range whose lower side is the saved upper values.
    pub fn resume_range(&self) -> ChunkRange {
        let mut range = ChunkRange::new();
        for bound in &self.column_bounds {
            range.update(&bound.column, &bound.upper, "", true, false);
        }
        range
    }
}
