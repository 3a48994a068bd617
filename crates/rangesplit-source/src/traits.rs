//! Interfaces the splitter consumes.
//!
//! Every call receives the iterator's [`CancelToken`]. Implementations backed
//! by a real connection should check it before issuing a query and attach it
//! to whatever deadline/cancel mechanism their driver offers, so `close()` on
//! the iterator does not wait behind a long-running query.

use std::collections::HashMap;

use rangesplit_core::bucket::BucketStat;
use rangesplit_core::cancel::CancelToken;
use rangesplit_core::chunk::{ChunkRange, Predicate};
use rangesplit_core::error::Result;
use rangesplit_core::schema::{ColumnInfo, IndexInfo, TableDiff};

/// Histogram statistics and index metadata for a table.
pub trait StatisticsProvider: Send + Sync {
    /// All buckets of the table, keyed by index name, each list ordered by
    /// bucket ID.
    fn bucket_statistics(
        &self,
        table: &TableDiff,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, Vec<BucketStat>>>;

    /// Candidate indexes in preference order. `None` entries are unusable
    /// indexes and are skipped by the caller.
    fn list_indexes(&self, table: &TableDiff) -> Vec<Option<IndexInfo>> {
        table
            .info
            .candidate_indexes()
            .into_iter()
            .map(|idx| idx.cloned())
            .collect()
    }

    /// Columns of `index`, resolved against the table metadata.
    fn columns_for_index(&self, index: &IndexInfo, table: &TableDiff) -> Vec<ColumnInfo> {
        table.info.columns_for_index(index)
    }
}

/// Live row counts over a key range.
pub trait RowCounter: Send + Sync {
    /// Rows of `table` whose key over `columns` falls in `range`, further
    /// restricted by the table's key-space bound. SQL implementations can use
    /// [`row_count_query`].
    fn count_rows(
        &self,
        table: &TableDiff,
        range: &ChunkRange,
        columns: &[ColumnInfo],
        cancel: &CancelToken,
    ) -> Result<i64>;
}

/// Splits one key range into near-equal sub-ranges.
pub trait SubRangeSplitter: Send + Sync {
    /// Contract: with `count <= 1` return `range` unchanged as the only
    /// element. Otherwise return up to `count` ranges that tile `range` in key
    /// order; fewer are allowed when the range holds too few distinct keys.
    fn split(
        &self,
        table: &TableDiff,
        range: &ChunkRange,
        count: usize,
        columns: &[ColumnInfo],
        cancel: &CancelToken,
    ) -> Result<Vec<ChunkRange>>;
}

/// Everything the bucket iterator needs from its source.
pub trait SplitSource: StatisticsProvider + RowCounter + SubRangeSplitter {}

impl<T: StatisticsProvider + RowCounter + SubRangeSplitter + ?Sized> SplitSource for T {}

/// `SELECT COUNT(1)` over `range` of `table`, honoring the table collation
/// and key-space bound.
pub fn row_count_query(table: &TableDiff, range: &ChunkRange) -> Predicate {
    let predicate = range.to_predicate(table.collation.as_deref());
    Predicate {
        sql: format!(
            "SELECT COUNT(1) cnt FROM {} WHERE ({}) AND ({})",
            table.qualified_name(),
            predicate.sql,
            table.limits()
        ),
        args: predicate.args,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangesplit_core::schema::{DataType, TableInfo};

    #[test]
    fn count_query_combines_range_and_limits() {
        let mut table = TableDiff::new(
            "shop",
            "orders",
            TableInfo {
                columns: vec![ColumnInfo::new("id", DataType::Int)],
                indexes: vec![],
            },
        );
        table.range = Some("`id` > 0".into());
        let mut range = ChunkRange::new();
        range.update("id", "10", "20", true, true);

        let q = row_count_query(&table, &range);
        assert_eq!(
            q.sql,
            "SELECT COUNT(1) cnt FROM `shop`.`orders` WHERE (((`id` > ?)) AND ((`id` <= ?))) AND (`id` > 0)"
        );
        assert_eq!(q.args, vec!["10", "20"]);
    }
}
