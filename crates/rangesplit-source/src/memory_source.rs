//! In-memory source for tests and benches.
//!
//! Holds whole tables as rows of text values and answers statistics,
//! row-count, and split requests from them. `analyze` builds equal-depth
//! histograms the way a database's statistics collector would: equal keys
//! never straddle two buckets and temporal bounds are stored packed.
//! Faults can be injected per operation to exercise error paths.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use rangesplit_core::bucket::{encode_bucket_bound, BucketStat};
use rangesplit_core::cancel::CancelToken;
use rangesplit_core::chunk::ChunkRange;
use rangesplit_core::error::{Error, Result};
use rangesplit_core::schema::{compare_keys, ColumnInfo, TableDiff, TableInfo};

use crate::traits::{RowCounter, StatisticsProvider, SubRangeSplitter};

/// Source operations that can be observed or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Statistics,
    CountRows,
    Split,
}

/// A table, its rows, and optionally its statistics, as JSON.
///
/// `buckets` are used verbatim when present; otherwise `rows_per_bucket`
/// (default 100) drives an `analyze` after loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableFixture {
    pub table: TableDiff,
    pub rows: Vec<Vec<String>>,
    #[serde(default)]
    pub buckets: HashMap<String, Vec<BucketStat>>,
    #[serde(default)]
    pub rows_per_bucket: Option<usize>,
}

struct MemoryTable {
    info: TableInfo,
    rows: Vec<Vec<String>>,
    buckets: HashMap<String, Vec<BucketStat>>,
}

impl MemoryTable {
    /// Index keys over `columns`, sorted by key order.
    fn sorted_keys(&self, columns: &[ColumnInfo]) -> Result<Vec<Vec<String>>> {
        let positions = columns
            .iter()
            .map(|c| {
                self.info
                    .columns
                    .iter()
                    .position(|tc| tc.name == c.name)
                    .ok_or_else(|| Error::Query(format!("unknown column `{}`", c.name)))
            })
            .collect::<Result<Vec<_>>>()?;

        let mut keys: Vec<Vec<String>> = self
            .rows
            .iter()
            .map(|row| {
                positions
                    .iter()
                    .map(|&p| row.get(p).cloned().unwrap_or_default())
                    .collect()
            })
            .collect();
        keys.sort_by(|a, b| compare_keys(columns, a, b));
        Ok(keys)
    }
}

struct Fault {
    after_calls: usize,
    message: String,
}

#[derive(Default)]
struct Inner {
    tables: HashMap<(String, String), MemoryTable>,
    faults: HashMap<Operation, Fault>,
    calls: HashMap<Operation, usize>,
    split_requests: Vec<usize>,
}

/// Thread-safe in-memory source. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemorySource {
    inner: Arc<Mutex<Inner>>,
}

fn key(schema: &str, table: &str) -> (String, String) {
    (schema.to_string(), table.to_string())
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register `table` with its rows (one value per table column, in
    /// column order). Replaces any previous table of the same name.
    pub fn add_table(&self, table: &TableDiff, rows: Vec<Vec<String>>) {
        let mut inner = self.lock();
        inner.tables.insert(
            key(&table.schema, &table.table),
            MemoryTable {
                info: table.info.clone(),
                rows,
                buckets: HashMap::new(),
            },
        );
    }

    /// Append rows without touching the statistics (data drift).
    pub fn insert_rows(&self, schema: &str, table: &str, rows: Vec<Vec<String>>) -> Result<()> {
        let mut inner = self.lock();
        let t = inner
            .tables
            .get_mut(&key(schema, table))
            .ok_or_else(|| Error::NotFound(format!("table `{schema}`.`{table}`")))?;
        t.rows.extend(rows);
        Ok(())
    }

    /// Rebuild the histogram of every usable index with about
    /// `rows_per_bucket` rows per bucket.
    pub fn analyze(&self, schema: &str, table: &str, rows_per_bucket: usize) -> Result<()> {
        if rows_per_bucket == 0 {
            return Err(Error::Config("rows_per_bucket must be at least 1".into()));
        }
        let mut inner = self.lock();
        let t = inner
            .tables
            .get_mut(&key(schema, table))
            .ok_or_else(|| Error::NotFound(format!("table `{schema}`.`{table}`")))?;

        let mut all = HashMap::new();
        for index in t.info.indexes.iter().flatten() {
            let columns = t.info.columns_for_index(index);
            if columns.is_empty() {
                continue;
            }
            let keys = t.sorted_keys(&columns)?;
            let mut buckets = Vec::new();
            let mut start = 0;
            while start < keys.len() {
                let mut end = (start + rows_per_bucket).min(keys.len());
                while end < keys.len()
                    && compare_keys(&columns, &keys[end], &keys[end - 1]) == Ordering::Equal
                {
                    end += 1;
                }
                buckets.push(BucketStat {
                    lower_bound: encode_bucket_bound(&keys[start], &columns)?,
                    upper_bound: encode_bucket_bound(&keys[end - 1], &columns)?,
                    count: end as i64,
                });
                start = end;
            }
            all.insert(index.name.clone(), buckets);
        }
        t.buckets = all;
        Ok(())
    }

    /// Install a hand-written histogram for one index.
    pub fn set_buckets(
        &self,
        schema: &str,
        table: &str,
        index: &str,
        buckets: Vec<BucketStat>,
    ) -> Result<()> {
        let mut inner = self.lock();
        let t = inner
            .tables
            .get_mut(&key(schema, table))
            .ok_or_else(|| Error::NotFound(format!("table `{schema}`.`{table}`")))?;
        t.buckets.insert(index.to_string(), buckets);
        Ok(())
    }

    /// Load a [`TableFixture`] from JSON and return its table descriptor.
    pub fn load_fixture(&self, json: &str) -> Result<TableDiff> {
        let fixture: TableFixture =
            serde_json::from_str(json).map_err(|e| Error::Query(format!("fixture: {e}")))?;
        let table = fixture.table;
        self.add_table(&table, fixture.rows);
        if fixture.buckets.is_empty() {
            self.analyze(
                &table.schema,
                &table.table,
                fixture.rows_per_bucket.unwrap_or(100),
            )?;
        } else {
            for (index, buckets) in fixture.buckets {
                self.set_buckets(&table.schema, &table.table, &index, buckets)?;
            }
        }
        Ok(table)
    }

    /// Make `op` fail with `message` once it has succeeded `after_calls` times.
    pub fn fail_on(&self, op: Operation, after_calls: usize, message: impl Into<String>) {
        self.lock().faults.insert(
            op,
            Fault {
                after_calls,
                message: message.into(),
            },
        );
    }

    pub fn calls(&self, op: Operation) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Requested sub-chunk count of every `split` call, in call order.
    pub fn split_requests(&self) -> Vec<usize> {
        self.lock().split_requests.clone()
    }

    fn record(inner: &mut Inner, op: Operation) -> Result<()> {
        let n = inner.calls.entry(op).or_insert(0);
        *n += 1;
        match inner.faults.get(&op) {
            Some(f) if *n > f.after_calls => Err(Error::Query(f.message.clone())),
            _ => Ok(()),
        }
    }
}

impl StatisticsProvider for MemorySource {
    fn bucket_statistics(
        &self,
        table: &TableDiff,
        cancel: &CancelToken,
    ) -> Result<HashMap<String, Vec<BucketStat>>> {
        cancel.check()?;
        let mut inner = self.lock();
        Self::record(&mut inner, Operation::Statistics)?;
        let t = inner
            .tables
            .get(&key(&table.schema, &table.table))
            .ok_or_else(|| Error::Query(format!("table {} doesn't exist", table.qualified_name())))?;
        Ok(t.buckets.clone())
    }
}

impl RowCounter for MemorySource {
    fn count_rows(
        &self,
        table: &TableDiff,
        range: &ChunkRange,
        columns: &[ColumnInfo],
        cancel: &CancelToken,
    ) -> Result<i64> {
        cancel.check()?;
        let mut inner = self.lock();
        Self::record(&mut inner, Operation::CountRows)?;
        let t = inner
            .tables
            .get(&key(&table.schema, &table.table))
            .ok_or_else(|| Error::Query(format!("table {} doesn't exist", table.qualified_name())))?;
        let keys = t.sorted_keys(columns)?;
        Ok(keys.iter().filter(|k| range.contains(columns, k)).count() as i64)
    }
}

impl SubRangeSplitter for MemorySource {
    fn split(
        &self,
        table: &TableDiff,
        range: &ChunkRange,
        count: usize,
        columns: &[ColumnInfo],
        cancel: &CancelToken,
    ) -> Result<Vec<ChunkRange>> {
        cancel.check()?;
        let mut inner = self.lock();
        Self::record(&mut inner, Operation::Split)?;
        inner.split_requests.push(count);
        if count <= 1 {
            return Ok(vec![range.clone()]);
        }

        let t = inner
            .tables
            .get(&key(&table.schema, &table.table))
            .ok_or_else(|| Error::Query(format!("table {} doesn't exist", table.qualified_name())))?;
        let mut keys: Vec<Vec<String>> = t
            .sorted_keys(columns)?
            .into_iter()
            .filter(|k| range.contains(columns, k))
            .collect();
        keys.dedup_by(|a, b| compare_keys(columns, a, b) == Ordering::Equal);

        // Quantile pivots: the i-th pivot closes the i-th of `count` equal slices.
        let mut pivots: Vec<Vec<String>> = Vec::with_capacity(count - 1);
        for i in 1..count {
            let pos = i * keys.len() / count;
            if pos == 0 {
                continue;
            }
            let pivot = &keys[pos - 1];
            if pivots
                .last()
                .map_or(true, |p| compare_keys(columns, p, pivot) == Ordering::Less)
            {
                pivots.push(pivot.clone());
            }
        }
        tracing::debug!(
            table = %table.qualified_name(),
            requested = count,
            pivots = pivots.len(),
            "split range by quantile pivots"
        );
        Ok(range.tile_by_pivots(columns, &pivots))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rangesplit_core::schema::{DataType, IndexInfo};

    fn table() -> TableDiff {
        TableDiff::new(
            "db",
            "t",
            TableInfo {
                columns: vec![
                    ColumnInfo::new("id", DataType::Int),
                    ColumnInfo::new("name", DataType::Utf8),
                ],
                indexes: vec![Some(IndexInfo::new(1, "PRIMARY", &["id"]).primary())],
            },
        )
    }

    fn rows(ids: std::ops::RangeInclusive<i64>) -> Vec<Vec<String>> {
        ids.map(|i| vec![i.to_string(), format!("n{i}")]).collect()
    }

    fn id_col() -> Vec<ColumnInfo> {
        vec![ColumnInfo::new("id", DataType::Int)]
    }

    #[test]
    fn analyze_builds_cumulative_buckets() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=25));
        src.analyze("db", "t", 10).unwrap();

        let stats = src.bucket_statistics(&t, &CancelToken::new()).unwrap();
        let b = &stats["PRIMARY"];
        assert_eq!(b.len(), 3);
        assert_eq!(
            (b[0].lower_bound.as_str(), b[0].upper_bound.as_str(), b[0].count),
            ("1", "10", 10)
        );
        assert_eq!(b[2].count, 25);
    }

    #[test]
    fn equal_keys_stay_in_one_bucket() {
        let src = MemorySource::new();
        let t = table();
        let mut r = rows(1..=3);
        r.extend(std::iter::repeat(vec!["3".to_string(), "dup".to_string()]).take(4));
        src.add_table(&t, r);
        src.analyze("db", "t", 2).unwrap();
        let stats = src.bucket_statistics(&t, &CancelToken::new()).unwrap();
        let b = &stats["PRIMARY"];
        assert_eq!(b.len(), 2);
        assert_eq!(b[1].upper_bound, "3");
        assert_eq!(b[1].count, 7);
    }

    #[test]
    fn counts_rows_in_range() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=100));
        let mut r = ChunkRange::new();
        r.update("id", "10", "20", true, true);
        let n = src.count_rows(&t, &r, &id_col(), &CancelToken::new()).unwrap();
        assert_eq!(n, 10);
    }

    #[test]
    fn split_tiles_by_quantiles() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=100));
        let mut r = ChunkRange::new();
        r.update("id", "0", "100", true, true);
        let parts = src.split(&t, &r, 4, &id_col(), &CancelToken::new()).unwrap();
        let uppers: Vec<&str> = parts
            .iter()
            .map(|c| c.bound("id").unwrap().upper.as_str())
            .collect();
        assert_eq!(uppers, vec!["25", "50", "75", "100"]);
        assert_eq!(src.split_requests(), vec![4]);
    }

    #[test]
    fn split_passes_through_small_counts() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=10));
        let r = ChunkRange::new();
        for count in [0, 1] {
            let parts = src.split(&t, &r, count, &id_col(), &CancelToken::new()).unwrap();
            assert_eq!(parts, vec![r.clone()]);
        }
    }

    #[test]
    fn injected_fault_fires_after_n_calls() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=10));
        src.fail_on(Operation::CountRows, 1, "lost connection");
        let r = ChunkRange::new();
        let cancel = CancelToken::new();
        assert!(src.count_rows(&t, &r, &id_col(), &cancel).is_ok());
        assert_eq!(
            src.count_rows(&t, &r, &id_col(), &cancel),
            Err(Error::Query("lost connection".into()))
        );
        assert_eq!(src.calls(Operation::CountRows), 2);
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let src = MemorySource::new();
        let t = table();
        src.add_table(&t, rows(1..=10));
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(src.bucket_statistics(&t, &cancel), Err(Error::Cancelled));
        assert_eq!(src.calls(Operation::Statistics), 0);
    }

    #[test]
    fn fixture_without_buckets_is_analyzed() {
        let fixture = TableFixture {
            table: table(),
            rows: rows(1..=30),
            buckets: HashMap::new(),
            rows_per_bucket: Some(10),
        };
        let json = serde_json::to_string(&fixture).unwrap();
        let src = MemorySource::new();
        let t = src.load_fixture(&json).unwrap();
        let stats = src.bucket_statistics(&t, &CancelToken::new()).unwrap();
        assert_eq!(stats["PRIMARY"].len(), 3);
    }
}
