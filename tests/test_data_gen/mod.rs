//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::sync::Arc;

use rangesplit::prelude::*;

pub const SCHEMA: &str = "shop";
pub const TABLE: &str = "orders";

/// `shop.orders(id INT PRIMARY KEY, note VARCHAR)`.
pub fn orders_table() -> TableDiff {
    TableDiff::new(
        SCHEMA,
        TABLE,
        TableInfo {
            columns: vec![
                ColumnInfo::new("id", DataType::Int),
                ColumnInfo::new("note", DataType::Utf8),
            ],
            indexes: vec![Some(IndexInfo::new(1, "PRIMARY", &["id"]).primary())],
        },
    )
}

pub fn id_columns() -> Vec<ColumnInfo> {
    vec![ColumnInfo::new("id", DataType::Int)]
}

pub fn order_rows(ids: impl IntoIterator<Item = i64>) -> Vec<Vec<String>> {
    ids.into_iter()
        .map(|i| vec![i.to_string(), format!("order-{i}")])
        .collect()
}

/// 400 rows with ids 1..=400 and three hand-written buckets with cumulative
/// counts 100, 250, 400.
pub fn three_bucket_source() -> (Arc<TableDiff>, MemorySource) {
    let table = orders_table();
    let source = MemorySource::new();
    source.add_table(&table, order_rows(1..=400));
    source
        .set_buckets(
            SCHEMA,
            TABLE,
            "PRIMARY",
            vec![
                BucketStat::new("1", "100", 100),
                BucketStat::new("101", "250", 250),
                BucketStat::new("251", "400", 400),
            ],
        )
        .unwrap();
    (Arc::new(table), source)
}

/// `rows` ids analyzed into buckets of `rows_per_bucket`.
pub fn analyzed_source(rows: i64, rows_per_bucket: usize) -> (Arc<TableDiff>, MemorySource) {
    let table = orders_table();
    let source = MemorySource::new();
    source.add_table(&table, order_rows(1..=rows));
    source.analyze(SCHEMA, TABLE, rows_per_bucket).unwrap();
    (Arc::new(table), source)
}

pub fn drain(iter: &mut BucketIterator) -> Vec<ChunkRange> {
    let mut out = Vec::new();
    while let Some(chunk) = iter.next().unwrap() {
        out.push(chunk);
    }
    out
}

pub fn upper(chunk: &ChunkRange, column: &str) -> Option<String> {
    chunk
        .bound(column)
        .filter(|b| b.has_upper)
        .map(|b| b.upper.clone())
}

pub fn lower(chunk: &ChunkRange, column: &str) -> Option<String> {
    chunk
        .bound(column)
        .filter(|b| b.has_lower)
        .map(|b| b.lower.clone())
}

/// Every key must fall in exactly one chunk.
pub fn assert_tiles(chunks: &[ChunkRange], columns: &[ColumnInfo], keys: &[Vec<String>]) {
    for key in keys {
        let hits = chunks.iter().filter(|c| c.contains(columns, key)).count();
        assert_eq!(hits, 1, "key {key:?} is covered by {hits} chunks");
    }
}

pub fn id_keys(ids: impl IntoIterator<Item = i64>) -> Vec<Vec<String>> {
    ids.into_iter().map(|i| vec![i.to_string()]).collect()
}
