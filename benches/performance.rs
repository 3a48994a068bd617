use std::sync::Arc;

use criterion::{criterion_group, criterion_main, Criterion};
use rangesplit::prelude::*;

fn make_source(rows: i64, rows_per_bucket: usize) -> (Arc<TableDiff>, MemorySource) {
    let table = TableDiff::new(
        "bench",
        "orders",
        TableInfo {
            columns: vec![
                ColumnInfo::new("id", DataType::Int),
                ColumnInfo::new("note", DataType::Utf8),
            ],
            indexes: vec![Some(IndexInfo::new(1, "PRIMARY", &["id"]).primary())],
        },
    );
    let source = MemorySource::new();
    source.add_table(
        &table,
        (1..=rows)
            .map(|i| vec![i.to_string(), format!("note-{}", i % 97)])
            .collect(),
    );
    source
        .analyze("bench", "orders", rows_per_bucket)
        .expect("analyze bench table");
    (Arc::new(table), source)
}

fn bench_bucket_iterator(c: &mut Criterion) {
    let (table, source) = make_source(100_000, 256);
    c.bench_function("bucket_iterator_100k", |b| {
        b.iter(|| {
            let mut iter =
                BucketIterator::new(Arc::clone(&table), Arc::new(source.clone()), 2_000).unwrap();
            let mut n = 0usize;
            while iter.next().unwrap().is_some() {
                n += 1;
            }
            n
        })
    });
}

fn bench_predicate_rendering(c: &mut Criterion) {
    let mut range = ChunkRange::new();
    for (i, col) in ["a", "b", "c", "d"].iter().enumerate() {
        range.update(col, &format!("{i}0"), &format!("{i}9"), true, true);
    }
    c.bench_function("chunk_predicate_4_columns", |b| {
        b.iter(|| range.to_predicate(Some("utf8mb4_bin")))
    });
}

criterion_group!(benches, bench_bucket_iterator, bench_predicate_rendering);
criterion_main!(benches);
