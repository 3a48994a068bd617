//! Resuming a split from a saved checkpoint.

mod test_data_gen;

use std::sync::Arc;

use rangesplit::prelude::*;
use test_data_gen::*;

fn bounds_only(chunks: &[ChunkRange]) -> Vec<(usize, Option<String>, Option<String>)> {
    chunks
        .iter()
        .map(|c| (c.bucket_id, lower(c, "id"), upper(c, "id")))
        .collect()
}

fn full_run(table: &Arc<TableDiff>, source: &MemorySource) -> (IndexId, Vec<ChunkRange>) {
    let mut iter = BucketIterator::new(Arc::clone(table), Arc::new(source.clone()), 100).unwrap();
    let chunks = drain(&mut iter);
    (iter.index_id(), chunks)
}

fn resume(
    table: &Arc<TableDiff>,
    source: &MemorySource,
    checkpoint: RangeInfo,
) -> Result<Vec<ChunkRange>> {
    let mut iter = BucketIterator::with_checkpoint(
        Arc::clone(table),
        Arc::new(source.clone()),
        100,
        Some(checkpoint),
    )?;
    let chunks = iter.chunks().collect();
    chunks
}

#[test]
fn resume_continues_where_the_full_run_left_off() {
    let (table, source) = three_bucket_source();
    let (index_id, full) = full_run(&table, &source);

    for k in 0..full.len() {
        let cp = RangeInfo::from_chunk(index_id, &full[k]);
        let json = cp.to_json().unwrap();
        let cp = RangeInfo::from_json(&json).unwrap();

        let resumed = resume(&table, &source, cp).unwrap();
        assert_eq!(
            bounds_only(&resumed),
            bounds_only(&full[k + 1..]),
            "resume after chunk {k}"
        );
    }
}

#[test]
fn resume_inside_a_bucket_emits_its_remainder() {
    let (table, source) = three_bucket_source();
    let (index_id, full) = full_run(&table, &source);
    assert_eq!(upper(&full[1], "id").as_deref(), Some("175"));

    let resumed = resume(&table, &source, RangeInfo::from_chunk(index_id, &full[1])).unwrap();
    assert_eq!(
        bounds_only(&resumed),
        vec![
            (1, Some("175".into()), Some("250".into())),
            (2, Some("250".into()), Some("325".into())),
            (2, Some("325".into()), Some("400".into())),
            (3, Some("400".into()), None),
        ]
    );
    let ids: Vec<u64> = resumed.iter().map(|c| c.id.get()).collect();
    assert_eq!(ids, vec![0, 1, 2, 3]);
}

#[test]
fn resumed_chunks_cover_rows_inserted_after_the_statistics() {
    let (table, source) = three_bucket_source();
    let (index_id, full) = full_run(&table, &source);
    let cp = RangeInfo::from_chunk(index_id, &full[1]);

    // 100 extra rows inside the checkpointed bucket, 50 past the last bucket.
    let drift: Vec<i64> = (200..250).chain(200..250).collect();
    source.insert_rows(SCHEMA, TABLE, order_rows(drift)).unwrap();
    source.insert_rows(SCHEMA, TABLE, order_rows(1001..=1050)).unwrap();

    let before = source.split_requests().len();
    let resumed = resume(&table, &source, cp).unwrap();

    // 175 live rows in (175, 250] round to two sub-chunks.
    assert_eq!(source.split_requests()[before], 2);
    assert_eq!(resumed.iter().filter(|c| c.bucket_id == 1).count(), 2);
    assert_tiles(&resumed, &id_columns(), &id_keys((176..=400).chain(1001..=1050)));
    assert!(resumed.iter().all(|c| !c.contains(&id_columns(), &["175".to_string()])));
}

#[test]
fn checkpoint_after_the_trailing_chunk_finishes_immediately() {
    let (table, source) = three_bucket_source();
    let (index_id, full) = full_run(&table, &source);
    let last = full.last().unwrap();
    let cp = RangeInfo::from_chunk(index_id, last);
    assert_eq!(cp.bucket_id, 3);
    assert!(cp.column_bounds.is_empty());

    let counts_before = source.calls(Operation::CountRows);
    assert!(resume(&table, &source, cp).unwrap().is_empty());
    assert_eq!(source.calls(Operation::CountRows), counts_before);
}

#[test]
fn checkpoint_for_another_index_finds_nothing() {
    let (table, source) = three_bucket_source();
    let cp = RangeInfo {
        index_id: IndexId::new(99),
        bucket_id: 0,
        column_bounds: vec![ColumnBound {
            column: "id".into(),
            upper: "100".into(),
        }],
    };
    let err = resume(&table, &source, cp).unwrap_err();
    assert_eq!(err, Error::NotFound("no index to split buckets".into()));
}

#[test]
fn checkpoint_with_foreign_columns_is_rejected() {
    let (table, source) = three_bucket_source();
    let cp = RangeInfo {
        index_id: IndexId::new(1),
        bucket_id: 0,
        column_bounds: vec![ColumnBound {
            column: "note".into(),
            upper: "x".into(),
        }],
    };
    assert!(matches!(
        resume(&table, &source, cp),
        Err(Error::Checkpoint(_))
    ));
}

#[test]
fn checkpoint_past_the_last_bucket_is_rejected() {
    let (table, source) = three_bucket_source();
    let cp = RangeInfo {
        index_id: IndexId::new(1),
        bucket_id: 9,
        column_bounds: Vec::new(),
    };
    let err = resume(&table, &source, cp).unwrap_err();
    assert!(matches!(err, Error::Checkpoint(m) if m.contains("out of range")));
}

#[test]
fn failing_row_count_is_reported_once() {
    let (table, source) = three_bucket_source();
    let (index_id, full) = full_run(&table, &source);
    source.fail_on(Operation::CountRows, 0, "count timed out");

    let mut iter = BucketIterator::with_checkpoint(
        Arc::clone(&table),
        Arc::new(source.clone()),
        100,
        Some(RangeInfo::from_chunk(index_id, &full[1])),
    )
    .unwrap();
    let err = iter.next().unwrap_err();
    assert!(matches!(&err, Error::Query(m) if m.ends_with("count timed out")));
    assert_eq!(iter.next().unwrap_err(), err);
}
