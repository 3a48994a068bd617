//! Background chunk production.
//!
//! Walks the chosen index's buckets once, merging consecutive buckets until
//! the merged row delta reaches the chunk size, then asks the sub-range
//! splitter to cut the merged range. Each split result is sent as one batch.
//! A `None` batch marks the end; on failure the error goes to the one-shot
//! error slot before the batch sender is dropped, so the consumer always
//! drains earlier batches first and then sees exactly one error.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use rangesplit_core::bucket::{decode_bucket_bound, BucketStat};
use rangesplit_core::cancel::CancelToken;
use rangesplit_core::checkpoint::RangeInfo;
use rangesplit_core::chunk::{init_chunks, ChunkRange, ChunkType};
use rangesplit_core::error::{Error, Result};
use rangesplit_core::id::ChunkId;
use rangesplit_core::schema::{ColumnInfo, TableDiff};
use rangesplit_source::SplitSource;

use crate::metrics::ProducerMetrics;
use crate::sizing::sub_chunk_count;

/// `None` is the end-of-stream sentinel.
pub(crate) type Batch = Option<Vec<ChunkRange>>;

/// Where the normal bucket walk picks up after a checkpointed chunk.
struct ResumePoint {
    begin: usize,
    latest_count: i64,
    lower_values: Vec<String>,
}

pub(crate) struct ChunkProducer {
    pub(crate) table: Arc<TableDiff>,
    pub(crate) source: Arc<dyn SplitSource>,
    pub(crate) buckets: Vec<BucketStat>,
    pub(crate) columns: Vec<ColumnInfo>,
    pub(crate) chunk_size: i64,
    pub(crate) next_id: ChunkId,
    pub(crate) checkpoint: Option<RangeInfo>,
    pub(crate) cancel: CancelToken,
    pub(crate) metrics: Arc<ProducerMetrics>,
    pub(crate) chunks_tx: mpsc::Sender<Batch>,
}

impl ChunkProducer {
    /// Thread entry point. Consumes the producer so the batch sender is
    /// dropped (closing the queue) only after the error slot is filled.
    pub(crate) fn run(mut self, err_tx: oneshot::Sender<Error>) {
        let err = match self.produce() {
            Ok(()) => {
                self.metrics.snapshot().emit(&self.table.qualified_name());
                return;
            }
            Err(e) => e,
        };
        if err == Error::Cancelled {
            tracing::debug!(
                schema = %self.table.schema,
                table = %self.table.table,
                "chunk production cancelled"
            );
        } else {
            tracing::warn!(
                schema = %self.table.schema,
                table = %self.table.table,
                error = %err,
                "chunk production failed"
            );
        }
        // The receiver is gone only if the iterator was closed.
        let _ = err_tx.send(err);
    }

    fn produce(&mut self) -> Result<()> {
        let mut lower_values: Vec<String> = Vec::new();
        let mut latest_count = 0i64;
        let mut begin = 0usize;
        let mut resumed = false;

        if let Some(cp) = self.checkpoint.take() {
            resumed = true;
            match self.resume(&cp)? {
                Some(point) => {
                    begin = point.begin;
                    latest_count = point.latest_count;
                    lower_values = point.lower_values;
                }
                None => return self.finish(),
            }
        }

        for i in begin..self.buckets.len() {
            self.cancel.check()?;
            self.metrics.bucket_scanned();

            let count = self.buckets[i].count - latest_count;
            if count < self.chunk_size {
                // merge more buckets into one chunk
                continue;
            }

            let upper_values = self.decode_upper(i)?;
            let mut range = ChunkRange::new();
            for (j, col) in self.columns.iter().enumerate() {
                let lower = lower_values.get(j).map(String::as_str).unwrap_or("");
                range.update(&col.name, lower, &upper_values[j], !lower_values.is_empty(), true);
            }

            // count == 0 gives chunk_count == 0; the splitter passes it through.
            //            count                     chunk_count
            // 0 ... 0.5x ... x ... 1.5x   ------->   1
            //       1.5x ... 2x ... 2.5x  ------->   2
            let chunk_count = sub_chunk_count(count, self.chunk_size);
            self.split_and_send(range, chunk_count, i)?;

            latest_count = self.buckets[i].count;
            lower_values = upper_values;
        }

        let tail_bucket = self.buckets.len();
        if !lower_values.is_empty() {
            // merge the rest keys into one chunk
            let mut range = ChunkRange::new();
            for (j, col) in self.columns.iter().enumerate() {
                range.update(&col.name, &lower_values[j], "", true, false);
            }
            self.finalize_and_send(vec![range], tail_bucket)?;
        } else if !resumed {
            // Nothing reached the chunk size: the whole table is one chunk.
            let mut range = ChunkRange::new();
            for col in &self.columns {
                range.update(&col.name, "", "", false, false);
            }
            self.finalize_and_send(vec![range], tail_bucket)?;
        }

        self.finish()
    }

    /// Re-emit the checkpointed chunk's remainder and return where the bucket
    /// walk continues, or `None` when the previous run had already finished.
    fn resume(&mut self, cp: &RangeInfo) -> Result<Option<ResumePoint>> {
        let bucket_id = cp.bucket_id;
        let mut range = cp.resume_range();

        let upper_values = if bucket_id < self.buckets.len() {
            let values = self.decode_upper(bucket_id)?;
            for (j, col) in self.columns.iter().enumerate() {
                range.update(&col.name, "", &values[j], false, true);
            }
            Some(values)
        } else if cp.column_bounds.is_empty() {
            tracing::debug!(
                schema = %self.table.schema,
                table = %self.table.table,
                "checkpoint is past the last chunk, nothing to resume"
            );
            return Ok(None);
        } else {
            None
        };

        self.cancel.check()?;
        let count = self
            .source
            .count_rows(&self.table, &range, &self.columns, &self.cancel)
            .map_err(|e| e.context(format!("count rows of {}", self.table.qualified_name())))?;
        if count > 0 {
            let chunk_count = sub_chunk_count(count, self.chunk_size);
            self.split_and_send(range, chunk_count, bucket_id)?;
        } else {
            tracing::warn!(
                schema = %self.table.schema,
                table = %self.table.table,
                bucket = bucket_id,
                "checkpointed chunk has no rows left"
            );
        }

        Ok(upper_values.map(|lower_values| ResumePoint {
            begin: bucket_id + 1,
            latest_count: self.buckets[bucket_id].count,
            lower_values,
        }))
    }

    fn decode_upper(&self, bucket_id: usize) -> Result<Vec<String>> {
        decode_bucket_bound(&self.buckets[bucket_id].upper_bound, &self.columns).map_err(|e| {
            e.context(format!(
                "bucket {bucket_id} of {}",
                self.table.qualified_name()
            ))
        })
    }

    fn split_and_send(
        &mut self,
        range: ChunkRange,
        chunk_count: usize,
        bucket_id: usize,
    ) -> Result<()> {
        self.cancel.check()?;
        let chunks = self
            .source
            .split(&self.table, &range, chunk_count, &self.columns, &self.cancel)
            .map_err(|e| {
                e.context(format!(
                    "split bucket {bucket_id} of {}",
                    self.table.qualified_name()
                ))
            })?;
        self.metrics.split_called();
        if chunks.is_empty() {
            return Err(Error::Query(format!(
                "sub-range splitter returned no ranges for bucket {bucket_id} of {}",
                self.table.qualified_name()
            )));
        }
        self.finalize_and_send(chunks, bucket_id)
    }

    fn finalize_and_send(&mut self, mut chunks: Vec<ChunkRange>, bucket_id: usize) -> Result<()> {
        self.next_id = init_chunks(
            &mut chunks,
            ChunkType::Bucket,
            self.next_id,
            bucket_id,
            self.table.collation.as_deref(),
            self.table.limits(),
        );
        tracing::trace!(
            table = %self.table.qualified_name(),
            bucket = bucket_id,
            chunks = chunks.len(),
            "send chunk batch"
        );
        let n = chunks.len();
        self.send(Some(chunks))?;
        self.metrics.batch_sent(n);
        Ok(())
    }

    /// send `None` to notify the consumer that no chunk is left.
    fn finish(&mut self) -> Result<()> {
        self.send(None)
    }

    /// Blocks while the queue is full. Fails only when the consumer closed
    /// the iterator, which is reported as cancellation.
    fn send(&self, batch: Batch) -> Result<()> {
        self.chunks_tx.blocking_send(batch).map_err(|_| {
            self.cancel.cancel();
            Error::Cancelled
        })
    }
}
