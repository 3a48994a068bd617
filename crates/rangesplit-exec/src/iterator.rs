//! Consumer side of the bucket splitter.
//!
//! Construction is synchronous: fetch statistics, choose the first usable
//! index, derive the chunk size, validate the checkpoint. It then spawns one
//! producer thread and returns without waiting for any chunk.
//!
//! The iterator has a single consumer by construction: `next` takes
//! `&mut self`, so pulls from several threads must go through the caller's
//! own synchronization. Each batch is owned by the consumer once received.

use std::sync::Arc;
use std::thread::JoinHandle;

use tokio::sync::{mpsc, oneshot};

use rangesplit_core::bucket::{total_rows, BucketStat};
use rangesplit_core::cancel::CancelToken;
use rangesplit_core::checkpoint::RangeInfo;
use rangesplit_core::chunk::ChunkRange;
use rangesplit_core::config::SplitterConfig;
use rangesplit_core::error::{Error, Result};
use rangesplit_core::id::{ChunkId, IndexId};
use rangesplit_core::schema::{ColumnInfo, IndexInfo, TableDiff};
use rangesplit_source::SplitSource;

use crate::metrics::{MetricsSnapshot, ProducerMetrics};
use crate::producer::{Batch, ChunkProducer};
use crate::sizing::derive_chunk_size;

enum State {
    Running,
    Finished,
    /// Sticky: every later pull returns this error again.
    Failed(Error),
}

/// Index chosen for splitting, with its statistics and resolved columns.
struct Selection {
    index: IndexInfo,
    buckets: Vec<BucketStat>,
    columns: Vec<ColumnInfo>,
}

pub struct BucketIterator {
    table: Arc<TableDiff>,
    index_id: IndexId,
    index_columns: Vec<ColumnInfo>,
    chunk_size: i64,
    batch: std::vec::IntoIter<ChunkRange>,
    chunks_rx: Option<mpsc::Receiver<Batch>>,
    err_rx: Option<oneshot::Receiver<Error>>,
    state: State,
    cancel: CancelToken,
    metrics: Arc<ProducerMetrics>,
    producer: Option<JoinHandle<()>>,
}

impl BucketIterator {
    /// Split `table` from the start. `chunk_size <= 0` derives it from the
    /// statistics.
    pub fn new(
        table: Arc<TableDiff>,
        source: Arc<dyn SplitSource>,
        chunk_size: i64,
    ) -> Result<Self> {
        Self::with_checkpoint(table, source, chunk_size, None)
    }

    /// Split `table`, resuming after `checkpoint` when one is given.
    pub fn with_checkpoint(
        table: Arc<TableDiff>,
        source: Arc<dyn SplitSource>,
        chunk_size: i64,
        checkpoint: Option<RangeInfo>,
    ) -> Result<Self> {
        Self::with_config(
            table,
            source,
            &SplitterConfig::with_chunk_size(chunk_size),
            checkpoint,
            CancelToken::new(),
        )
    }

    /// Full constructor. `cancel` is shared with the producer and passed into
    /// every source call it makes; firing it stops production.
    pub fn with_config(
        table: Arc<TableDiff>,
        source: Arc<dyn SplitSource>,
        cfg: &SplitterConfig,
        checkpoint: Option<RangeInfo>,
        cancel: CancelToken,
    ) -> Result<Self> {
        cfg.validate()?;
        let Selection {
            index,
            buckets,
            columns,
        } = select_index(&table, source.as_ref(), checkpoint.as_ref(), &cancel)?;

        // There are only `max_chunks` chunks at most.
        let chunk_size = if cfg.chunk_size <= 0 {
            derive_chunk_size(total_rows(&buckets), cfg.split_threshold, cfg.max_chunks)
        } else {
            cfg.chunk_size
        };

        if let Some(cp) = &checkpoint {
            cp.check_columns(&columns)?;
            if cp.bucket_id > buckets.len() {
                return Err(Error::Checkpoint(format!(
                    "bucket {} is out of range, index `{}` has {} buckets",
                    cp.bucket_id,
                    index.name,
                    buckets.len()
                )));
            }
            tracing::info!(
                schema = %table.schema,
                table = %table.table,
                index = %index.name,
                bucket = cp.bucket_id,
                "resume bucket split from checkpoint"
            );
        }

        tracing::debug!(
            schema = %table.schema,
            table = %table.table,
            index = %index.name,
            buckets = buckets.len(),
            chunk_size,
            version = rangesplit_core::VERSION,
            "split table by buckets"
        );

        let (chunks_tx, chunks_rx) = mpsc::channel(cfg.channel_capacity);
        let (err_tx, err_rx) = oneshot::channel();
        let metrics = Arc::new(ProducerMetrics::default());

        let producer = ChunkProducer {
            table: Arc::clone(&table),
            source,
            buckets,
            columns: columns.clone(),
            chunk_size,
            next_id: ChunkId::new(cfg.start_chunk_id),
            checkpoint,
            cancel: cancel.clone(),
            metrics: Arc::clone(&metrics),
            chunks_tx,
        };
        let handle = std::thread::Builder::new()
            .name(format!("bucket-split-{}.{}", table.schema, table.table))
            .spawn(move || producer.run(err_tx))
            .map_err(|e| Error::Producer(format!("spawn producer thread: {e}")))?;

        Ok(Self {
            table,
            index_id: index.id,
            index_columns: columns,
            chunk_size,
            batch: Vec::new().into_iter(),
            chunks_rx: Some(chunks_rx),
            err_rx: Some(err_rx),
            state: State::Running,
            cancel,
            metrics,
            producer: Some(handle),
        })
    }

    pub fn index_id(&self) -> IndexId {
        self.index_id
    }

    pub fn index_columns(&self) -> &[ColumnInfo] {
        &self.index_columns
    }

    /// Effective chunk size (requested or derived).
    pub fn chunk_size(&self) -> i64 {
        self.chunk_size
    }

    pub fn table(&self) -> &TableDiff {
        &self.table
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Next chunk in key order, `Ok(None)` once the table is exhausted.
    ///
    /// Blocks the calling thread while the producer has nothing ready. Must
    /// not be called from inside an async runtime; use [`Self::next_async`].
    pub fn next(&mut self) -> Result<Option<ChunkRange>> {
        loop {
            if let Some(done) = self.settled() {
                return done;
            }
            if let Some(chunk) = self.batch.next() {
                return Ok(Some(chunk));
            }
            let received = match self.chunks_rx.as_mut() {
                Some(rx) => rx.blocking_recv(),
                None => None,
            };
            self.on_received(received);
        }
    }

    /// Async counterpart of [`Self::next`] with the same contract.
    ///
    /// Never joins the producer thread except when it died without reporting
    /// an error, in which case it has already exited. The join otherwise
    /// happens in [`Self::close`] or on drop.
    pub async fn next_async(&mut self) -> Result<Option<ChunkRange>> {
        loop {
            if let Some(done) = self.settled() {
                return done;
            }
            if let Some(chunk) = self.batch.next() {
                return Ok(Some(chunk));
            }
            let received = match self.chunks_rx.as_mut() {
                Some(rx) => rx.recv().await,
                None => None,
            };
            self.on_received(received);
        }
    }

    /// Borrowing iterator over the remaining chunks. Stops after the last
    /// chunk or after yielding the first error.
    pub fn chunks(&mut self) -> Chunks<'_> {
        Chunks { inner: self }
    }

    /// Stop the producer and release the queue. Later pulls return the
    /// current terminal state, or `Ok(None)` if the iterator was still
    /// running. Idempotent; also run on drop.
    pub fn close(&mut self) {
        self.cancel.cancel();
        if let Some(mut rx) = self.chunks_rx.take() {
            // Wakes a producer blocked on a full queue.
            rx.close();
        }
        self.err_rx = None;
        self.join_producer();
        self.batch = Vec::new().into_iter();
        if matches!(self.state, State::Running) {
            self.state = State::Finished;
        }
    }

    fn settled(&self) -> Option<Result<Option<ChunkRange>>> {
        match &self.state {
            State::Running => None,
            State::Finished => Some(Ok(None)),
            State::Failed(e) => Some(Err(e.clone())),
        }
    }

    fn on_received(&mut self, received: Option<Batch>) {
        match received {
            Some(Some(batch)) => self.batch = batch.into_iter(),
            Some(None) => {
                tracing::info!(
                    schema = %self.table.schema,
                    table = %self.table.table,
                    "close chunks channel for table"
                );
                // The producer is past its last send; `close` reaps it.
                self.chunks_rx = None;
                self.err_rx = None;
                self.state = State::Finished;
            }
            None => {
                // The producer fills the error slot before dropping its sender.
                let err = self.err_rx.take().and_then(|mut rx| rx.try_recv().ok());
                self.chunks_rx = None;
                let err = match err {
                    Some(err) => err,
                    // Only a dead producer leaves the slot empty; joining tells
                    // a panic apart and returns at once.
                    None if self.join_producer() => {
                        Error::Producer("producer thread panicked".into())
                    }
                    None => {
                        Error::Producer("producer stopped without signalling completion".into())
                    }
                };
                self.state = State::Failed(err);
            }
        }
    }

    /// Returns true if the producer thread panicked.
    fn join_producer(&mut self) -> bool {
        match self.producer.take() {
            Some(handle) => match handle.join() {
                Ok(()) => false,
                Err(_) => {
                    tracing::warn!(
                        schema = %self.table.schema,
                        table = %self.table.table,
                        "bucket split producer panicked"
                    );
                    true
                }
            },
            None => false,
        }
    }
}

impl Drop for BucketIterator {
    fn drop(&mut self) {
        self.close();
    }
}

/// See [`BucketIterator::chunks`].
pub struct Chunks<'a> {
    inner: &'a mut BucketIterator,
}

impl Iterator for Chunks<'_> {
    type Item = Result<ChunkRange>;

    fn next(&mut self) -> Option<Self::Item> {
        if matches!(self.inner.state, State::Failed(_)) {
            return None;
        }
        self.inner.next().transpose()
    }
}

/// First eligible index wins: skip holes, skip indexes other than the
/// checkpoint's, require statistics, and require resolvable columns.
fn select_index(
    table: &TableDiff,
    source: &dyn SplitSource,
    checkpoint: Option<&RangeInfo>,
    cancel: &CancelToken,
) -> Result<Selection> {
    let mut stats = source
        .bucket_statistics(table, cancel)
        .map_err(|e| e.context(format!("bucket statistics of {}", table.qualified_name())))?;

    for index in source.list_indexes(table) {
        let Some(index) = index else {
            continue;
        };
        if let Some(cp) = checkpoint {
            if cp.index_id != index.id {
                continue;
            }
        }
        let Some(buckets) = stats.remove(&index.name) else {
            return Err(Error::NotFound(format!(
                "index {} in buckets info",
                index.name
            )));
        };
        tracing::debug!(index = %index.name, buckets = buckets.len(), "buckets for index");

        let columns = source.columns_for_index(&index, table);
        if columns.is_empty() {
            continue;
        }
        return Ok(Selection {
            index,
            buckets,
            columns,
        });
    }

    Err(Error::NotFound("no index to split buckets".into()))
}
