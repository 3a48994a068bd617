//! Producer counters.
//!
//! Shared between the producer thread and the iterator; read with relaxed
//! ordering, so a snapshot taken mid-run is approximate.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Debug, Default)]
pub(crate) struct ProducerMetrics {
    buckets_scanned: AtomicU64,
    split_calls: AtomicU64,
    batches_sent: AtomicU64,
    chunks_sent: AtomicU64,
}

impl ProducerMetrics {
    pub(crate) fn bucket_scanned(&self) {
        self.buckets_scanned.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn split_called(&self) {
        self.split_calls.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn batch_sent(&self, chunks: usize) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.chunks_sent.fetch_add(chunks as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            buckets_scanned: self.buckets_scanned.load(Ordering::Relaxed),
            split_calls: self.split_calls.load(Ordering::Relaxed),
            batches_sent: self.batches_sent.load(Ordering::Relaxed),
            chunks_sent: self.chunks_sent.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub buckets_scanned: u64,
    pub split_calls: u64,
    pub batches_sent: u64,
    pub chunks_sent: u64,
}

impl MetricsSnapshot {
    pub fn emit(&self, table: &str) {
        tracing::debug!(
            %table,
            buckets_scanned = self.buckets_scanned,
            split_calls = self.split_calls,
            batches_sent = self.batches_sent,
            chunks_sent = self.chunks_sent,
            "chunk production finished"
        );
    }
}
