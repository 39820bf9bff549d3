//! In-process acquisition metrics.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use lockward_core::traits::metrics::LockMetrics;

/// Upper bounds (inclusive, milliseconds) of the wait histogram buckets.
/// A final overflow bucket catches everything above the last bound.
pub const WAIT_BUCKETS_MS: [u64; 10] = [10, 50, 100, 250, 500, 1_000, 2_500, 5_000, 10_000, 30_000];

/// Atomic counters plus a fixed-bucket wait-time histogram.
#[derive(Debug)]
pub struct InMemoryLockMetrics {
    /// Acquisition calls that finished, successful or not
    pub waits_total: AtomicU64,
    /// Acquisitions that obtained a lock or slot
    pub acquired_total: AtomicU64,
    /// Acquisitions that ended without one
    pub failed_total: AtomicU64,
    /// Sum of all recorded waits in milliseconds
    pub wait_ms_total: AtomicU64,
    buckets: [AtomicU64; WAIT_BUCKETS_MS.len() + 1],
}

impl InMemoryLockMetrics {
    /// Create zeroed metrics
    pub fn new() -> Self {
        Self {
            waits_total: AtomicU64::new(0),
            acquired_total: AtomicU64::new(0),
            failed_total: AtomicU64::new(0),
            wait_ms_total: AtomicU64::new(0),
            buckets: std::array::from_fn(|_| AtomicU64::new(0)),
        }
    }

    fn bucket_index(elapsed_ms: u64) -> usize {
        WAIT_BUCKETS_MS
            .iter()
            .position(|bound| elapsed_ms <= *bound)
            .unwrap_or(WAIT_BUCKETS_MS.len())
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        let mut buckets: Vec<HistogramBucket> = WAIT_BUCKETS_MS
            .iter()
            .zip(self.buckets.iter())
            .map(|(bound, count)| HistogramBucket {
                le_ms: Some(*bound),
                count: count.load(Ordering::Relaxed),
            })
            .collect();
        buckets.push(HistogramBucket {
            le_ms: None,
            count: self.buckets[WAIT_BUCKETS_MS.len()].load(Ordering::Relaxed),
        });

        MetricsSnapshot {
            waits_total: self.waits_total.load(Ordering::Relaxed),
            acquired_total: self.acquired_total.load(Ordering::Relaxed),
            failed_total: self.failed_total.load(Ordering::Relaxed),
            wait_ms_total: self.wait_ms_total.load(Ordering::Relaxed),
            wait_histogram: buckets,
        }
    }
}

impl Default for InMemoryLockMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl LockMetrics for InMemoryLockMetrics {
    fn record_wait(&self, _resource: &str, elapsed: Duration, acquired: bool) {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.waits_total.fetch_add(1, Ordering::Relaxed);
        self.wait_ms_total.fetch_add(elapsed_ms, Ordering::Relaxed);
        self.buckets[Self::bucket_index(elapsed_ms)].fetch_add(1, Ordering::Relaxed);
        if acquired {
            self.acquired_total.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, _resource: &str) {
        self.failed_total.fetch_add(1, Ordering::Relaxed);
    }
}

/// One histogram bucket; `le_ms == None` is the overflow bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistogramBucket {
    /// Inclusive upper bound in milliseconds
    pub le_ms: Option<u64>,
    /// Waits that fell in this bucket
    pub count: u64,
}

/// Serializable metrics snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    /// Acquisition calls that finished
    pub waits_total: u64,
    /// Successful acquisitions
    pub acquired_total: u64,
    /// Failed acquisitions
    pub failed_total: u64,
    /// Sum of all waits in milliseconds
    pub wait_ms_total: u64,
    /// Wait-time histogram
    pub wait_histogram: Vec<HistogramBucket>,
}
