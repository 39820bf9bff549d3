//! Metrics sink for lock acquisition.

use std::time::Duration;

/// Receives acquisition timings and failures.
pub trait LockMetrics: Send + Sync + std::fmt::Debug + 'static {
    /// Record how long an acquisition attempt waited and whether it succeeded.
    fn record_wait(&self, resource: &str, elapsed: Duration, acquired: bool);

    /// Record an acquisition that ended without a lock.
    fn record_failure(&self, resource: &str);
}

/// Metrics sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLockMetrics;

impl LockMetrics for NoopLockMetrics {
    fn record_wait(&self, _resource: &str, _elapsed: Duration, _acquired: bool) {}

    fn record_failure(&self, _resource: &str) {}
}
