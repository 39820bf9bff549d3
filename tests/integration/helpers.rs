//! Shared test helpers for integration tests.
//!
//! Separate provider instances over one shared storage and channel stand in
//! for separate processes: each has its own wake registry, subscription,
//! and holder-id node.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use lockward::{InMemoryLockMetrics, LockwardBuilder, ResourceLockProvider, ThrottlingProvider};
use lockward_channel::{MemoryWakeChannel, NullWakeChannel};
use lockward_core::config::lock::LockConfig;
use lockward_core::config::throttle::ThrottleConfig;
use lockward_core::traits::channel::WakeChannel;
use lockward_core::traits::storage::LockStorage;
use lockward_storage::memory::MemoryLockStorage;

/// Shared backends plus a counter for node ids.
pub struct TestHarness {
    /// Storage shared by every "process"
    pub storage: MemoryLockStorage,
    /// Wake channel shared by every "process"
    pub channel: Arc<dyn WakeChannel>,
    /// Lock settings applied to every provider
    pub lock: LockConfig,
    /// Throttle settings applied to every provider
    pub throttle: ThrottleConfig,
    next_node: std::sync::atomic::AtomicU16,
}

impl TestHarness {
    /// Harness with a connected in-process wake channel and production
    /// wait bounds (50 ms to 3 s).
    pub fn new() -> Self {
        Self::with_channel(Arc::new(MemoryWakeChannel::new(64)))
    }

    /// Harness whose wake channel never delivers anything.
    pub fn without_wakeups() -> Self {
        Self::with_channel(Arc::new(NullWakeChannel))
    }

    /// Harness over an arbitrary wake channel.
    pub fn with_channel(channel: Arc<dyn WakeChannel>) -> Self {
        Self {
            storage: MemoryLockStorage::new(),
            channel,
            lock: LockConfig::default(),
            throttle: ThrottleConfig::default(),
            next_node: std::sync::atomic::AtomicU16::new(1),
        }
    }

    /// Override the wait bounds of providers built afterwards.
    pub fn wait_bounds(mut self, min: Duration, max: Duration) -> Self {
        self.lock.min_wait_ms = u64::try_from(min.as_millis()).unwrap_or(u64::MAX);
        self.lock.max_wait_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Override the throttle settings of providers built afterwards.
    pub fn throttle(mut self, limit: u64, window: Duration) -> Self {
        self.throttle.default_limit = limit;
        self.throttle.window_seconds = window.as_secs().max(1);
        self
    }

    fn builder(&self) -> LockwardBuilder {
        let node = self
            .next_node
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let storage: Arc<dyn LockStorage> = Arc::new(self.storage.clone());
        LockwardBuilder::new(storage, Arc::clone(&self.channel))
            .lock_config(self.lock.clone())
            .throttle_config(self.throttle.clone())
            .node_id(node)
    }

    /// A lock provider acting as a fresh process.
    pub fn lock_provider(&self) -> ResourceLockProvider {
        self.builder()
            .build_lock_provider()
            .expect("Failed to build lock provider")
    }

    /// A lock provider reporting into `metrics`.
    pub fn lock_provider_with_metrics(
        &self,
        metrics: Arc<InMemoryLockMetrics>,
    ) -> ResourceLockProvider {
        self.builder()
            .metrics(metrics)
            .build_lock_provider()
            .expect("Failed to build lock provider")
    }

    /// A throttling provider acting as a fresh process.
    pub fn throttling_provider(&self) -> ThrottlingProvider {
        self.builder()
            .build_throttling_provider()
            .expect("Failed to build throttling provider")
    }

    /// Remaining TTL of the lock record for `resource`.
    pub async fn lock_ttl(&self, resource: &str) -> Option<Duration> {
        let key = lockward_storage::keys::lock_key(&self.lock.namespace, resource);
        self.storage.get_ttl(&key).await.expect("TTL lookup failed")
    }
}
