//! Throttling provider.
//!
//! Same wait machinery as the lock provider, but the storage primitive is
//! a windowed counter: an acquisition succeeds while fewer than `limit`
//! slots are taken in the current window, and release gives one back.
//! A slot only counts against the window it was taken in, so a release
//! arriving after the window rolled over leaves the new window alone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockward_core::config::lock::RetryConfig;
use lockward_core::config::throttle::ThrottleConfig;
use lockward_core::error::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::channel::WakeChannel;
use lockward_core::traits::id::IdGenerator;
use lockward_core::traits::metrics::LockMetrics;
use lockward_core::traits::storage::{CounterSlot, LockStorage};
use lockward_core::types::{HolderId, ResourceKey};
use lockward_storage::keys;

use crate::retry::{RetryPolicy, with_retries};
use crate::wait::{LoopOutcome, WaitCoordinator};

/// Per-call throttle options. Unset fields fall back to [`ThrottleConfig`].
#[derive(Debug, Clone, Default)]
pub struct ThrottleOptions {
    /// Slots allowed in one window.
    pub limit: Option<u64>,
    /// Length of the counting window.
    pub window: Option<Duration>,
    /// How long to keep retrying before giving up.
    pub acquire_timeout: Option<Duration>,
    /// Token that aborts the wait.
    pub cancel: Option<CancellationToken>,
}

impl ThrottleOptions {
    /// Options using every configured default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the slot limit.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the counting window.
    pub fn window(mut self, window: Duration) -> Self {
        self.window = Some(window);
        self
    }

    /// Set the acquisition timeout.
    pub fn acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = Some(timeout);
        self
    }

    /// Attach a cancellation token.
    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

#[derive(Debug)]
struct ThrottleInner {
    storage: Arc<dyn LockStorage>,
    waits: WaitCoordinator,
    ids: Arc<dyn IdGenerator>,
    metrics: Arc<dyn LockMetrics>,
    namespace: String,
    config: ThrottleConfig,
    retry: RetryPolicy,
    wait_bounds: (Duration, Duration),
}

/// Concurrency cap over a shared resource.
#[derive(Debug, Clone)]
pub struct ThrottlingProvider {
    inner: Arc<ThrottleInner>,
}

impl ThrottlingProvider {
    /// Create a provider. `wait_bounds` are the min/max delay between
    /// attempts, shared with the lock provider's configuration.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn LockStorage>,
        channel: Arc<dyn WakeChannel>,
        ids: Arc<dyn IdGenerator>,
        metrics: Arc<dyn LockMetrics>,
        namespace: impl Into<String>,
        config: ThrottleConfig,
        retry: &RetryConfig,
        wait_bounds: (Duration, Duration),
    ) -> Self {
        let (min_wait, max_wait) = wait_bounds;
        let waits = WaitCoordinator::new(channel, config.release_topic.clone(), min_wait, max_wait);
        let namespace = namespace.into();
        info!(namespace = %namespace, topic = %config.release_topic, "Throttling provider created");
        Self {
            inner: Arc::new(ThrottleInner {
                storage,
                waits,
                ids,
                metrics,
                namespace,
                config,
                retry: RetryPolicy::from(retry),
                wait_bounds,
            }),
        }
    }

    /// Active throttle configuration.
    pub fn config(&self) -> &ThrottleConfig {
        &self.inner.config
    }

    /// Min/max delay between attempts.
    pub fn wait_bounds(&self) -> (Duration, Duration) {
        self.inner.wait_bounds
    }

    /// Wait coordinator shared by every clone of this provider.
    pub fn waits(&self) -> &WaitCoordinator {
        &self.inner.waits
    }

    fn storage_key(&self, resource: &ResourceKey) -> String {
        keys::throttle_key(&self.inner.namespace, resource.as_str())
    }

    /// Take one slot of `resource`, waiting until one frees up or the
    /// acquisition timeout passes (`Ok(None)`). Cancellation behaves as in
    /// the lock provider.
    pub async fn try_acquire(
        &self,
        resource: &str,
        options: ThrottleOptions,
    ) -> AppResult<Option<ThrottleHandle>> {
        let resource = ResourceKey::parse(resource)?;
        let limit = options.limit.unwrap_or(self.inner.config.default_limit);
        if limit == 0 {
            return Err(AppError::validation("Throttle limit must be at least 1"));
        }
        let window = options.window.unwrap_or_else(|| self.inner.config.window());
        if window.is_zero() {
            return Err(AppError::validation("Throttle window must be greater than zero"));
        }
        let timeout = options
            .acquire_timeout
            .unwrap_or_else(|| self.inner.config.acquire_timeout());
        let cancel = options.cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(AppError::cancelled(format!(
                "Throttle slot for '{resource}' cancelled before the first attempt"
            )));
        }

        let permit = HolderId::from(self.inner.ids.next_id());
        let key = self.storage_key(&resource);
        let started = Instant::now();
        let deadline = started + timeout;

        let storage = self.inner.storage.as_ref();
        let key_ref = key.as_str();
        let permit_ref = permit.as_str();
        let outcome = self
            .inner
            .waits
            .run_until(resource.as_str(), key_ref, storage, deadline, &cancel, move || {
                storage.try_increment(key_ref, limit, window, permit_ref)
            })
            .await;

        let waited = started.elapsed();
        let elapsed_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
        let metrics = &self.inner.metrics;
        match outcome {
            LoopOutcome::Acquired(CounterSlot { count, window_id }) => {
                metrics.record_wait(resource.as_str(), waited, true);
                debug!(
                    resource = %resource,
                    slot = count,
                    limit,
                    window_id = %window_id,
                    elapsed_ms,
                    "Throttle slot acquired"
                );
                Ok(Some(ThrottleHandle {
                    provider: self.clone(),
                    resource,
                    permit,
                    window_id,
                    slot: count,
                    waited,
                    released: AtomicBool::new(false),
                }))
            }
            LoopOutcome::TimedOut => {
                metrics.record_wait(resource.as_str(), waited, false);
                metrics.record_failure(resource.as_str());
                debug!(
                    resource = %resource,
                    limit,
                    elapsed_ms,
                    "No throttle slot before timeout"
                );
                Ok(None)
            }
            LoopOutcome::Cancelled => {
                metrics.record_wait(resource.as_str(), waited, false);
                metrics.record_failure(resource.as_str());
                Err(AppError::cancelled(format!(
                    "Throttle slot for '{resource}' cancelled"
                )))
            }
        }
    }

    /// Give back a slot taken in window `window_id`. A window that already
    /// ended is left alone and reported as `0` slots remaining.
    async fn release_slot(
        &self,
        resource: &ResourceKey,
        permit: &HolderId,
        window_id: &str,
    ) -> AppResult<u64> {
        let key = self.storage_key(resource);
        let storage = self.inner.storage.as_ref();
        let key_ref = key.as_str();

        let remaining = with_retries(&self.inner.retry, "throttle_release", move || {
            storage.decrement(key_ref, window_id)
        })
        .await?;

        let Some(remaining) = remaining else {
            debug!(
                resource = %resource,
                permit_id = %permit,
                window_id,
                "Throttle window already rolled over; nothing to release"
            );
            return Ok(0);
        };
        debug!(resource = %resource, permit_id = %permit, remaining, "Throttle slot released");
        self.inner
            .waits
            .publish_released(resource.as_str(), permit.as_str())
            .await;
        Ok(remaining)
    }
}

/// One taken throttle slot.
///
/// Release is idempotent; an unreleased handle gives its slot back on drop
/// (or when the window expires).
#[derive(Debug)]
pub struct ThrottleHandle {
    provider: ThrottlingProvider,
    resource: ResourceKey,
    permit: HolderId,
    window_id: String,
    slot: u64,
    waited: Duration,
    released: AtomicBool,
}

impl ThrottleHandle {
    /// The throttled resource.
    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    /// Identifier carried in this slot's release event.
    pub fn permit_id(&self) -> &HolderId {
        &self.permit
    }

    /// Tag of the counting window this slot was taken in.
    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    /// Counter value right after this slot was taken (1-based).
    pub fn slot(&self) -> u64 {
        self.slot
    }

    /// Time spent waiting for the slot.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// Whether the slot was already given back.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Give the slot back. Returns the slots still taken in this slot's
    /// window (`0` once the window has ended), or `None` if this handle was
    /// already released.
    pub async fn release(&self) -> AppResult<Option<u64>> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }
        match self
            .provider
            .release_slot(&self.resource, &self.permit, &self.window_id)
            .await
        {
            Ok(remaining) => Ok(Some(remaining)),
            Err(e) => {
                self.released.store(false, Ordering::Release);
                Err(e)
            }
        }
    }
}

impl Drop for ThrottleHandle {
    fn drop(&mut self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let provider = self.provider.clone();
                let resource = self.resource.clone();
                let permit = self.permit.clone();
                let window_id = self.window_id.clone();
                runtime.spawn(async move {
                    if let Err(e) = provider.release_slot(&resource, &permit, &window_id).await {
                        warn!(resource = %resource, error = %e, "Release of dropped throttle slot failed");
                    }
                });
            }
            Err(_) => {
                warn!(resource = %self.resource, "Throttle handle dropped outside a runtime; slot expires with its window");
            }
        }
    }
}
