//! Resource lock provider.
//!
//! Each attempt is `Trying -> Waiting -> (Trying | TimedOut | Cancelled |
//! Acquired)`. Storage is the only mutual-exclusion primitive; the wake
//! registry and channel only shorten the `Waiting` step.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockward_core::config::lock::{LockConfig, RetryConfig};
use lockward_core::error::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::channel::WakeChannel;
use lockward_core::traits::id::IdGenerator;
use lockward_core::traits::metrics::LockMetrics;
use lockward_core::traits::storage::LockStorage;
use lockward_core::types::{HolderId, ResourceKey};
use lockward_storage::keys;

use crate::handle::LockHandle;
use crate::retry::{RetryPolicy, with_retries};
use crate::wait::{LoopOutcome, WaitCoordinator};

/// Per-call acquisition options. Unset fields fall back to [`LockConfig`].
#[derive(Debug, Clone, Default)]
pub struct AcquireOptions {
    /// Lock record TTL.
    pub ttl: Option<Duration>,
    /// How long to keep retrying before giving up.
    pub acquire_timeout: Option<Duration>,
    /// Token that aborts the wait.
    pub cancel: Option<CancellationToken>,
}

impl AcquireOptions {
    /// Options using every configured default.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the lock record TTL.
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
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

/// Advisory snapshot of one resource's lock record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockStatus {
    /// Resource key as given by the caller.
    pub resource: String,
    /// Whether a lock record exists.
    pub locked: bool,
    /// Remaining TTL in milliseconds, if the record has one.
    pub ttl_ms: Option<u64>,
}

impl LockStatus {
    /// Remaining TTL as a [`Duration`].
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_ms.map(Duration::from_millis)
    }
}

#[derive(Debug)]
struct LockProviderInner {
    storage: Arc<dyn LockStorage>,
    waits: WaitCoordinator,
    ids: Arc<dyn IdGenerator>,
    metrics: Arc<dyn LockMetrics>,
    config: LockConfig,
    retry: RetryPolicy,
}

/// Distributed lock provider over a [`LockStorage`] backend.
///
/// Cloning is cheap; clones share the wake registry and the release
/// subscription. Separate providers never share either.
#[derive(Debug, Clone)]
pub struct ResourceLockProvider {
    inner: Arc<LockProviderInner>,
}

impl ResourceLockProvider {
    /// Create a provider. Prefer [`crate::LockwardBuilder`], which validates
    /// the configuration first.
    pub fn new(
        storage: Arc<dyn LockStorage>,
        channel: Arc<dyn WakeChannel>,
        ids: Arc<dyn IdGenerator>,
        metrics: Arc<dyn LockMetrics>,
        config: LockConfig,
        retry: &RetryConfig,
    ) -> Self {
        let (min_wait, max_wait) = config.wait_bounds();
        let waits = WaitCoordinator::new(channel, config.release_topic.clone(), min_wait, max_wait);
        info!(
            namespace = %config.namespace,
            topic = %config.release_topic,
            "Resource lock provider created"
        );
        Self {
            inner: Arc::new(LockProviderInner {
                storage,
                waits,
                ids,
                metrics,
                config,
                retry: RetryPolicy::from(retry),
            }),
        }
    }

    /// Active lock configuration.
    pub fn config(&self) -> &LockConfig {
        &self.inner.config
    }

    /// Wait coordinator shared by every clone of this provider.
    pub fn waits(&self) -> &WaitCoordinator {
        &self.inner.waits
    }

    fn storage_key(&self, resource: &ResourceKey) -> String {
        keys::lock_key(&self.inner.config.namespace, resource.as_str())
    }

    /// Try to acquire `resource` until the acquisition timeout.
    ///
    /// Returns `Ok(None)` when the lock stayed held by someone else until
    /// the deadline. Storage errors inside the loop are logged and retried.
    /// A cancelled token yields `Err` with kind `Cancelled`, also when it
    /// was cancelled before the first attempt (no storage call is made).
    pub async fn try_acquire(
        &self,
        resource: &str,
        options: AcquireOptions,
    ) -> AppResult<Option<LockHandle>> {
        let resource = ResourceKey::parse(resource)?;
        let ttl = options.ttl.unwrap_or_else(|| self.inner.config.default_ttl());
        if ttl.is_zero() {
            return Err(AppError::validation("Lock TTL must be greater than zero"));
        }
        let timeout = options
            .acquire_timeout
            .unwrap_or_else(|| self.inner.config.acquire_timeout());
        let cancel = options.cancel.unwrap_or_default();
        if cancel.is_cancelled() {
            return Err(AppError::cancelled(format!(
                "Acquisition of '{resource}' cancelled before the first attempt"
            )));
        }

        let holder = HolderId::from(self.inner.ids.next_id());
        let key = self.storage_key(&resource);
        let started = Instant::now();
        let deadline = started + timeout;

        let storage = self.inner.storage.as_ref();
        let key_ref = key.as_str();
        let holder_ref = holder.as_str();
        let outcome = self
            .inner
            .waits
            .run_until(resource.as_str(), key_ref, storage, deadline, &cancel, move || async move {
                Ok(storage
                    .insert_if_absent(key_ref, holder_ref, ttl)
                    .await?
                    .then_some(()))
            })
            .await;

        let waited = started.elapsed();
        let elapsed_ms = u64::try_from(waited.as_millis()).unwrap_or(u64::MAX);
        let slow = waited > self.inner.config.slow_wait_warning();
        let metrics = &self.inner.metrics;

        match outcome {
            LoopOutcome::Acquired(()) => {
                metrics.record_wait(resource.as_str(), waited, true);
                if slow {
                    warn!(
                        resource = %resource,
                        holder_id = %holder,
                        elapsed_ms,
                        "Lock acquired after a slow wait"
                    );
                } else {
                    debug!(
                        resource = %resource,
                        holder_id = %holder,
                        elapsed_ms,
                        "Lock acquired"
                    );
                }
                Ok(Some(LockHandle::new(self.clone(), resource, holder, ttl, waited)))
            }
            LoopOutcome::TimedOut => {
                metrics.record_wait(resource.as_str(), waited, false);
                metrics.record_failure(resource.as_str());
                if slow {
                    warn!(
                        resource = %resource,
                        elapsed_ms,
                        "Lock not acquired before timeout"
                    );
                } else {
                    debug!(
                        resource = %resource,
                        elapsed_ms,
                        "Lock not acquired before timeout"
                    );
                }
                Ok(None)
            }
            LoopOutcome::Cancelled => {
                metrics.record_wait(resource.as_str(), waited, false);
                metrics.record_failure(resource.as_str());
                debug!(resource = %resource, elapsed_ms, "Lock acquisition cancelled");
                Err(AppError::cancelled(format!(
                    "Acquisition of '{resource}' cancelled"
                )))
            }
        }
    }

    /// Like [`try_acquire`](Self::try_acquire), but a timeout is an error of
    /// kind `LockTimeout`.
    pub async fn acquire(&self, resource: &str, options: AcquireOptions) -> AppResult<LockHandle> {
        let timeout = options
            .acquire_timeout
            .unwrap_or_else(|| self.inner.config.acquire_timeout());
        self.try_acquire(resource, options).await?.ok_or_else(|| {
            AppError::lock_timeout(format!(
                "Could not acquire '{resource}' within {} ms",
                timeout.as_millis()
            ))
        })
    }

    /// Acquire `resource`, run `work`, and always release afterwards.
    ///
    /// `work` receives the holder id so it can renew. Returns `Ok(None)`
    /// without running `work` when the lock was not acquired. An error from
    /// `work` wins over a release error.
    pub async fn run_exclusive<T, F, Fut>(
        &self,
        resource: &str,
        options: AcquireOptions,
        work: F,
    ) -> AppResult<Option<T>>
    where
        F: FnOnce(HolderId) -> Fut,
        Fut: Future<Output = AppResult<T>>,
    {
        let Some(handle) = self.try_acquire(resource, options).await? else {
            return Ok(None);
        };

        let result = work(handle.holder_id().clone()).await;
        let released = handle.release().await;

        match (result, released) {
            (Ok(value), Ok(_)) => Ok(Some(value)),
            (Ok(_), Err(e)) => Err(e),
            (Err(e), Ok(_)) => Err(e),
            (Err(e), Err(release_err)) => {
                warn!(resource, error = %release_err, "Release after failed work also failed");
                Err(e)
            }
        }
    }

    /// Release `resource` if it is still held by `holder`.
    ///
    /// Returns `false` when the lock had already expired or belongs to
    /// someone else. A release event is published either way.
    pub async fn release(&self, resource: &str, holder: &HolderId) -> AppResult<bool> {
        let resource = ResourceKey::parse(resource)?;
        self.release_resource(&resource, holder).await
    }

    pub(crate) async fn release_resource(
        &self,
        resource: &ResourceKey,
        holder: &HolderId,
    ) -> AppResult<bool> {
        let key = self.storage_key(resource);
        let storage = self.inner.storage.as_ref();
        let (key_ref, holder_ref) = (key.as_str(), holder.as_str());

        let removed = with_retries(&self.inner.retry, "release", move || {
            storage.remove_if_holder(key_ref, holder_ref)
        })
        .await?;

        if removed {
            debug!(resource = %resource, holder_id = %holder, "Lock released");
        } else {
            debug!(resource = %resource, holder_id = %holder, "Lock already gone at release");
        }
        self.inner
            .waits
            .publish_released(resource.as_str(), holder.as_str())
            .await;
        Ok(removed)
    }

    /// Reset the TTL of `resource` to `ttl` if `holder` still owns it.
    ///
    /// `false` means the lock was lost; the caller must stop its critical
    /// section.
    pub async fn renew(&self, resource: &str, holder: &HolderId, ttl: Duration) -> AppResult<bool> {
        let resource = ResourceKey::parse(resource)?;
        self.renew_resource(&resource, holder, ttl).await
    }

    pub(crate) async fn renew_resource(
        &self,
        resource: &ResourceKey,
        holder: &HolderId,
        ttl: Duration,
    ) -> AppResult<bool> {
        if ttl.is_zero() {
            return Err(AppError::validation("Lock TTL must be greater than zero"));
        }
        let key = self.storage_key(resource);
        let storage = self.inner.storage.as_ref();
        let (key_ref, holder_ref) = (key.as_str(), holder.as_str());

        let renewed = with_retries(&self.inner.retry, "renew", move || {
            storage.replace_if_holder(key_ref, holder_ref, holder_ref, ttl)
        })
        .await?;

        if renewed {
            debug!(
                resource = %resource,
                holder_id = %holder,
                ttl_ms = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX),
                "Lock renewed"
            );
        } else {
            warn!(resource = %resource, holder_id = %holder, "Lock lost before renewal");
        }
        Ok(renewed)
    }

    /// Whether `resource` is currently locked. Advisory only.
    pub async fn is_locked(&self, resource: &str) -> AppResult<bool> {
        let resource = ResourceKey::parse(resource)?;
        let key = self.storage_key(&resource);
        let storage = self.inner.storage.as_ref();
        let key_ref = key.as_str();
        with_retries(&self.inner.retry, "is_locked", move || storage.exists(key_ref)).await
    }

    /// Lock state and remaining TTL of `resource`. Advisory only.
    pub async fn status(&self, resource: &str) -> AppResult<LockStatus> {
        let resource = ResourceKey::parse(resource)?;
        let key = self.storage_key(&resource);
        let storage = self.inner.storage.as_ref();
        let key_ref = key.as_str();

        let locked = with_retries(&self.inner.retry, "status", move || storage.exists(key_ref)).await?;
        let ttl = if locked {
            with_retries(&self.inner.retry, "status", move || storage.get_ttl(key_ref)).await?
        } else {
            None
        };

        Ok(LockStatus {
            resource: resource.into(),
            locked,
            ttl_ms: ttl.map(|ttl| u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX)),
        })
    }
}
