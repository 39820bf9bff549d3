//! Lock handle returned by a successful acquisition.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::warn;

use lockward_core::result::AppResult;
use lockward_core::types::{HolderId, ResourceKey};

use crate::provider::ResourceLockProvider;

/// Ownership token for one lock.
///
/// Release is idempotent: only the first successful call touches storage.
/// A handle dropped without release schedules one on the current Tokio
/// runtime; without a runtime the record simply expires after its TTL.
#[derive(Debug)]
pub struct LockHandle {
    provider: ResourceLockProvider,
    resource: ResourceKey,
    holder: HolderId,
    ttl: Duration,
    waited: Duration,
    acquired_at: DateTime<Utc>,
    released: AtomicBool,
}

impl LockHandle {
    pub(crate) fn new(
        provider: ResourceLockProvider,
        resource: ResourceKey,
        holder: HolderId,
        ttl: Duration,
        waited: Duration,
    ) -> Self {
        Self {
            provider,
            resource,
            holder,
            ttl,
            waited,
            acquired_at: Utc::now(),
            released: AtomicBool::new(false),
        }
    }

    /// The locked resource.
    pub fn resource(&self) -> &ResourceKey {
        &self.resource
    }

    /// Fencing token written to storage.
    pub fn holder_id(&self) -> &HolderId {
        &self.holder
    }

    /// TTL the lock was acquired with.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Time spent waiting before the lock was obtained.
    pub fn waited(&self) -> Duration {
        self.waited
    }

    /// When the lock was obtained.
    pub fn acquired_at(&self) -> DateTime<Utc> {
        self.acquired_at
    }

    /// Whether [`release`](Self::release) already succeeded.
    pub fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    /// Release the lock. Later calls return `Ok(false)` without touching
    /// storage. A failed release can be retried.
    pub async fn release(&self) -> AppResult<bool> {
        if self.released.swap(true, Ordering::AcqRel) {
            return Ok(false);
        }
        match self.provider.release_resource(&self.resource, &self.holder).await {
            Ok(removed) => Ok(removed),
            Err(e) => {
                self.released.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Reset the lock TTL. `false` means the lock is lost (or was released).
    pub async fn renew(&self, ttl: Duration) -> AppResult<bool> {
        if self.is_released() {
            return Ok(false);
        }
        self.provider.renew_resource(&self.resource, &self.holder, ttl).await
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if self.released.load(Ordering::Acquire) {
            return;
        }
        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let provider = self.provider.clone();
                let resource = self.resource.clone();
                let holder = self.holder.clone();
                runtime.spawn(async move {
                    if let Err(e) = provider.release_resource(&resource, &holder).await {
                        warn!(resource = %resource, holder_id = %holder, error = %e, "Release of dropped lock handle failed");
                    }
                });
            }
            Err(_) => {
                warn!(
                    resource = %self.resource,
                    holder_id = %self.holder,
                    "Lock handle dropped outside a runtime; lock expires by TTL"
                );
            }
        }
    }
}
