//! # lockward
//!
//! Distributed resource locks and throttles over a shared [`LockStorage`]
//! backend. Storage is the only cross-process mutual-exclusion primitive;
//! a [`WakeChannel`] carries best-effort release events that let local
//! waiters retry early instead of sleeping out their bounded delay.
//!
//! ```no_run
//! # async fn demo() -> lockward_core::AppResult<()> {
//! use std::time::Duration;
//! use lockward::{AcquireOptions, Lockward};
//! use lockward_core::config::LockwardConfig;
//!
//! let lockward = Lockward::connect(&LockwardConfig::default()).await?;
//! let options = AcquireOptions::new()
//!     .ttl(Duration::from_secs(20 * 60))
//!     .acquire_timeout(Duration::from_secs(5));
//! if let Some(lock) = lockward.locks().try_acquire("invoice:42", options).await? {
//!     // critical section
//!     lock.release().await?;
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`LockStorage`]: lockward_core::traits::LockStorage
//! [`WakeChannel`]: lockward_core::traits::WakeChannel

pub mod builder;
pub mod handle;
pub mod id;
pub mod metrics;
pub mod provider;
pub mod registry;
pub mod retry;
pub mod throttle;
pub mod wait;

use std::sync::Arc;

use tracing::info;

use lockward_channel::ChannelManager;
use lockward_core::config::LockwardConfig;
use lockward_core::result::AppResult;
use lockward_core::traits::storage::LockStorage;
use lockward_storage::StorageManager;

pub use builder::LockwardBuilder;
pub use handle::LockHandle;
pub use id::SnowflakeIdGenerator;
pub use metrics::{InMemoryLockMetrics, MetricsSnapshot};
pub use provider::{AcquireOptions, LockStatus, ResourceLockProvider};
pub use registry::WakeRegistry;
pub use throttle::{ThrottleHandle, ThrottleOptions, ThrottlingProvider};

/// Lock and throttling providers wired to the configured backends.
#[derive(Debug, Clone)]
pub struct Lockward {
    locks: ResourceLockProvider,
    throttles: ThrottlingProvider,
    storage: StorageManager,
    metrics: Arc<InMemoryLockMetrics>,
}

impl Lockward {
    /// Validate `config`, connect storage and wake channel, and build both
    /// providers. Acquisition metrics are collected in memory.
    pub async fn connect(config: &LockwardConfig) -> AppResult<Self> {
        config.validate()?;

        let storage = StorageManager::new(&config.storage).await?;
        let channel = ChannelManager::new(&config.channel).await?;
        let metrics = Arc::new(InMemoryLockMetrics::new());

        let mut builder = LockwardBuilder::new(storage.storage(), channel.channel())
            .config(config)
            .metrics(metrics.clone());
        let locks = builder.build_lock_provider()?;
        let throttles = builder.build_throttling_provider()?;

        info!(
            storage = %config.storage.provider,
            channel = %config.channel.provider,
            node_id = config.id.node_id,
            "Lockward ready"
        );

        Ok(Self {
            locks,
            throttles,
            storage,
            metrics,
        })
    }

    /// The lock provider.
    pub fn locks(&self) -> &ResourceLockProvider {
        &self.locks
    }

    /// The throttling provider.
    pub fn throttles(&self) -> &ThrottlingProvider {
        &self.throttles
    }

    /// The storage backend.
    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Acquisition metrics collected since connect.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Whether the storage backend answers.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.storage.health_check().await
    }
}
