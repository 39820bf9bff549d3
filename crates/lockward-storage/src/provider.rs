//! Storage manager that dispatches to the configured backend.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use lockward_core::config::storage::StorageConfig;
use lockward_core::error::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::storage::{CounterSlot, LockStorage};

/// Storage manager wrapping the configured lock storage backend.
///
/// The backend is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct StorageManager {
    /// The inner storage backend.
    inner: Arc<dyn LockStorage>,
}

impl StorageManager {
    /// Create a storage manager from configuration.
    ///
    /// The in-memory backend also starts its expiry sweeper when
    /// `memory.sweep_interval_seconds` is non-zero.
    pub async fn new(config: &StorageConfig) -> AppResult<Self> {
        let inner: Arc<dyn LockStorage> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis lock storage");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisLockStorage::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory lock storage");
                let storage = crate::memory::MemoryLockStorage::new();
                if config.memory.sweep_interval_seconds > 0 {
                    // Stops by itself once the storage is dropped.
                    let _sweeper = storage
                        .spawn_sweeper(Duration::from_secs(config.memory.sweep_interval_seconds));
                }
                Arc::new(storage)
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown storage provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a storage manager from an existing backend.
    pub fn from_storage(storage: Arc<dyn LockStorage>) -> Self {
        Self { inner: storage }
    }

    /// Shared handle to the backend, as consumed by lock providers.
    pub fn storage(&self) -> Arc<dyn LockStorage> {
        Arc::clone(&self.inner)
    }
}

#[async_trait]
impl LockStorage for StorageManager {
    async fn insert_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool> {
        self.inner.insert_if_absent(key, holder, ttl).await
    }

    async fn replace_if_holder(
        &self,
        key: &str,
        expected: &str,
        new_holder: &str,
        new_ttl: Duration,
    ) -> AppResult<bool> {
        self.inner
            .replace_if_holder(key, expected, new_holder, new_ttl)
            .await
    }

    async fn remove_if_holder(&self, key: &str, expected: &str) -> AppResult<bool> {
        self.inner.remove_if_holder(key, expected).await
    }

    async fn get_ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        self.inner.get_ttl(key).await
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        self.inner.exists(key).await
    }

    async fn try_increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        window_id: &str,
    ) -> AppResult<Option<CounterSlot>> {
        self.inner.try_increment(key, limit, window, window_id).await
    }

    async fn decrement(&self, key: &str, window_id: &str) -> AppResult<Option<u64>> {
        self.inner.decrement(key, window_id).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
