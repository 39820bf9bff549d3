//! Provider construction.

use std::sync::Arc;

use lockward_core::config::LockwardConfig;
use lockward_core::config::lock::{IdConfig, LockConfig, RetryConfig};
use lockward_core::config::throttle::ThrottleConfig;
use lockward_core::result::AppResult;
use lockward_core::traits::channel::WakeChannel;
use lockward_core::traits::id::IdGenerator;
use lockward_core::traits::metrics::{LockMetrics, NoopLockMetrics};
use lockward_core::traits::storage::LockStorage;

use crate::id::SnowflakeIdGenerator;
use crate::provider::ResourceLockProvider;
use crate::throttle::ThrottlingProvider;

/// Builds lock and throttling providers over one storage and channel.
///
/// Every provider built here gets its own wake registry and subscription.
/// Unless an id generator is supplied, one [`SnowflakeIdGenerator`] on the
/// configured node id is shared by all providers of this builder.
#[derive(Debug, Clone)]
pub struct LockwardBuilder {
    storage: Arc<dyn LockStorage>,
    channel: Arc<dyn WakeChannel>,
    lock: LockConfig,
    retry: RetryConfig,
    throttle: ThrottleConfig,
    node_id: u16,
    ids: Option<Arc<dyn IdGenerator>>,
    metrics: Arc<dyn LockMetrics>,
}

impl LockwardBuilder {
    /// Start from default configuration.
    pub fn new(storage: Arc<dyn LockStorage>, channel: Arc<dyn WakeChannel>) -> Self {
        Self {
            storage,
            channel,
            lock: LockConfig::default(),
            retry: RetryConfig::default(),
            throttle: ThrottleConfig::default(),
            node_id: 0,
            ids: None,
            metrics: Arc::new(NoopLockMetrics),
        }
    }

    /// Take lock, retry, throttle, and id settings from `config`.
    pub fn config(mut self, config: &LockwardConfig) -> Self {
        self.lock = config.lock.clone();
        self.retry = config.retry.clone();
        self.throttle = config.throttle.clone();
        self.node_id = config.id.node_id;
        self
    }

    /// Override the lock configuration.
    pub fn lock_config(mut self, lock: LockConfig) -> Self {
        self.lock = lock;
        self
    }

    /// Override the retry policy.
    pub fn retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Override the throttle configuration.
    pub fn throttle_config(mut self, throttle: ThrottleConfig) -> Self {
        self.throttle = throttle;
        self
    }

    /// Node id of the default holder id generator.
    pub fn node_id(mut self, node_id: u16) -> Self {
        self.node_id = node_id;
        self.ids = None;
        self
    }

    /// Use a custom holder id generator.
    pub fn id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    /// Report acquisition timings to `metrics`.
    pub fn metrics(mut self, metrics: Arc<dyn LockMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    fn validate(&self) -> AppResult<()> {
        LockwardConfig {
            lock: self.lock.clone(),
            retry: self.retry.clone(),
            throttle: self.throttle.clone(),
            id: IdConfig {
                node_id: self.node_id,
            },
            ..LockwardConfig::default()
        }
        .validate()
    }

    fn ids(&mut self) -> AppResult<Arc<dyn IdGenerator>> {
        if let Some(ids) = &self.ids {
            return Ok(Arc::clone(ids));
        }
        let ids: Arc<dyn IdGenerator> = Arc::new(SnowflakeIdGenerator::new(self.node_id)?);
        self.ids = Some(Arc::clone(&ids));
        Ok(ids)
    }

    /// Build a lock provider.
    pub fn build_lock_provider(&mut self) -> AppResult<ResourceLockProvider> {
        self.validate()?;
        Ok(ResourceLockProvider::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.channel),
            self.ids()?,
            Arc::clone(&self.metrics),
            self.lock.clone(),
            &self.retry,
        ))
    }

    /// Build a throttling provider.
    pub fn build_throttling_provider(&mut self) -> AppResult<ThrottlingProvider> {
        self.validate()?;
        Ok(ThrottlingProvider::new(
            Arc::clone(&self.storage),
            Arc::clone(&self.channel),
            self.ids()?,
            Arc::clone(&self.metrics),
            self.lock.namespace.clone(),
            self.throttle.clone(),
            &self.retry,
            self.lock.wait_bounds(),
        ))
    }
}
