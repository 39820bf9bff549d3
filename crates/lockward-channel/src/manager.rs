//! Channel manager that builds the configured wake channel.

use std::sync::Arc;

use tracing::info;

use lockward_core::config::channel::ChannelConfig;
use lockward_core::error::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::channel::WakeChannel;

use crate::memory::MemoryWakeChannel;
use crate::null::NullWakeChannel;

/// Owns the wake channel selected by configuration.
#[derive(Debug, Clone)]
pub struct ChannelManager {
    /// The inner channel backend.
    inner: Arc<dyn WakeChannel>,
}

impl ChannelManager {
    /// Create a channel manager from configuration.
    pub async fn new(config: &ChannelConfig) -> AppResult<Self> {
        let inner: Arc<dyn WakeChannel> = match config.provider.as_str() {
            #[cfg(feature = "redis-pubsub")]
            "redis" => {
                info!("Initializing Redis wake channel");
                Arc::new(crate::redis::RedisWakeChannel::connect(&config.redis).await?)
            }
            "memory" => {
                info!("Initializing in-process wake channel");
                Arc::new(MemoryWakeChannel::new(config.memory.buffer_size))
            }
            "none" => {
                info!("Wake channel disabled; waiters will poll");
                Arc::new(NullWakeChannel)
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown channel provider: '{other}'. Supported: memory, redis, none"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a channel manager from an existing channel.
    pub fn from_channel(channel: Arc<dyn WakeChannel>) -> Self {
        Self { inner: channel }
    }

    /// Shared handle to the channel, as consumed by lock providers.
    pub fn channel(&self) -> Arc<dyn WakeChannel> {
        Arc::clone(&self.inner)
    }
}
