//! Wake channel that never delivers anything.

use async_trait::async_trait;

use lockward_core::result::AppResult;
use lockward_core::traits::channel::{Subscription, WakeChannel, WakeHandler};

/// Disabled wake channel. Waiters fall back to TTL-bounded polling.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullWakeChannel;

#[async_trait]
impl WakeChannel for NullWakeChannel {
    async fn publish(&self, _topic: &str, _message: &str) -> AppResult<()> {
        Ok(())
    }

    async fn subscribe(&self, topic: &str, _handler: WakeHandler) -> AppResult<Subscription> {
        Ok(Subscription::detached(topic))
    }
}
