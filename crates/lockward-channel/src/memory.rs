//! In-process wake channel for single-node deployments and tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use lockward_core::result::AppResult;
use lockward_core::traits::channel::{Subscription, WakeChannel, WakeHandler};

/// In-process pub/sub over broadcast channels.
#[derive(Debug)]
pub struct MemoryWakeChannel {
    /// Topic → broadcast sender.
    topics: RwLock<HashMap<String, broadcast::Sender<String>>>,
    /// Buffer size for each topic.
    buffer_size: usize,
}

impl MemoryWakeChannel {
    /// Create a channel buffering `buffer_size` messages per topic.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            topics: RwLock::new(HashMap::new()),
            buffer_size: buffer_size.max(1),
        }
    }

    /// Number of live receivers on `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .read()
            .await
            .get(topic)
            .map(|tx| tx.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for MemoryWakeChannel {
    fn default() -> Self {
        Self::new(256)
    }
}

#[async_trait]
impl WakeChannel for MemoryWakeChannel {
    async fn publish(&self, topic: &str, message: &str) -> AppResult<()> {
        let topics = self.topics.read().await;
        if let Some(tx) = topics.get(topic) {
            // No receivers is not an error for a best-effort channel.
            let _ = tx.send(message.to_string());
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: WakeHandler) -> AppResult<Subscription> {
        let mut rx = {
            let mut topics = self.topics.write().await;
            topics
                .entry(topic.to_string())
                .or_insert_with(|| broadcast::channel(self.buffer_size).0)
                .subscribe()
        };

        let topic_name = topic.to_string();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => handler(message),
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(topic = %topic_name, skipped, "Wake subscriber lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        Ok(Subscription::new(topic, task))
    }
}
