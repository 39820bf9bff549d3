//! Redis pub/sub wake channel for multi-node deployments.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use redis::aio::{ConnectionManager, PubSub};
use tracing::{debug, info, warn};

use lockward_core::config::channel::RedisChannelConfig;
use lockward_core::error::{AppError, ErrorKind};
use lockward_core::result::AppResult;
use lockward_core::traits::channel::{Subscription, WakeChannel, WakeHandler};

/// Delay before re-subscribing after the pub/sub connection drops.
const RESUBSCRIBE_DELAY: Duration = Duration::from_secs(1);

/// Redis pub/sub wake channel.
///
/// Publishing goes through a shared reconnecting connection; every
/// subscription owns a dedicated pub/sub connection that is re-established
/// in the background if it drops.
#[derive(Clone)]
pub struct RedisWakeChannel {
    /// Client used to open pub/sub connections.
    client: redis::Client,
    /// Connection used for PUBLISH.
    publisher: ConnectionManager,
}

impl std::fmt::Debug for RedisWakeChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisWakeChannel").finish_non_exhaustive()
    }
}

impl RedisWakeChannel {
    /// Connect using the channel configuration.
    pub async fn connect(config: &RedisChannelConfig) -> AppResult<Self> {
        let client = redis::Client::open(config.url.as_str()).map_err(|e| {
            AppError::with_source(ErrorKind::Channel, "Failed to create Redis client", e)
        })?;

        let publisher = client.get_connection_manager().await.map_err(|e| {
            AppError::with_source(ErrorKind::Channel, "Failed to connect to Redis", e)
        })?;

        info!("Redis wake channel connected");
        Ok(Self { client, publisher })
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Channel, format!("Redis pub/sub error: {e}"), e)
    }

    async fn open_pubsub(client: &redis::Client, topic: &str) -> AppResult<PubSub> {
        let mut pubsub = client.get_async_pubsub().await.map_err(Self::map_err)?;
        pubsub.subscribe(topic).await.map_err(Self::map_err)?;
        Ok(pubsub)
    }
}

#[async_trait]
impl WakeChannel for RedisWakeChannel {
    async fn publish(&self, topic: &str, message: &str) -> AppResult<()> {
        let mut conn = self.publisher.clone();
        redis::cmd("PUBLISH")
            .arg(topic)
            .arg(message)
            .query_async::<i64>(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: WakeHandler) -> AppResult<Subscription> {
        // The first subscription happens inline so connection errors reach the caller.
        let first = Self::open_pubsub(&self.client, topic).await?;
        info!(topic, "Subscribed to Redis wake topic");

        let client = self.client.clone();
        let topic_name = topic.to_string();
        let task = tokio::spawn(async move {
            let mut pubsub = Some(first);
            loop {
                let current = match pubsub.take() {
                    Some(p) => p,
                    None => match Self::open_pubsub(&client, &topic_name).await {
                        Ok(p) => {
                            info!(topic = %topic_name, "Re-subscribed to Redis wake topic");
                            p
                        }
                        Err(e) => {
                            warn!(topic = %topic_name, error = %e, "Redis wake re-subscribe failed");
                            tokio::time::sleep(RESUBSCRIBE_DELAY).await;
                            continue;
                        }
                    },
                };

                let mut messages = current.into_on_message();
                while let Some(msg) = messages.next().await {
                    match msg.get_payload::<String>() {
                        Ok(payload) => handler(payload),
                        Err(e) => debug!(topic = %topic_name, error = %e, "Dropping undecodable wake payload"),
                    }
                }

                warn!(topic = %topic_name, "Redis wake subscription dropped; waiters fall back to polling");
                tokio::time::sleep(RESUBSCRIBE_DELAY).await;
            }
        });

        Ok(Subscription::new(topic, task))
    }
}
