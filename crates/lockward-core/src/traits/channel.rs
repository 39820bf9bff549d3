//! Wake channel trait for best-effort release notifications.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::result::AppResult;

/// Callback invoked with the raw payload of every message on a topic.
pub type WakeHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Publish/subscribe transport used only to cut acquisition latency.
///
/// Delivery is at-most-once and may never happen at all; lock correctness
/// must not depend on it.
#[async_trait]
pub trait WakeChannel: Send + Sync + std::fmt::Debug + 'static {
    /// Publish `message` to every current subscriber of `topic`.
    async fn publish(&self, topic: &str, message: &str) -> AppResult<()>;

    /// Deliver every future message on `topic` to `handler` until the
    /// returned [`Subscription`] is dropped.
    async fn subscribe(&self, topic: &str, handler: WakeHandler) -> AppResult<Subscription>;
}

/// Live subscription. Dropping it stops delivery.
#[derive(Debug)]
pub struct Subscription {
    topic: String,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Subscription driven by a background delivery task.
    pub fn new(topic: impl Into<String>, task: JoinHandle<()>) -> Self {
        Self {
            topic: topic.into(),
            task: Some(task),
        }
    }

    /// Subscription with nothing to drive (e.g. a disabled channel).
    pub fn detached(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            task: None,
        }
    }

    /// Topic this subscription listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the delivery task is still running.
    pub fn is_active(&self) -> bool {
        self.task.as_ref().is_some_and(|task| !task.is_finished())
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
