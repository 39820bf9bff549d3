//! Retry loop shared by the lock and throttling providers.
//!
//! Each attempt hits storage first. When it fails, the caller registers in
//! the [`WakeRegistry`] and sleeps until a release event, the bounded delay
//! or cancellation, whichever comes first. Wake-ups only shorten the sleep:
//! the next storage attempt is always what decides.
//!
//! The release-topic subscription is made in the background the first time
//! someone has to wait. A waiter never blocks on it, so a slow or broken
//! wake channel can only cost latency, never the acquisition timeout.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::OnceCell;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lockward_core::result::AppResult;
use lockward_core::traits::channel::{Subscription, WakeChannel, WakeHandler};
use lockward_core::traits::storage::LockStorage;
use lockward_core::types::ReleasedEvent;

use crate::registry::WakeRegistry;

/// Fraction of the computed delay added as random jitter.
const JITTER_RATIO: f64 = 0.1;

/// Pause after a failed subscription before the next one is attempted.
const SUBSCRIBE_RETRY_BACKOFF: Duration = Duration::from_secs(5);

/// How a single wait ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// A release event for the resource arrived.
    Woken,
    /// The bounded delay elapsed.
    Elapsed,
    /// The caller's cancellation token fired.
    Cancelled,
}

/// How an acquisition loop ended.
#[derive(Debug)]
pub enum LoopOutcome<T> {
    /// An attempt succeeded with this value.
    Acquired(T),
    /// The deadline passed without success.
    TimedOut,
    /// The caller cancelled.
    Cancelled,
}

/// Wake registry, channel subscription, and wait policy of one provider.
#[derive(Debug)]
pub struct WaitCoordinator {
    registry: Arc<WakeRegistry>,
    channel: Arc<dyn WakeChannel>,
    topic: String,
    subscription: Arc<OnceCell<Subscription>>,
    /// Set while a background subscription attempt is running.
    subscribing: Arc<AtomicBool>,
    /// No background attempt starts before this instant.
    retry_at: Arc<Mutex<Option<Instant>>>,
    min_wait: Duration,
    max_wait: Duration,
}

impl WaitCoordinator {
    /// Create a coordinator listening on `topic`.
    ///
    /// Nothing is subscribed until the first caller has to wait.
    pub fn new(
        channel: Arc<dyn WakeChannel>,
        topic: impl Into<String>,
        min_wait: Duration,
        max_wait: Duration,
    ) -> Self {
        Self {
            registry: Arc::new(WakeRegistry::new()),
            channel,
            topic: topic.into(),
            subscription: Arc::new(OnceCell::new()),
            subscribing: Arc::new(AtomicBool::new(false)),
            retry_at: Arc::new(Mutex::new(None)),
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    /// The wake registry owned by this coordinator.
    pub fn registry(&self) -> &WakeRegistry {
        &self.registry
    }

    /// Release topic this coordinator listens on.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Whether the one-time subscription has been established.
    pub fn is_subscribed(&self) -> bool {
        self.subscription.initialized()
    }

    /// Publish a release of `resource`. Failures are logged, never returned.
    pub async fn publish_released(&self, resource: &str, holder_id: &str) {
        let event = ReleasedEvent::new(resource, holder_id);
        let payload = match event.encode() {
            Ok(payload) => payload,
            Err(e) => {
                warn!(resource, error = %e, "Failed to encode release event");
                return;
            }
        };
        if let Err(e) = self.channel.publish(&self.topic, &payload).await {
            warn!(resource, topic = %self.topic, error = %e, "Failed to publish release event");
        }
    }

    /// Subscribe to the release topic once per coordinator and wait for
    /// the outcome.
    ///
    /// Concurrent first callers race on the same initializer and only one
    /// subscription is made. A failed attempt leaves the cell empty so a
    /// later call retries; meanwhile waiters simply poll.
    pub async fn ensure_subscribed(&self) -> bool {
        subscribe_once(&self.subscription, &self.channel, &self.topic, &self.registry).await
    }

    /// Start the one-time subscription in the background unless it exists,
    /// is already being attempted, or failed less than
    /// [`SUBSCRIBE_RETRY_BACKOFF`] ago.
    pub fn request_subscription(&self) {
        if self.subscription.initialized() {
            return;
        }
        {
            let retry_at = self.retry_at.lock().unwrap_or_else(PoisonError::into_inner);
            if matches!(*retry_at, Some(at) if Instant::now() < at) {
                return;
            }
        }
        if self.subscribing.swap(true, Ordering::AcqRel) {
            return;
        }

        let subscription = Arc::clone(&self.subscription);
        let channel = Arc::clone(&self.channel);
        let topic = self.topic.clone();
        let registry = Arc::clone(&self.registry);
        let subscribing = Arc::clone(&self.subscribing);
        let retry_at = Arc::clone(&self.retry_at);
        tokio::spawn(async move {
            let subscribed = subscribe_once(&subscription, &channel, &topic, &registry).await;
            let mut next = retry_at.lock().unwrap_or_else(PoisonError::into_inner);
            *next = (!subscribed).then(|| Instant::now() + SUBSCRIBE_RETRY_BACKOFF);
            drop(next);
            subscribing.store(false, Ordering::Release);
        });
    }

    /// Delay before the next attempt given the record's remaining TTL.
    ///
    /// The floor avoids hot loops on tiny TTLs; the ceiling bounds how long
    /// a lost wake message can delay a waiter.
    pub fn bounded_delay(&self, ttl: Option<Duration>) -> Duration {
        let base = ttl
            .map(|ttl| ttl.clamp(self.min_wait, self.max_wait))
            .unwrap_or(self.min_wait);
        let jitter = base.mul_f64(rand::random::<f64>() * JITTER_RATIO);
        (base + jitter).min(self.max_wait)
    }

    /// Wait for a release of `resource`, bounded by the TTL of `key` and by
    /// `deadline`.
    pub async fn wait(
        &self,
        resource: &str,
        key: &str,
        storage: &dyn LockStorage,
        deadline: Instant,
        cancel: &CancellationToken,
    ) -> WaitOutcome {
        let guard = self.registry.acquire_waiter(resource);
        self.request_subscription();

        // Enabled before the TTL lookup so a release landing in between is not missed.
        let notified = guard.signal().notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let ttl = match storage.get_ttl(key).await {
            Ok(ttl) => ttl,
            Err(e) => {
                warn!(resource, error = %e, "TTL lookup failed; waiting the maximum delay");
                Some(self.max_wait)
            }
        };
        let delay = self
            .bounded_delay(ttl)
            .min(deadline.saturating_duration_since(Instant::now()));

        let outcome = tokio::select! {
            _ = &mut notified => WaitOutcome::Woken,
            _ = tokio::time::sleep(delay) => WaitOutcome::Elapsed,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        };
        debug!(
            resource,
            ?outcome,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "Wait finished"
        );
        outcome
    }

    /// Run `attempt` until it yields a value, `deadline` passes, or `cancel`
    /// fires. Attempt errors are logged and count as a failed attempt.
    pub async fn run_until<T, F, Fut>(
        &self,
        resource: &str,
        key: &str,
        storage: &dyn LockStorage,
        deadline: Instant,
        cancel: &CancellationToken,
        mut attempt: F,
    ) -> LoopOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = AppResult<Option<T>>>,
    {
        let mut attempts: u32 = 0;
        loop {
            attempts += 1;
            match attempt().await {
                Ok(Some(value)) => return LoopOutcome::Acquired(value),
                Ok(None) => {}
                Err(e) => {
                    warn!(resource, attempt = attempts, error = %e, "Storage attempt failed");
                }
            }

            if cancel.is_cancelled() {
                return LoopOutcome::Cancelled;
            }
            if Instant::now() >= deadline {
                debug!(resource, attempts, "Acquisition deadline reached");
                return LoopOutcome::TimedOut;
            }

            if self.wait(resource, key, storage, deadline, cancel).await == WaitOutcome::Cancelled {
                return LoopOutcome::Cancelled;
            }
        }
    }
}

/// Subscribe `registry` to release events on `topic` unless `cell` already
/// holds the subscription.
async fn subscribe_once(
    cell: &OnceCell<Subscription>,
    channel: &Arc<dyn WakeChannel>,
    topic: &str,
    registry: &Arc<WakeRegistry>,
) -> bool {
    if cell.initialized() {
        return true;
    }

    let result = cell
        .get_or_try_init(|| async {
            let registry = Arc::clone(registry);
            let handler: WakeHandler =
                Arc::new(move |payload: String| match ReleasedEvent::decode(&payload) {
                    Ok(event) => {
                        if registry.notify(&event.resource) {
                            debug!(
                                resource = %event.resource,
                                holder_id = %event.holder_id,
                                "Woke local waiters"
                            );
                        }
                    }
                    Err(e) => debug!(error = %e, "Ignoring malformed release event"),
                });
            let subscription = channel.subscribe(topic, handler).await?;
            info!(topic, "Subscribed to release notifications");
            Ok::<_, lockward_core::AppError>(subscription)
        })
        .await;

    match result {
        Ok(_) => true,
        Err(e) => {
            warn!(topic, error = %e, "Release subscription failed; polling only");
            false
        }
    }
}
