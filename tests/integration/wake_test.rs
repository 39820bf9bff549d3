//! Integration tests for release wake-ups and the bounded poll fallback.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use lockward::{AcquireOptions, ResourceLockProvider};
use lockward_core::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::channel::{Subscription, WakeChannel, WakeHandler};

/// Wake channel that hangs on subscribe for a long time and then fails,
/// like a pub/sub connection to an unreachable host.
#[derive(Debug, Default)]
struct UnreachableChannel {
    subscribe_calls: AtomicUsize,
}

#[async_trait]
impl WakeChannel for UnreachableChannel {
    async fn publish(&self, _topic: &str, _message: &str) -> AppResult<()> {
        Err(AppError::storage("wake channel unreachable"))
    }

    async fn subscribe(&self, _topic: &str, _handler: WakeHandler) -> AppResult<Subscription> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(5)).await;
        Err(AppError::storage("wake channel unreachable"))
    }
}

fn long_lived() -> AcquireOptions {
    // A long TTL pushes the poll delay to its 3 s ceiling.
    AcquireOptions::new().ttl(Duration::from_secs(600))
}

async fn acquire_after_release(
    owner: &ResourceLockProvider,
    waiter: ResourceLockProvider,
    release_after: Duration,
) -> Duration {
    let held = owner
        .try_acquire("shared", long_lived())
        .await
        .unwrap()
        .unwrap();

    let task = tokio::spawn(async move {
        let started = Instant::now();
        let lock = waiter
            .try_acquire(
                "shared",
                long_lived().acquire_timeout(Duration::from_secs(10)),
            )
            .await
            .unwrap()
            .expect("waiter never acquired");
        let waited = started.elapsed();
        lock.release().await.unwrap();
        waited
    });

    tokio::time::sleep(release_after).await;
    held.release().await.unwrap();
    task.await.unwrap()
}

#[tokio::test]
async fn test_wakeup_beats_poll_ceiling() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let waited = acquire_after_release(&owner, waiter, Duration::from_millis(300)).await;

    assert!(waited >= Duration::from_millis(250));
    assert!(
        waited < Duration::from_millis(1_500),
        "wake-up did not shorten the wait: {waited:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn test_lost_wakeups_fall_back_to_bounded_poll() {
    let harness = helpers::TestHarness::without_wakeups();
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let waited = acquire_after_release(&owner, waiter, Duration::from_millis(300)).await;

    // Without release events the waiter sleeps the full 3 s ceiling once.
    assert!(waited >= Duration::from_secs(3), "woke too early: {waited:?}");
    assert!(waited < Duration::from_millis(3_500), "poll ceiling exceeded: {waited:?}");
}

#[tokio::test]
async fn test_correct_without_wake_channel() {
    let harness = helpers::TestHarness::without_wakeups()
        .wait_bounds(Duration::from_millis(10), Duration::from_millis(100));
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let waited = acquire_after_release(&owner, waiter, Duration::from_millis(200)).await;

    assert!(waited >= Duration::from_millis(150));
    assert!(waited < Duration::from_secs(1));
}

#[tokio::test]
async fn test_local_waiters_share_one_registry_entry() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let local = harness.lock_provider();

    let held = owner
        .try_acquire("hot", long_lived())
        .await
        .unwrap()
        .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..3 {
        let local = local.clone();
        tasks.push(tokio::spawn(async move {
            let lock = local
                .try_acquire("hot", long_lived().acquire_timeout(Duration::from_secs(10)))
                .await
                .unwrap()
                .expect("local waiter never acquired");
            lock.release().await.unwrap();
        }));
    }

    let started = Instant::now();
    while local.waits().registry().waiter_count("hot") < 3 {
        assert!(started.elapsed() < Duration::from_secs(2), "waiters never registered");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(local.waits().registry().len(), 1);
    assert!(owner.waits().registry().is_empty());

    held.release().await.unwrap();
    for task in tasks {
        task.await.unwrap();
    }
    assert!(local.waits().registry().is_empty());
}

#[tokio::test]
async fn test_subscription_is_lazy_and_single() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let held = owner
        .try_acquire("lazy", long_lived())
        .await
        .unwrap()
        .unwrap();
    assert!(!owner.waits().is_subscribed());

    let missed = waiter
        .try_acquire("lazy", AcquireOptions::new().acquire_timeout(Duration::from_millis(100)))
        .await
        .unwrap();
    assert!(missed.is_none());
    assert!(waiter.waits().is_subscribed());
    assert!(!owner.waits().is_subscribed());

    held.release().await.unwrap();
}

#[tokio::test]
async fn test_malformed_release_events_are_ignored() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();
    let channel: Arc<dyn WakeChannel> = Arc::clone(&harness.channel);
    let topic = waiter.config().release_topic.clone();

    let held = owner
        .try_acquire("noisy", long_lived())
        .await
        .unwrap()
        .unwrap();

    let task = tokio::spawn(async move {
        waiter
            .try_acquire("noisy", long_lived().acquire_timeout(Duration::from_secs(10)))
            .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;
    channel.publish(&topic, "not json").await.unwrap();
    channel
        .publish(&topic, r#"{"resource":"other","holder_id":"1"}"#)
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!task.is_finished());

    held.release().await.unwrap();
    let lock = task.await.unwrap().unwrap();
    assert!(lock.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_channel_keeps_acquire_timeout() {
    let channel = Arc::new(UnreachableChannel::default());
    let harness = helpers::TestHarness::with_channel(channel.clone());
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let held = owner
        .try_acquire("r", long_lived())
        .await
        .unwrap()
        .unwrap();

    for _ in 0..3 {
        let started = Instant::now();
        let missed = waiter
            .try_acquire("r", AcquireOptions::new().acquire_timeout(Duration::from_millis(200)))
            .await
            .unwrap();
        let elapsed = started.elapsed();

        assert!(missed.is_none());
        assert!(elapsed >= Duration::from_millis(200), "returned early: {elapsed:?}");
        assert!(elapsed < Duration::from_secs(1), "returned late: {elapsed:?}");
    }
    // One stalled attempt at a time; later waits do not stack up more.
    assert_eq!(channel.subscribe_calls.load(Ordering::SeqCst), 1);

    held.release().await.unwrap();
    let lock = waiter
        .try_acquire("r", AcquireOptions::new().acquire_timeout(Duration::from_millis(200)))
        .await
        .unwrap();
    assert!(lock.is_some());
}
