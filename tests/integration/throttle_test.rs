//! Integration tests for the throttling provider.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use lockward::ThrottleOptions;
use lockward_core::error::ErrorKind;

fn quick() -> ThrottleOptions {
    ThrottleOptions::new().acquire_timeout(Duration::from_millis(100))
}

#[tokio::test]
async fn test_limit_enforced_across_processes() {
    let harness = helpers::TestHarness::new().throttle(3, Duration::from_secs(60));

    let mut slots = Vec::new();
    for _ in 0..3 {
        let throttles = harness.throttling_provider();
        slots.push(throttles.try_acquire("export", quick()).await.unwrap().unwrap());
    }
    let mut taken: Vec<u64> = slots.iter().map(|slot| slot.slot()).collect();
    taken.sort();
    assert_eq!(taken, vec![1, 2, 3]);

    let latecomer = harness.throttling_provider();
    assert!(latecomer.try_acquire("export", quick()).await.unwrap().is_none());

    for slot in &slots {
        slot.release().await.unwrap();
    }
    assert!(latecomer.try_acquire("export", quick()).await.unwrap().is_some());
}

#[tokio::test]
async fn test_release_wakes_waiting_process() {
    let harness = helpers::TestHarness::new().throttle(1, Duration::from_secs(600));
    let owner = harness.throttling_provider();
    let waiter = harness.throttling_provider();

    let slot = owner.try_acquire("gpu", quick()).await.unwrap().unwrap();

    let task = tokio::spawn(async move {
        let started = Instant::now();
        let slot = waiter
            .try_acquire("gpu", ThrottleOptions::new().acquire_timeout(Duration::from_secs(10)))
            .await
            .unwrap()
            .expect("waiter never got a slot");
        let waited = started.elapsed();
        slot.release().await.unwrap();
        waited
    });

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(slot.release().await.unwrap(), Some(0));

    let waited = task.await.unwrap();
    assert!(waited >= Duration::from_millis(250));
    assert!(waited < Duration::from_millis(1_500), "wake-up missed: {waited:?}");
}

#[tokio::test(start_paused = true)]
async fn test_window_expiry_frees_forgotten_slots() {
    let harness = helpers::TestHarness::without_wakeups().throttle(1, Duration::from_secs(1));
    let owner = harness.throttling_provider();
    let waiter = harness.throttling_provider();

    let forgotten = owner.try_acquire("batch", quick()).await.unwrap().unwrap();
    std::mem::forget(forgotten);

    let started = Instant::now();
    let slot = waiter
        .try_acquire("batch", ThrottleOptions::new().acquire_timeout(Duration::from_secs(3)))
        .await
        .unwrap()
        .expect("window never expired");

    assert_eq!(slot.slot(), 1);
    assert!(started.elapsed() >= Duration::from_secs(1));
    assert!(started.elapsed() < Duration::from_millis(2_500));
    slot.release().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_late_release_does_not_free_next_window() {
    let harness = helpers::TestHarness::without_wakeups().throttle(1, Duration::from_secs(1));
    let first = harness.throttling_provider();
    let second = harness.throttling_provider();
    let third = harness.throttling_provider();

    let stale = first.try_acquire("report", quick()).await.unwrap().unwrap();
    tokio::time::advance(Duration::from_millis(1_500)).await;
    let current = second.try_acquire("report", quick()).await.unwrap().unwrap();

    stale.release().await.unwrap();
    assert!(!current.is_released());
    assert!(third.try_acquire("report", quick()).await.unwrap().is_none());

    current.release().await.unwrap();
    assert!(third.try_acquire("report", quick()).await.unwrap().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrency_never_exceeds_limit() {
    let harness = helpers::TestHarness::new().throttle(2, Duration::from_secs(60));
    let in_flight = Arc::new(AtomicU64::new(0));
    let peak = Arc::new(AtomicU64::new(0));

    let workers = (0..6).map(|_| {
        let throttles = harness.throttling_provider();
        let in_flight = Arc::clone(&in_flight);
        let peak = Arc::clone(&peak);
        tokio::spawn(async move {
            let slot = throttles
                .try_acquire(
                    "db",
                    ThrottleOptions::new().acquire_timeout(Duration::from_secs(30)),
                )
                .await
                .unwrap()
                .expect("worker never got a slot");

            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);

            slot.release().await.unwrap();
        })
    });

    for result in futures::future::join_all(workers).await {
        result.unwrap();
    }
    assert!(peak.load(Ordering::SeqCst) <= 2);
    assert_eq!(in_flight.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_cancelled_throttle_wait() {
    let harness = helpers::TestHarness::new().throttle(1, Duration::from_secs(60));
    let owner = harness.throttling_provider();
    let waiter = harness.throttling_provider();
    let _slot = owner.try_acquire("api", quick()).await.unwrap().unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let err = waiter
        .try_acquire(
            "api",
            ThrottleOptions::new()
                .acquire_timeout(Duration::from_secs(30))
                .cancel(cancel),
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Cancelled);
}

#[tokio::test]
async fn test_locks_and_throttles_do_not_collide() {
    let harness = helpers::TestHarness::new().throttle(1, Duration::from_secs(60));
    let locks = harness.lock_provider();
    let throttles = harness.throttling_provider();

    let lock = locks
        .try_acquire("shared-name", lockward::AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();
    let slot = throttles
        .try_acquire("shared-name", quick())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(slot.slot(), 1);
    slot.release().await.unwrap();
    lock.release().await.unwrap();
}
