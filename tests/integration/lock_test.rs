//! Integration tests for lock acquisition, renewal, and release.

mod helpers;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use lockward::{AcquireOptions, InMemoryLockMetrics};
use lockward_core::error::{AppError, ErrorKind};
use lockward_core::types::HolderId;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mutual_exclusion_across_processes() {
    let harness = helpers::TestHarness::new();
    let counter = Arc::new(AtomicU64::new(0));
    let inside = Arc::new(AtomicBool::new(false));

    const WORKERS: u64 = 8;
    const ROUNDS: u64 = 5;

    let mut tasks = Vec::new();
    for _ in 0..WORKERS {
        let locks = harness.lock_provider();
        let counter = Arc::clone(&counter);
        let inside = Arc::clone(&inside);
        tasks.push(tokio::spawn(async move {
            for _ in 0..ROUNDS {
                let lock = locks
                    .try_acquire(
                        "counter",
                        AcquireOptions::new().acquire_timeout(Duration::from_secs(30)),
                    )
                    .await
                    .expect("acquire failed")
                    .expect("lock not acquired");

                assert!(!inside.swap(true, Ordering::SeqCst), "two holders at once");
                // Read-modify-write with a yield in between loses updates
                // unless the lock really serializes the workers.
                let value = counter.load(Ordering::SeqCst);
                tokio::task::yield_now().await;
                counter.store(value + 1, Ordering::SeqCst);
                inside.store(false, Ordering::SeqCst);

                assert!(lock.release().await.expect("release failed"));
            }
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), WORKERS * ROUNDS);
}

#[tokio::test]
async fn test_try_acquire_times_out_on_held_lock() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let contender = harness.lock_provider();

    let _held = owner
        .try_acquire("report", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let started = Instant::now();
    let result = contender
        .try_acquire(
            "report",
            AcquireOptions::new().acquire_timeout(Duration::from_millis(200)),
        )
        .await
        .unwrap();
    let elapsed = started.elapsed();

    assert!(result.is_none());
    assert!(elapsed >= Duration::from_millis(200), "returned early: {elapsed:?}");
    assert!(elapsed < Duration::from_millis(700), "returned late: {elapsed:?}");
}

#[tokio::test]
async fn test_renew_extends_ttl() {
    let harness = helpers::TestHarness::new();
    let locks = harness.lock_provider();

    let lock = locks
        .try_acquire("renewable", AcquireOptions::new().ttl(Duration::from_secs(2)))
        .await
        .unwrap()
        .unwrap();
    assert!(harness.lock_ttl("renewable").await.unwrap() <= Duration::from_secs(2));

    assert!(lock.renew(Duration::from_secs(60)).await.unwrap());
    assert!(harness.lock_ttl("renewable").await.unwrap() > Duration::from_secs(30));

    assert!(
        locks
            .renew("renewable", lock.holder_id(), Duration::from_secs(120))
            .await
            .unwrap()
    );
    lock.release().await.unwrap();
}

#[tokio::test]
async fn test_renew_after_expiry_returns_false() {
    let harness = helpers::TestHarness::new();
    let locks = harness.lock_provider();

    let lock = locks
        .try_acquire("short", AcquireOptions::new().ttl(Duration::from_millis(100)))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(250)).await;

    assert!(!lock.renew(Duration::from_secs(60)).await.unwrap());
    assert!(!locks.is_locked("short").await.unwrap());
}

#[tokio::test]
async fn test_renew_by_new_owner_is_fenced() {
    let harness = helpers::TestHarness::new();
    let first = harness.lock_provider();
    let second = harness.lock_provider();

    let stale = first
        .try_acquire("fenced", AcquireOptions::new().ttl(Duration::from_millis(100)))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let current = second
        .try_acquire("fenced", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    assert!(!stale.renew(Duration::from_secs(60)).await.unwrap());
    assert!(!stale.release().await.unwrap());
    assert!(second.is_locked("fenced").await.unwrap());
    assert!(current.release().await.unwrap());
}

#[tokio::test]
async fn test_release_twice_is_safe() {
    let harness = helpers::TestHarness::new();
    let locks = harness.lock_provider();

    let lock = locks
        .try_acquire("twice", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();
    let holder = lock.holder_id().clone();

    assert!(locks.release("twice", &holder).await.unwrap());
    assert!(!locks.release("twice", &holder).await.unwrap());
    assert!(!lock.release().await.unwrap());
    assert!(!locks.is_locked("twice").await.unwrap());
}

#[tokio::test]
async fn test_release_of_expired_lock_is_not_an_error() {
    let harness = helpers::TestHarness::new();
    let locks = harness.lock_provider();

    let lock = locks
        .try_acquire("expired", AcquireOptions::new().ttl(Duration::from_millis(50)))
        .await
        .unwrap()
        .unwrap();
    tokio::time::sleep(Duration::from_millis(150)).await;

    assert!(!lock.release().await.unwrap());
}

#[tokio::test]
async fn test_cancellation_stops_waiting() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let waiter = harness.lock_provider();

    let _held = owner
        .try_acquire("busy", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = waiter
        .try_acquire(
            "busy",
            AcquireOptions::new()
                .acquire_timeout(Duration::from_secs(30))
                .cancel(cancel),
        )
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(waiter.waits().registry().waiter_count("busy"), 0);
}

#[tokio::test]
async fn test_invoice_scenario() {
    let harness = helpers::TestHarness::new();
    let first_holder = Arc::new(AtomicBool::new(true));

    let mut workers = Vec::new();
    for _ in 0..2 {
        let locks = harness.lock_provider();
        let first_holder = Arc::clone(&first_holder);
        workers.push(tokio::spawn(async move {
            let started = Instant::now();
            let lock = locks
                .try_acquire(
                    "invoice:42",
                    AcquireOptions::new()
                        .ttl(Duration::from_secs(20 * 60))
                        .acquire_timeout(Duration::from_secs(5)),
                )
                .await
                .unwrap()
                .expect("both workers must eventually acquire");
            let waited = started.elapsed();

            if first_holder.swap(false, Ordering::SeqCst) {
                tokio::time::sleep(Duration::from_millis(300)).await;
            }
            lock.release().await.unwrap();
            waited
        }));
    }

    let mut waits = Vec::new();
    for worker in workers {
        waits.push(worker.await.unwrap());
    }
    waits.sort();

    assert!(waits[0] < Duration::from_millis(100), "first worker waited {:?}", waits[0]);
    assert!(waits[1] >= Duration::from_millis(250), "second worker did not wait: {:?}", waits[1]);
    assert!(waits[1] < Duration::from_millis(300) + Duration::from_secs(3));
}

#[tokio::test]
async fn test_competing_waiters_all_progress() {
    let harness = helpers::TestHarness::new();
    let owner = harness.lock_provider();
    let held = owner
        .try_acquire("contended", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();

    let mut waiters = Vec::new();
    for _ in 0..2 {
        let locks = harness.lock_provider();
        waiters.push(tokio::spawn(async move {
            let lock = locks
                .try_acquire(
                    "contended",
                    AcquireOptions::new().acquire_timeout(Duration::from_secs(10)),
                )
                .await
                .unwrap();
            if let Some(lock) = &lock {
                tokio::time::sleep(Duration::from_millis(20)).await;
                lock.release().await.unwrap();
            }
            lock.is_some()
        }));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;
    held.release().await.unwrap();

    for waiter in waiters {
        assert!(waiter.await.unwrap());
    }
}

#[tokio::test]
async fn test_run_exclusive_releases_for_other_processes() {
    let harness = helpers::TestHarness::new();
    let first = harness.lock_provider();
    let second = harness.lock_provider();

    let result: Result<Option<()>, AppError> = first
        .run_exclusive("job", AcquireOptions::new(), |_holder| async {
            Err(AppError::internal("job crashed"))
        })
        .await;
    assert!(result.is_err());

    let lock = second
        .try_acquire("job", AcquireOptions::new().acquire_timeout(Duration::from_millis(50)))
        .await
        .unwrap();
    assert!(lock.is_some());
}

#[tokio::test]
async fn test_run_exclusive_can_renew_inside_work() {
    let harness = helpers::TestHarness::new();
    let locks = harness.lock_provider();
    let renewer = locks.clone();

    let renewed = locks
        .run_exclusive(
            "long-job",
            AcquireOptions::new().ttl(Duration::from_secs(5)),
            |holder: HolderId| async move {
                renewer
                    .renew("long-job", &holder, Duration::from_secs(60))
                    .await
            },
        )
        .await
        .unwrap();

    assert_eq!(renewed, Some(true));
    assert!(!locks.is_locked("long-job").await.unwrap());
}

#[tokio::test]
async fn test_metrics_count_successes_and_failures() {
    let harness = helpers::TestHarness::new();
    let metrics = Arc::new(InMemoryLockMetrics::new());
    let locks = harness.lock_provider_with_metrics(Arc::clone(&metrics));

    let held = locks
        .try_acquire("metered", AcquireOptions::new())
        .await
        .unwrap()
        .unwrap();
    let missed = locks
        .try_acquire(
            "metered",
            AcquireOptions::new().acquire_timeout(Duration::from_millis(60)),
        )
        .await
        .unwrap();
    assert!(missed.is_none());
    held.release().await.unwrap();

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.waits_total, 2);
    assert_eq!(snapshot.acquired_total, 1);
    assert_eq!(snapshot.failed_total, 1);
    assert!(snapshot.wait_ms_total >= 60);
}
