//! In-memory lock storage using dashmap.
//!
//! Each operation runs under the shard lock of its key through the dashmap
//! entry API, which makes every primitive atomic within the process. Only
//! useful when every lock participant shares this process (tests, single
//! node deployments).

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::debug;

use lockward_core::error::AppError;
use lockward_core::result::AppResult;
use lockward_core::traits::storage::{CounterSlot, LockStorage};

/// What a key currently stores.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordValue {
    /// Lock record owned by a holder id.
    Holder(String),
    /// Throttle counter tagged with the window it counts.
    Counter { count: u64, window_id: String },
}

#[derive(Debug, Clone)]
struct Record {
    value: RecordValue,
    expires_at: Option<Instant>,
}

impl Record {
    fn holder(holder: &str, ttl: Duration) -> Self {
        Self {
            value: RecordValue::Holder(holder.to_string()),
            expires_at: Some(Instant::now() + ttl),
        }
    }

    fn counter(window_id: &str, window: Duration) -> Self {
        Self {
            value: RecordValue::Counter {
                count: 1,
                window_id: window_id.to_string(),
            },
            expires_at: Some(Instant::now() + window),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }

    fn is_held_by(&self, holder: &str) -> bool {
        matches!(&self.value, RecordValue::Holder(h) if h == holder)
    }
}

/// In-memory lock storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryLockStorage {
    /// Key → record. Expired records are treated as absent and removed
    /// lazily or by the sweeper.
    records: Arc<DashMap<String, Record>>,
}

impl MemoryLockStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove every expired record. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        purge(&self.records)
    }

    /// Number of records, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store holds no records at all.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Spawn a background task purging expired records every `interval`.
    ///
    /// The task stops on its own once every clone of this store is dropped.
    pub fn spawn_sweeper(&self, interval: Duration) -> JoinHandle<()> {
        let records: Weak<DashMap<String, Record>> = Arc::downgrade(&self.records);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                let Some(records) = records.upgrade() else {
                    break;
                };
                let removed = purge(&records);
                if removed > 0 {
                    debug!(count = removed, "Purged expired lock records");
                }
            }
        })
    }
}

fn purge(records: &DashMap<String, Record>) -> usize {
    let now = Instant::now();
    let before = records.len();
    records.retain(|_, record| !record.is_expired(now));
    before.saturating_sub(records.len())
}

#[async_trait]
impl LockStorage for MemoryLockStorage {
    async fn insert_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool> {
        let now = Instant::now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.insert(Record::holder(holder, ttl));
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Record::holder(holder, ttl));
                Ok(true)
            }
        }
    }

    async fn replace_if_holder(
        &self,
        key: &str,
        expected: &str,
        new_holder: &str,
        new_ttl: Duration,
    ) -> AppResult<bool> {
        let now = Instant::now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.remove();
                    return Ok(false);
                }
                if !entry.get().is_held_by(expected) {
                    return Ok(false);
                }
                entry.insert(Record::holder(new_holder, new_ttl));
                Ok(true)
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn remove_if_holder(&self, key: &str, expected: &str) -> AppResult<bool> {
        let now = Instant::now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(entry) => {
                if entry.get().is_expired(now) {
                    entry.remove();
                    Ok(false)
                } else if entry.get().is_held_by(expected) {
                    entry.remove();
                    Ok(true)
                } else {
                    Ok(false)
                }
            }
            Entry::Vacant(_) => Ok(false),
        }
    }

    async fn get_ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let now = Instant::now();
        Ok(self.records.get(key).and_then(|record| {
            record
                .expires_at
                .filter(|at| *at > now)
                .map(|at| at.saturating_duration_since(now))
        }))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let now = Instant::now();
        Ok(self
            .records
            .get(key)
            .is_some_and(|record| !record.is_expired(now)))
    }

    async fn try_increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        window_id: &str,
    ) -> AppResult<Option<CounterSlot>> {
        let now = Instant::now();
        let fresh = || CounterSlot {
            count: 1,
            window_id: window_id.to_string(),
        };
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.insert(Record::counter(window_id, window));
                    return Ok(Some(fresh()));
                }
                match &mut entry.get_mut().value {
                    RecordValue::Counter { count, .. } if *count >= limit => Ok(None),
                    RecordValue::Counter { count, window_id } => {
                        *count += 1;
                        Ok(Some(CounterSlot {
                            count: *count,
                            window_id: window_id.clone(),
                        }))
                    }
                    RecordValue::Holder(_) => Err(AppError::storage(format!(
                        "key '{key}' holds a lock record, not a counter"
                    ))),
                }
            }
            Entry::Vacant(entry) => {
                entry.insert(Record::counter(window_id, window));
                Ok(Some(fresh()))
            }
        }
    }

    async fn decrement(&self, key: &str, window_id: &str) -> AppResult<Option<u64>> {
        let now = Instant::now();
        match self.records.entry(key.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_expired(now) {
                    entry.remove();
                    return Ok(None);
                }
                let remaining = match &mut entry.get_mut().value {
                    RecordValue::Counter {
                        count,
                        window_id: current,
                    } => {
                        if current.as_str() != window_id {
                            return Ok(None);
                        }
                        *count = count.saturating_sub(1);
                        *count
                    }
                    RecordValue::Holder(_) => {
                        return Err(AppError::storage(format!(
                            "key '{key}' holds a lock record, not a counter"
                        )));
                    }
                };
                if remaining == 0 {
                    entry.remove();
                }
                Ok(Some(remaining))
            }
            Entry::Vacant(_) => Ok(None),
        }
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
