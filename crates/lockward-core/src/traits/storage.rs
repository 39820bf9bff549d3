//! Lock storage trait for pluggable backends.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Result of a successful counter increment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterSlot {
    /// Count right after the increment (1-based).
    pub count: u64,
    /// Tag of the window the increment landed in.
    pub window_id: String,
}

/// Atomic key primitives backing every lock and throttle.
///
/// This is the only cross-process source of truth. Every method must be
/// atomic with respect to concurrent callers in other processes; nothing
/// in-process substitutes for it. Keys arrive already namespaced.
#[async_trait]
pub trait LockStorage: Send + Sync + std::fmt::Debug + 'static {
    /// Create `key = holder` with `ttl` only if `key` is absent.
    ///
    /// Returns `true` if the record was created.
    async fn insert_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool>;

    /// Replace the value of `key` with `new_holder` and reset its TTL, only
    /// if the current value equals `expected`.
    ///
    /// Renewal passes the same id as `expected` and `new_holder`.
    async fn replace_if_holder(
        &self,
        key: &str,
        expected: &str,
        new_holder: &str,
        new_ttl: Duration,
    ) -> AppResult<bool>;

    /// Delete `key` only if its current value equals `expected`.
    ///
    /// Returns `false` when the key is absent or held by another id.
    async fn remove_if_holder(&self, key: &str, expected: &str) -> AppResult<bool>;

    /// Remaining TTL of `key`, or `None` if absent or without expiry.
    async fn get_ttl(&self, key: &str) -> AppResult<Option<Duration>>;

    /// Whether `key` currently exists.
    async fn exists(&self, key: &str) -> AppResult<bool>;

    /// Increment the counter at `key` if it is below `limit`.
    ///
    /// The first increment of a window sets the key's expiry to `window` and
    /// tags the window with `window_id`; later increments keep the existing
    /// tag. Returns the new count and the tag of the window it landed in, or
    /// `None` when the limit is already reached.
    async fn try_increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        window_id: &str,
    ) -> AppResult<Option<CounterSlot>>;

    /// Decrement the counter at `key` if its current window is tagged
    /// `window_id`. The key is deleted when the count reaches zero.
    ///
    /// Returns the remaining count, or `None` when the window has ended or
    /// another window replaced it; the counter is left untouched then.
    async fn decrement(&self, key: &str, window_id: &str) -> AppResult<Option<u64>>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}
