//! Redis lock storage implementation.

use std::time::Duration;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use lockward_core::error::{AppError, ErrorKind};
use lockward_core::result::AppResult;
use lockward_core::traits::storage::{CounterSlot, LockStorage};

use super::client::RedisClient;
use super::scripts::LockScripts;

/// Redis-backed lock storage.
///
/// Lock records are plain string keys holding the holder id with a `PX`
/// expiry; throttle counters are hashes of count and window tag with a
/// window expiry.
#[derive(Debug, Clone)]
pub struct RedisLockStorage {
    /// Redis client.
    client: RedisClient,
    /// Compare-and-swap scripts.
    scripts: LockScripts,
}

impl RedisLockStorage {
    /// Create storage over a connected client.
    pub fn new(client: RedisClient) -> Self {
        Self {
            client,
            scripts: LockScripts::new(),
        }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::with_source(ErrorKind::Storage, format!("Redis error: {e}"), e)
    }
}

/// Redis rejects a zero `PX`; round sub-millisecond TTLs up.
fn millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[async_trait]
impl LockStorage for RedisLockStorage {
    async fn insert_if_absent(&self, key: &str, holder: &str, ttl: Duration) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        // SET key holder PX ttl NX
        let result: Option<String> = redis::cmd("SET")
            .arg(&full_key)
            .arg(holder)
            .arg("PX")
            .arg(millis(ttl))
            .arg("NX")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(result.is_some())
    }

    async fn replace_if_holder(
        &self,
        key: &str,
        expected: &str,
        new_holder: &str,
        new_ttl: Duration,
    ) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        let replaced: i64 = self
            .scripts
            .replace_if_holder
            .key(&full_key)
            .arg(expected)
            .arg(new_holder)
            .arg(millis(new_ttl))
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(replaced == 1)
    }

    async fn remove_if_holder(&self, key: &str, expected: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        let removed: i64 = self
            .scripts
            .remove_if_holder
            .key(&full_key)
            .arg(expected)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if removed == 0 {
            debug!(key = %full_key, "Lock record already gone or held by another id");
        }
        Ok(removed == 1)
    }

    async fn get_ttl(&self, key: &str) -> AppResult<Option<Duration>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        // -2 = missing, -1 = no expiry
        let ttl_ms: i64 = redis::cmd("PTTL")
            .arg(&full_key)
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(u64::try_from(ttl_ms).ok().map(Duration::from_millis))
    }

    async fn exists(&self, key: &str) -> AppResult<bool> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();
        let result: bool = conn.exists(&full_key).await.map_err(Self::map_err)?;
        Ok(result)
    }

    async fn try_increment(
        &self,
        key: &str,
        limit: u64,
        window: Duration,
        window_id: &str,
    ) -> AppResult<Option<CounterSlot>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        let (count, window_id): (i64, String) = self
            .scripts
            .try_increment
            .key(&full_key)
            .arg(limit)
            .arg(millis(window))
            .arg(window_id)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Ok(u64::try_from(count)
            .ok()
            .map(|count| CounterSlot { count, window_id }))
    }

    async fn decrement(&self, key: &str, window_id: &str) -> AppResult<Option<u64>> {
        let full_key = self.client.prefixed_key(key);
        let mut conn = self.client.conn();

        let remaining: i64 = self
            .scripts
            .decrement
            .key(&full_key)
            .arg(window_id)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if remaining < 0 {
            debug!(key = %full_key, window_id, "Counter window already rolled over");
        }
        Ok(u64::try_from(remaining).ok())
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_rounds_up_to_one() {
        assert_eq!(millis(Duration::from_micros(10)), 1);
        assert_eq!(millis(Duration::from_secs(2)), 2_000);
    }
}
