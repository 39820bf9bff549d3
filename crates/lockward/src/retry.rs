//! Bounded retries for release, renew, and status calls.
//!
//! These paths are expected to be reliable, so a transient storage error is
//! retried a fixed number of times with capped exponential backoff, and the
//! last error surfaces once attempts run out.

use std::future::Future;
use std::time::Duration;

use tracing::{error, warn};

use lockward_core::config::lock::RetryConfig;
use lockward_core::result::AppResult;

/// Retry policy derived from [`RetryConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub base_delay: Duration,
    /// Cap on the delay between attempts.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Delay after the given (1-based) failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retries<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> AppResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = AppResult<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= policy.max_attempts => {
                error!(operation, attempts = attempt, error = %e, "Retries exhausted");
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    error = %e,
                    "Retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use lockward_core::AppError;
    use lockward_core::error::ErrorKind;

    use super::*;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(40),
        }
    }

    #[test]
    fn test_backoff_is_capped() {
        let p = policy(15);
        assert_eq!(p.delay_after(1), Duration::from_millis(10));
        assert_eq!(p.delay_after(2), Duration::from_millis(20));
        assert_eq!(p.delay_after(3), Duration::from_millis(40));
        assert_eq!(p.delay_after(14), Duration::from_millis(40));
    }

    #[test]
    fn test_default_policy_allows_fifteen_attempts() {
        assert_eq!(RetryPolicy::default().max_attempts, 15);
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retries(&policy(5), "test", || async {
            if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(AppError::storage("timeout"))
            } else {
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_retries(&policy(4), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::storage("down"))
        })
        .await;
        assert_eq!(result.unwrap_err().kind, ErrorKind::Storage);
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_validation_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: AppResult<()> = with_retries(&policy(10), "test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(AppError::validation("bad key"))
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
