//! Lock provider, retry, and holder-id configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Largest node id that fits the 10-bit node field of a holder id.
pub const MAX_NODE_ID: u16 = 1023;

/// Lock acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Namespace prepended to every resource key before it reaches storage.
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Lock record TTL used when the caller does not pass one.
    #[serde(default = "default_ttl_seconds")]
    pub default_ttl_seconds: u64,
    /// How long `try_acquire` keeps retrying when the caller does not say.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Lower bound of a single wait between attempts.
    #[serde(default = "default_min_wait_ms")]
    pub min_wait_ms: u64,
    /// Upper bound of a single wait between attempts.
    #[serde(default = "default_max_wait_ms")]
    pub max_wait_ms: u64,
    /// Waits longer than this are logged at `warn`.
    #[serde(default = "default_slow_wait_warning_ms")]
    pub slow_wait_warning_ms: u64,
    /// Wake channel topic carrying lock release events.
    #[serde(default = "default_release_topic")]
    pub release_topic: String,
}

impl LockConfig {
    /// Default lock record TTL.
    pub fn default_ttl(&self) -> Duration {
        Duration::from_secs(self.default_ttl_seconds)
    }

    /// Default acquisition timeout.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }

    /// Bounds applied to every wait between attempts.
    pub fn wait_bounds(&self) -> (Duration, Duration) {
        (
            Duration::from_millis(self.min_wait_ms),
            Duration::from_millis(self.max_wait_ms),
        )
    }

    /// Threshold above which a wait is reported as slow.
    pub fn slow_wait_warning(&self) -> Duration {
        Duration::from_millis(self.slow_wait_warning_ms)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            default_ttl_seconds: default_ttl_seconds(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            min_wait_ms: default_min_wait_ms(),
            max_wait_ms: default_max_wait_ms(),
            slow_wait_warning_ms: default_slow_wait_warning_ms(),
            release_topic: default_release_topic(),
        }
    }
}

/// Bounded retry policy for release, renew, and status calls.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per attempt.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Cap on the delay between attempts.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

/// Holder id generator configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdConfig {
    /// Node id embedded in every generated holder id (0..=1023).
    ///
    /// Processes sharing one storage backend must use distinct node ids.
    #[serde(default)]
    pub node_id: u16,
}

fn default_namespace() -> String {
    "lockward".to_string()
}

fn default_ttl_seconds() -> u64 {
    20 * 60
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

fn default_min_wait_ms() -> u64 {
    50
}

fn default_max_wait_ms() -> u64 {
    3_000
}

fn default_slow_wait_warning_ms() -> u64 {
    5_000
}

fn default_release_topic() -> String {
    "lockward:lock:released".to_string()
}

fn default_max_attempts() -> u32 {
    15
}

fn default_base_delay_ms() -> u64 {
    10
}

fn default_max_delay_ms() -> u64 {
    250
}
