//! Throttling configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Defaults for the throttling provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThrottleConfig {
    /// Concurrent slots allowed per resource within one window.
    #[serde(default = "default_limit")]
    pub default_limit: u64,
    /// Length of the counting window in seconds.
    #[serde(default = "default_window_seconds")]
    pub window_seconds: u64,
    /// How long `try_acquire` keeps retrying when the caller does not say.
    #[serde(default = "default_acquire_timeout_ms")]
    pub acquire_timeout_ms: u64,
    /// Wake channel topic carrying slot release events.
    #[serde(default = "default_release_topic")]
    pub release_topic: String,
}

impl ThrottleConfig {
    /// Default counting window.
    pub fn window(&self) -> Duration {
        Duration::from_secs(self.window_seconds)
    }

    /// Default acquisition timeout.
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            default_limit: default_limit(),
            window_seconds: default_window_seconds(),
            acquire_timeout_ms: default_acquire_timeout_ms(),
            release_topic: default_release_topic(),
        }
    }
}

fn default_limit() -> u64 {
    10
}

fn default_window_seconds() -> u64 {
    60
}

fn default_acquire_timeout_ms() -> u64 {
    30_000
}

fn default_release_topic() -> String {
    "lockward:throttle:released".to_string()
}
