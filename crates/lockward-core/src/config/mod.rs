//! Configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from a
//! TOML file, an optional environment overlay, and `LOCKWARD__*`
//! environment variables. Every field has a default so an empty file is a
//! valid configuration.

pub mod channel;
pub mod lock;
pub mod logging;
pub mod storage;
pub mod throttle;

use serde::{Deserialize, Serialize};

use self::channel::ChannelConfig;
use self::lock::{IdConfig, LockConfig, RetryConfig};
use self::logging::LoggingConfig;
use self::storage::StorageConfig;
use self::throttle::ThrottleConfig;

use crate::error::AppError;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LockwardConfig {
    /// Lock acquisition settings.
    #[serde(default)]
    pub lock: LockConfig,
    /// Bounded retry settings for release/renew/status.
    #[serde(default)]
    pub retry: RetryConfig,
    /// Throttling settings.
    #[serde(default)]
    pub throttle: ThrottleConfig,
    /// Lock storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Wake channel backend settings.
    #[serde(default)]
    pub channel: ChannelConfig,
    /// Holder id generation settings.
    #[serde(default)]
    pub id: IdConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LockwardConfig {
    /// Load configuration from a TOML file.
    ///
    /// When `env` is given, `config/{env}.toml` is merged on top. Environment
    /// variables prefixed with `LOCKWARD__` override both.
    pub fn load(path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let mut builder =
            config::Config::builder().add_source(config::File::with_name(path).required(false));

        if let Some(env) = env {
            builder = builder
                .add_source(config::File::with_name(&format!("config/{env}")).required(false));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix("LOCKWARD")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let parsed: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        parsed.validate()?;
        Ok(parsed)
    }

    /// Reject combinations the lock provider cannot work with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.lock.namespace.trim().is_empty() {
            return Err(AppError::configuration("lock.namespace must not be empty"));
        }
        if self.lock.default_ttl_seconds == 0 {
            return Err(AppError::configuration(
                "lock.default_ttl_seconds must be greater than zero",
            ));
        }
        if self.lock.min_wait_ms == 0 || self.lock.min_wait_ms > self.lock.max_wait_ms {
            return Err(AppError::configuration(format!(
                "lock.min_wait_ms ({}) must be in 1..=lock.max_wait_ms ({})",
                self.lock.min_wait_ms, self.lock.max_wait_ms
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(AppError::configuration(
                "retry.max_attempts must be at least 1",
            ));
        }
        if self.throttle.default_limit == 0 {
            return Err(AppError::configuration(
                "throttle.default_limit must be at least 1",
            ));
        }
        if self.throttle.window_seconds == 0 {
            return Err(AppError::configuration(
                "throttle.window_seconds must be greater than zero",
            ));
        }
        if self.id.node_id > lock::MAX_NODE_ID {
            return Err(AppError::configuration(format!(
                "id.node_id must be at most {}",
                lock::MAX_NODE_ID
            )));
        }
        Ok(())
    }
}
