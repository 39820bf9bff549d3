//! Wake channel backend configuration.

use serde::{Deserialize, Serialize};

/// Top-level wake channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Channel provider type: `"memory"`, `"redis"`, or `"none"`.
    #[serde(default = "default_provider")]
    pub provider: String,
    /// Redis pub/sub configuration.
    #[serde(default)]
    pub redis: RedisChannelConfig,
    /// In-process broadcast configuration.
    #[serde(default)]
    pub memory: MemoryChannelConfig,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            redis: RedisChannelConfig::default(),
            memory: MemoryChannelConfig::default(),
        }
    }
}

/// Redis pub/sub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisChannelConfig {
    /// Redis connection URL.
    #[serde(default = "default_redis_url")]
    pub url: String,
}

impl Default for RedisChannelConfig {
    fn default() -> Self {
        Self {
            url: default_redis_url(),
        }
    }
}

/// In-process broadcast configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryChannelConfig {
    /// Messages buffered per topic before slow subscribers start lagging.
    #[serde(default = "default_buffer_size")]
    pub buffer_size: usize,
}

impl Default for MemoryChannelConfig {
    fn default() -> Self {
        Self {
            buffer_size: default_buffer_size(),
        }
    }
}

fn default_provider() -> String {
    "memory".to_string()
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_buffer_size() -> usize {
    256
}
