//! # lockward-channel
//!
//! Wake channel backends for lockward. A wake channel only shortens the
//! time a waiter sleeps after a release; every backend here may drop
//! messages without affecting lock correctness.
//!
//! - **memory**: in-process `tokio::sync::broadcast` topics
//! - **redis**: Redis pub/sub for multi-node deployments
//! - **none**: a channel that never delivers, leaving waiters to poll

pub mod manager;
pub mod memory;
pub mod null;
#[cfg(feature = "redis-pubsub")]
pub mod redis;

pub use manager::ChannelManager;
pub use memory::MemoryWakeChannel;
pub use null::NullWakeChannel;
