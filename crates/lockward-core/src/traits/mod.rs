//! Traits defined in `lockward-core` and implemented by other crates.

pub mod channel;
pub mod id;
pub mod metrics;
pub mod storage;

pub use channel::{Subscription, WakeChannel, WakeHandler};
pub use id::IdGenerator;
pub use metrics::{LockMetrics, NoopLockMetrics};
pub use storage::{CounterSlot, LockStorage};
