//! # lockward-storage
//!
//! Lock storage backends for lockward. Supports two modes:
//!
//! - **memory**: In-process records on [dashmap](https://crates.io/crates/dashmap),
//!   for single-process deployments and tests
//! - **redis**: Redis-backed records using the [redis](https://crates.io/crates/redis)
//!   crate, with Lua scripts for compare-and-swap semantics
//!
//! The backend is selected at runtime based on configuration.

pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod provider;
#[cfg(feature = "redis-backend")]
pub mod redis;

pub use provider::StorageManager;
