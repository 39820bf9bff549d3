//! Redis lock storage.

pub mod client;
pub mod operations;
pub mod scripts;

pub use client::RedisClient;
pub use operations::RedisLockStorage;
