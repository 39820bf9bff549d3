//! In-memory lock storage.

pub mod store;

pub use store::MemoryLockStorage;
