//! # lockward-core
//!
//! Core crate for lockward. Contains the consumed-interface traits
//! (lock storage, wake channel, id generator, metrics), configuration
//! schemas, typed values, and the unified error system.
//!
//! This crate has **no** internal dependencies on other lockward crates.

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
