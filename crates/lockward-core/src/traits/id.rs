//! Unique id generator trait.

/// Source of holder ids.
///
/// Values must be unique across every process sharing a storage backend for
/// the lifetime of the deployment.
pub trait IdGenerator: Send + Sync + std::fmt::Debug + 'static {
    /// Produce the next id.
    fn next_id(&self) -> i64;
}
