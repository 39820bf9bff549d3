//! Shared value types.

pub mod event;
pub mod holder;
pub mod resource;

pub use event::ReleasedEvent;
pub use holder::HolderId;
pub use resource::ResourceKey;
