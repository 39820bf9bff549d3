//! Wake channel payloads.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Published whenever a lock or throttle slot on `resource` is released.
///
/// Carries the releasing holder id for diagnostics only; receivers wake
/// every local waiter on `resource` regardless of who released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasedEvent {
    /// Resource key as passed by the caller (not namespaced).
    pub resource: String,
    /// Holder id of the releasing party.
    pub holder_id: String,
}

impl ReleasedEvent {
    /// Build an event for a release.
    pub fn new(resource: impl Into<String>, holder_id: impl Into<String>) -> Self {
        Self {
            resource: resource.into(),
            holder_id: holder_id.into(),
        }
    }

    /// Encode as the JSON string sent over the wake channel.
    pub fn encode(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a JSON payload received from the wake channel.
    pub fn decode(payload: &str) -> Result<Self, AppError> {
        Ok(serde_json::from_str(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_wire_shape() {
        let event = ReleasedEvent::new("invoice:42", "17");
        assert_eq!(
            event.encode().unwrap(),
            r#"{"resource":"invoice:42","holder_id":"17"}"#
        );
    }

    #[test]
    fn test_malformed_payload() {
        let err = ReleasedEvent::decode("not json").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Serialization);
    }
}
