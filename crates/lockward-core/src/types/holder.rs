//! Lock holder identifiers.
//!
//! A holder id is the value written under a resource key while the lock is
//! held. It doubles as a fencing token: storage only renews or removes a
//! record whose current value matches the caller's holder id.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fencing token proving ownership of a lock record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HolderId(String);

impl HolderId {
    /// Wrap an existing holder id string (e.g. one read back from a CLI flag).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the id as the string stored in the backend.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the id and return the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

impl From<i64> for HolderId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for HolderId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for HolderId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl AsRef<str> for HolderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
