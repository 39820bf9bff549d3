//! Validated resource keys.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Longest resource key accepted, in bytes.
pub const MAX_RESOURCE_KEY_LEN: usize = 512;

/// Opaque string naming the resource a lock protects, e.g. `"invoice:42"`.
///
/// Resource keys are namespaced by the provider before reaching storage.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResourceKey(String);

impl ResourceKey {
    /// Validate and wrap a resource key.
    pub fn parse(value: impl Into<String>) -> Result<Self, AppError> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(AppError::validation("resource key must not be empty"));
        }
        if value.len() > MAX_RESOURCE_KEY_LEN {
            return Err(AppError::validation(format!(
                "resource key is {} bytes, limit is {MAX_RESOURCE_KEY_LEN}",
                value.len()
            )));
        }
        if value.chars().any(char::is_control) {
            return Err(AppError::validation(
                "resource key must not contain control characters",
            ));
        }
        Ok(Self(value))
    }

    /// Borrow the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ResourceKey {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<ResourceKey> for String {
    fn from(key: ResourceKey) -> Self {
        key.0
    }
}

impl AsRef<str> for ResourceKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
