// Context Key Domain Model

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identity under which an [`Exclusive`](crate::Exclusive) is shared.
///
/// Any non-empty string is a valid key (URLs with long query strings
/// included). Validation happens once, at parse time, so every registry
/// operation taking a `ContextKey` is infallible.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContextKey(String);

impl ContextKey {
    /// Parse and validate a key
    ///
    /// # Errors
    /// - `DomainError::InvalidKey` if the key is empty
    pub fn parse(key: impl Into<String>) -> Result<Self> {
        let key = key.into();

        if key.is_empty() {
            return Err(DomainError::InvalidKey("key cannot be empty".to_string()));
        }

        Ok(Self(key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContextKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ContextKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for ContextKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<&str> for ContextKey {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<String> for ContextKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ContextKey> for String {
    fn from(key: ContextKey) -> Self {
        key.0
    }
}
