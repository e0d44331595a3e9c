//! Type-safe identifiers.
//!
//! Newtype wrappers keep subject identities and connection ids from being
//! mixed up with arbitrary strings.
//!
//! | Type | Wraps | Meaning |
//! |------|-------|---------|
//! | [`SubjectId`] | `String` | Principal the push connection represents |
//! | [`ConnectionId`] | `Uuid` | One transport client instance |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

// ============================================================================
// SubjectId
// ============================================================================

/// Opaque identity of the principal a push connection is scoped to.
///
/// Never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SubjectId(String);

impl SubjectId {
    /// Creates a subject identity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArgument`] if `value` is empty or whitespace.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::invalid_argument("subject identity must not be empty"));
        }
        Ok(Self(value))
    }

    /// Returns the identity as a string slice.
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for SubjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for SubjectId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<SubjectId> for String {
    fn from(id: SubjectId) -> Self {
        id.0
    }
}

impl AsRef<str> for SubjectId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// ConnectionId
// ============================================================================

/// Identifier of one transport client instance.
///
/// A fresh id is generated every time the provider builds a new client,
/// so log lines from an old and a new connection can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generates a new random connection id.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_rejects_empty() {
        assert!(SubjectId::new("").is_err());
        assert!(SubjectId::new("   ").is_err());
    }

    #[test]
    fn test_subject_display_and_parse() {
        let id: SubjectId = "user-42".parse().expect("valid subject");
        assert_eq!(id.to_string(), "user-42");
        assert_eq!(id.as_str(), "user-42");
    }

    #[test]
    fn test_subject_serde_validates() {
        let id: SubjectId = serde_json::from_str("\"dj-7\"").expect("valid json");
        assert_eq!(id.as_str(), "dj-7");
        assert!(serde_json::from_str::<SubjectId>("\"\"").is_err());
    }

    #[test]
    fn test_connection_ids_are_unique() {
        assert_ne!(ConnectionId::new(), ConnectionId::new());
    }
}
