//! Reference names.

use crate::{Result, TypesError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A Git reference name such as `refs/heads/main`.
///
/// On the wire a reference name is an arbitrary string without spaces;
/// no further validation of the ref-format rules is done here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ReferenceName(String);

impl ReferenceName {
    /// Creates a reference name without validation.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a reference name, rejecting empty names and names with
    /// whitespace.
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return Err(TypesError::InvalidReference(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    /// Returns the name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true for names under `refs/heads/`.
    #[must_use]
    pub fn is_branch(&self) -> bool {
        self.0.starts_with("refs/heads/")
    }

    /// Returns true for names under `refs/tags/`.
    #[must_use]
    pub fn is_tag(&self) -> bool {
        self.0.starts_with("refs/tags/")
    }
}

impl From<&str> for ReferenceName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for ReferenceName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for ReferenceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ReferenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
