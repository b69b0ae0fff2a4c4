//! Identifier newtypes.

use serde::{Deserialize, Serialize};

/// Logical name of a materialization (the set of bindings sharing one
/// checkpoint), e.g. `"acmeCo/orders-to-postgres"`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MaterializationName(String);

impl MaterializationName {
    /// Create a new materialization name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for MaterializationName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MaterializationName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for MaterializationName {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Name of a source collection (e.g. `"acmeCo/orders"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    /// Create a new collection name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Borrow the inner string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for CollectionName {
    fn from(value: String) -> Self {
        Self(value)
    }
}
