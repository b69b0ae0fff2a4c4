//! Collections and their projections.

use serde::{Deserialize, Serialize};

use crate::inference::Inference;
use crate::names::CollectionName;

/// A named field of a collection, bound to a document location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Projection {
    /// Field name, as it would be materialized before identifier translation.
    pub field: String,
    /// JSON pointer to the document location. Empty for the root document.
    #[serde(default)]
    pub ptr: String,
    #[serde(default)]
    pub inference: Inference,
    /// Whether this location is a component of the collection key.
    #[serde(default)]
    pub is_primary_key: bool,
}

impl Projection {
    #[must_use]
    pub fn new(field: impl Into<String>, ptr: impl Into<String>, inference: Inference) -> Self {
        Self {
            field: field.into(),
            ptr: ptr.into(),
            inference,
            is_primary_key: false,
        }
    }

    /// Mark the projection as a collection key component.
    #[must_use]
    pub fn primary_key(mut self) -> Self {
        self.is_primary_key = true;
        self
    }

    #[must_use]
    pub fn is_root_document_projection(&self) -> bool {
        self.ptr.is_empty()
    }
}

/// A source collection as seen by a materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    pub name: CollectionName,
    /// JSON pointers of the collection key, in key order.
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub projections: Vec<Projection>,
}

impl CollectionSpec {
    /// Look up a projection by field name.
    #[must_use]
    pub fn projection(&self, field: &str) -> Option<&Projection> {
        self.projections.iter().find(|p| p.field == field)
    }
}
