//! Bindings of source collections to destination tables.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::names::MaterializationName;
use crate::projection::CollectionSpec;

/// Which fields of a collection are materialized, and how.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldSelection {
    /// Fields making up the destination key.
    #[serde(default)]
    pub keys: Vec<String>,
    /// Non-key fields.
    #[serde(default)]
    pub values: Vec<String>,
    /// Field holding the root document, if materialized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// Raw per-field configuration, keyed by field name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub field_config: BTreeMap<String, serde_json::Value>,
}

impl FieldSelection {
    #[must_use]
    pub fn is_key(&self, field: &str) -> bool {
        self.keys.iter().any(|k| k == field)
    }

    #[must_use]
    pub fn is_document(&self, field: &str) -> bool {
        self.document.as_deref() == Some(field)
    }
}

/// One collection mapped to one destination table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BindingSpec {
    /// Destination path segments (e.g. `["public", "orders"]`).
    pub resource_path: Vec<String>,
    pub collection: CollectionSpec,
    #[serde(default)]
    pub field_selection: FieldSelection,
    /// Backfill generation; bumped to force a full re-materialization.
    #[serde(default)]
    pub backfill: u32,
    #[serde(default)]
    pub delta_updates: bool,
}

/// A full materialization: the applied (or proposed) set of bindings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterializationSpec {
    pub name: MaterializationName,
    #[serde(default)]
    pub bindings: Vec<BindingSpec>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn binding(path: &[&str], collection: &str) -> BindingSpec {
        BindingSpec {
            resource_path: path.iter().map(|s| (*s).to_string()).collect(),
            collection: CollectionSpec {
                name: collection.into(),
                key: vec![],
                projections: vec![],
            },
            field_selection: FieldSelection::default(),
            backfill: 0,
            delta_updates: false,
        }
    }

    #[test]
    fn field_selection_roles() {
        let fs = FieldSelection {
            keys: vec!["id".into()],
            values: vec!["v".into()],
            document: Some("flow_document".into()),
            field_config: BTreeMap::new(),
        };
        assert!(fs.is_key("id"));
        assert!(fs.is_document("flow_document"));
        assert!(!fs.is_document("v"));
        assert!(!fs.is_key("v"));
    }

    #[test]
    fn binding_defaults_from_json() {
        let b: BindingSpec = serde_json::from_str(
            r#"{"resource_path":["t"],"collection":{"name":"c"}}"#,
        )
        .unwrap();
        assert_eq!(b.backfill, 0);
        assert!(!b.delta_updates);
        assert!(b.field_selection.field_config.is_empty());
    }

    #[test]
    fn materialization_from_json() {
        let spec: MaterializationSpec = serde_json::from_str(
            r#"{"name":"acme/mat","bindings":[
                {"resource_path":["public","orders"],"collection":{"name":"acme/orders"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(spec.name.as_str(), "acme/mat");
        assert_eq!(spec.bindings, [binding(&["public", "orders"], "acme/orders")]);
    }
}
