//! JSON-schema type inference of a document location.
//!
//! An [`Inference`] is what the source side knows about a field: the set of
//! JSON types it may take, whether it must exist, and string annotations
//! such as `format` and `contentEncoding`.

use serde::{Deserialize, Serialize};

/// JSON type name for `null`.
pub const NULL: &str = "null";

const SCALAR_TYPES: [&str; 4] = ["boolean", "integer", "number", "string"];

/// Existence requirement of a location within documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Exists {
    /// The location is always present.
    Must,
    /// The location may or may not be present.
    #[default]
    May,
    /// The location is implied by its parent but not itself constrained.
    Implicit,
    /// The location can never be present.
    Cannot,
}

/// String-specific annotations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StringInference {
    /// JSON-schema `format` (e.g. `"date-time"`, `"integer"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// JSON-schema `contentEncoding` (e.g. `"base64"`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_encoding: Option<String>,
    /// Maximum string length, when bounded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
}

/// Inferred type information for a single projection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inference {
    /// Possible JSON types, including `"null"` when nullable.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default)]
    pub exists: Exists,
    #[serde(default, rename = "string", skip_serializing_if = "Option::is_none")]
    pub string: Option<StringInference>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Inference {
    /// Build an inference from a list of type names.
    #[must_use]
    pub fn new<I, S>(types: I, exists: Exists) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            types: types.into_iter().map(Into::into).collect(),
            exists,
            ..Self::default()
        }
    }

    /// Attach a string `format` annotation.
    #[must_use]
    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.string.get_or_insert_with(StringInference::default).format = Some(format.into());
        self
    }

    /// Attach a string `contentEncoding` annotation.
    #[must_use]
    pub fn with_content_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.string
            .get_or_insert_with(StringInference::default)
            .content_encoding = Some(encoding.into());
        self
    }

    /// Type names other than `"null"`, in declared order.
    pub fn non_null_types(&self) -> impl Iterator<Item = &str> {
        self.types.iter().map(String::as_str).filter(|ty| *ty != NULL)
    }

    #[must_use]
    pub fn is_nullable(&self) -> bool {
        self.types.iter().any(|ty| ty == NULL)
    }

    /// True iff the location must exist and can never be `null`.
    #[must_use]
    pub fn must_exist(&self) -> bool {
        self.exists == Exists::Must && !self.is_nullable()
    }

    /// Exactly one non-null type.
    #[must_use]
    pub fn is_single_type(&self) -> bool {
        self.non_null_types().count() == 1
    }

    /// Exactly one non-null type, and it is a scalar.
    #[must_use]
    pub fn is_single_scalar_type(&self) -> bool {
        let mut non_null = self.non_null_types();
        match (non_null.next(), non_null.next()) {
            (Some(ty), None) => SCALAR_TYPES.contains(&ty),
            _ => false,
        }
    }

    /// The only possible value is `null`.
    #[must_use]
    pub fn is_null_only(&self) -> bool {
        !self.types.is_empty() && self.types.iter().all(|ty| ty == NULL)
    }

    #[must_use]
    pub fn string_format(&self) -> Option<&str> {
        self.string.as_ref().and_then(|s| s.format.as_deref())
    }

    #[must_use]
    pub fn content_encoding(&self) -> Option<&str> {
        self.string
            .as_ref()
            .and_then(|s| s.content_encoding.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn must_exist_requires_non_nullable() {
        assert!(Inference::new(["string"], Exists::Must).must_exist());
        assert!(!Inference::new(["null", "string"], Exists::Must).must_exist());
        assert!(!Inference::new(["string"], Exists::May).must_exist());
    }

    #[test]
    fn single_scalar_type_ignores_null() {
        assert!(Inference::new(["null", "integer"], Exists::May).is_single_scalar_type());
        assert!(!Inference::new(["object"], Exists::May).is_single_scalar_type());
        assert!(Inference::new(["object"], Exists::May).is_single_type());
        assert!(!Inference::new(["integer", "string"], Exists::May).is_single_scalar_type());
        assert!(!Inference::new(["null"], Exists::May).is_single_scalar_type());
    }

    #[test]
    fn null_only() {
        assert!(Inference::new(["null"], Exists::May).is_null_only());
        assert!(!Inference::new(Vec::<String>::new(), Exists::May).is_null_only());
        assert!(!Inference::new(["null", "string"], Exists::May).is_null_only());
    }

    #[test]
    fn string_annotations() {
        let inf = Inference::new(["string"], Exists::May)
            .with_format("date-time")
            .with_content_encoding("base64");
        assert_eq!(inf.string_format(), Some("date-time"));
        assert_eq!(inf.content_encoding(), Some("base64"));
    }

    #[test]
    fn deserializes_flow_style_json() {
        let inf: Inference = serde_json::from_str(
            r#"{"types":["null","string"],"exists":"MUST","string":{"format":"number"}}"#,
        )
        .unwrap();
        assert_eq!(inf.exists, Exists::Must);
        assert_eq!(inf.string_format(), Some("number"));
        assert!(inf.is_nullable());
    }
}
