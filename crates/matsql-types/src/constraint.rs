//! Field constraint verdicts returned by binding validation.

use serde::{Deserialize, Serialize};

/// Severity of a field constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConstraintType {
    /// The location must be materialized.
    LocationRequired,
    /// The location should usually be materialized.
    LocationRecommended,
    /// The field may be materialized.
    FieldOptional,
    /// The field cannot be materialized.
    FieldForbidden,
}

impl ConstraintType {
    /// Wire-format string.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LocationRequired => "LOCATION_REQUIRED",
            Self::LocationRecommended => "LOCATION_RECOMMENDED",
            Self::FieldOptional => "FIELD_OPTIONAL",
            Self::FieldForbidden => "FIELD_FORBIDDEN",
        }
    }
}

impl std::fmt::Display for ConstraintType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict for one field, with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraint {
    #[serde(rename = "type")]
    pub kind: ConstraintType,
    pub reason: String,
}

impl Constraint {
    #[must_use]
    pub fn new(kind: ConstraintType, reason: impl Into<String>) -> Self {
        Self {
            kind,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub fn is_forbidden(&self) -> bool {
        self.kind == ConstraintType::FieldForbidden
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constraint_json_shape() {
        let c = Constraint::new(ConstraintType::LocationRequired, "key");
        let json = serde_json::to_value(&c).unwrap();
        assert_eq!(json["type"], "LOCATION_REQUIRED");
        assert_eq!(json["reason"], "key");
    }

    #[test]
    fn constraint_type_display_matches_serde() {
        for kind in [
            ConstraintType::LocationRequired,
            ConstraintType::LocationRecommended,
            ConstraintType::FieldOptional,
            ConstraintType::FieldForbidden,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
