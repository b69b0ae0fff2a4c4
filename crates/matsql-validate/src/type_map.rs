//! Config-driven column typing and the [`MappedConstrainer`] built on it.

use std::collections::BTreeMap;

use matsql_types::{Constraint, ConstraintType, Projection};
use serde::{Deserialize, Serialize};

use crate::constrainer::{baseline_constraints, Constrainer};
use crate::error::ValidateError;
use crate::flat_type::{as_formatted_numeric, classify, FlatType};
use crate::info_schema::EndpointField;

/// Destination column type for each [`FlatType`], with string-format
/// overrides and alias groups for comparing reported column types.
///
/// The default mapping targets `PostgreSQL`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TypeMap {
    pub boolean: String,
    pub integer: String,
    pub number: String,
    pub string: String,
    pub object: String,
    pub array: String,
    pub binary: String,
    pub multiple: String,
    /// Column type by string `format`. The `integer` and `number` entries
    /// apply to numbers carried as formatted strings.
    pub string_formats: BTreeMap<String, String>,
    /// Groups of type names that denote the same column type. The first
    /// name of a group is its canonical form.
    pub aliases: Vec<Vec<String>>,
}

impl Default for TypeMap {
    fn default() -> Self {
        let string_formats = [
            ("date", "DATE"),
            ("date-time", "TIMESTAMPTZ"),
            ("duration", "INTERVAL"),
            ("time", "TIME"),
            ("uuid", "UUID"),
            ("integer", "NUMERIC"),
            ("number", "DECIMAL"),
        ];
        let aliases: &[&[&str]] = &[
            &["integer", "int", "int4"],
            &["smallint", "int2"],
            &["bigint", "int8"],
            &["real", "float4"],
            &["double precision", "float8"],
            &["boolean", "bool"],
            &["text", "varchar", "character varying"],
            &["timestamp", "timestamp without time zone"],
            &["timestamptz", "timestamp with time zone"],
            &["time", "time without time zone"],
            &["numeric", "decimal"],
        ];

        Self {
            boolean: "BOOLEAN".into(),
            integer: "BIGINT".into(),
            number: "DOUBLE PRECISION".into(),
            string: "TEXT".into(),
            object: "JSON".into(),
            array: "JSON".into(),
            binary: "BYTEA".into(),
            multiple: "JSON".into(),
            string_formats: string_formats
                .iter()
                .map(|(format, ty)| ((*format).to_string(), (*ty).to_string()))
                .collect(),
            aliases: aliases
                .iter()
                .map(|group| group.iter().map(|ty| (*ty).to_string()).collect())
                .collect(),
        }
    }
}

impl TypeMap {
    /// Column type `projection` maps to, or `None` if it can hold no value.
    #[must_use]
    pub fn column_type(&self, projection: &Projection) -> Option<&str> {
        if let Some(format) = as_formatted_numeric(projection) {
            if let Some(ty) = self.string_formats.get(format.as_str()) {
                return Some(ty.as_str());
            }
        }

        let ty = match classify(&projection.inference).0 {
            FlatType::Never => return None,
            FlatType::Boolean => &self.boolean,
            FlatType::Integer => &self.integer,
            FlatType::Number => &self.number,
            FlatType::String => projection
                .inference
                .string_format()
                .and_then(|format| self.string_formats.get(format))
                .unwrap_or(&self.string),
            FlatType::Object => &self.object,
            FlatType::Array => &self.array,
            FlatType::Binary => &self.binary,
            FlatType::Multiple => &self.multiple,
        };
        Some(ty.as_str())
    }

    /// Canonical form of a column type name.
    ///
    /// Case and repeated whitespace are folded, type parameters such as
    /// `(38,0)` are dropped, and aliases resolve to their group's first name.
    #[must_use]
    pub fn normalize(&self, type_name: &str) -> String {
        let base = type_name.split('(').next().unwrap_or(type_name);
        let folded = base
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase();

        self.aliases
            .iter()
            .find(|group| group.iter().any(|alias| alias.eq_ignore_ascii_case(&folded)))
            .and_then(|group| group.first())
            .map_or(folded, |canonical| canonical.to_lowercase())
    }

    #[must_use]
    pub fn types_compatible(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }
}

/// Per-field configuration understood by [`MappedConstrainer`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FieldConfig {
    /// Column type to use instead of the mapped one.
    #[serde(default)]
    pub ddl: Option<String>,
}

impl FieldConfig {
    fn parse(field: &str, raw: Option<&serde_json::Value>) -> Result<Self, ValidateError> {
        match raw {
            None | Some(serde_json::Value::Null) => Ok(Self::default()),
            Some(value) => {
                Self::deserialize(value).map_err(|source| ValidateError::FieldConfig {
                    field: field.to_string(),
                    source,
                })
            }
        }
    }
}

/// [`Constrainer`] driven entirely by a [`TypeMap`].
#[derive(Debug, Clone, Default)]
pub struct MappedConstrainer {
    type_map: TypeMap,
}

impl MappedConstrainer {
    #[must_use]
    pub fn new(type_map: TypeMap) -> Self {
        Self { type_map }
    }

    #[must_use]
    pub fn type_map(&self) -> &TypeMap {
        &self.type_map
    }
}

impl Constrainer for MappedConstrainer {
    fn compatible(
        &self,
        existing: &EndpointField,
        proposed: &Projection,
        field_config: Option<&serde_json::Value>,
    ) -> Result<bool, ValidateError> {
        let config = FieldConfig::parse(&proposed.field, field_config)?;
        let mapped = match config.ddl.as_deref() {
            Some(ddl) => ddl,
            None => match self.type_map.column_type(proposed) {
                Some(ty) => ty,
                None => return Ok(false),
            },
        };

        if !existing.nullable && !proposed.inference.must_exist() {
            return Ok(false);
        }
        Ok(self.type_map.types_compatible(&existing.type_name, mapped))
    }

    fn description_for_type(&self, projection: &Projection) -> String {
        let Some(ty) = self.type_map.column_type(projection) else {
            return FlatType::Never.to_string();
        };
        if projection.inference.must_exist() {
            format!("{ty} NOT NULL")
        } else {
            ty.to_string()
        }
    }

    fn new_constraints(&self, projection: &Projection, delta_updates: bool) -> Constraint {
        let constraint = baseline_constraints(projection, delta_updates);
        if constraint.kind == ConstraintType::FieldForbidden
            || self.type_map.column_type(projection).is_some()
        {
            return constraint;
        }
        Constraint::new(
            ConstraintType::FieldForbidden,
            "Cannot materialize a field with no possible types",
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matsql_types::{Exists, Inference};
    use serde_json::json;

    fn projection(types: &[&str], exists: Exists) -> Projection {
        Projection::new("f", "/f", Inference::new(types.iter().copied(), exists))
    }

    #[test]
    fn column_types() {
        let tm = TypeMap::default();
        assert_eq!(tm.column_type(&projection(&["integer"], Exists::Must)), Some("BIGINT"));
        assert_eq!(tm.column_type(&projection(&["object", "string"], Exists::May)), Some("JSON"));
        assert_eq!(tm.column_type(&projection(&["null"], Exists::May)), None);

        let ts = Projection::new(
            "ts",
            "/ts",
            Inference::new(["string"], Exists::Must).with_format("date-time"),
        );
        assert_eq!(tm.column_type(&ts), Some("TIMESTAMPTZ"));

        let big = Projection::new(
            "big",
            "/big",
            Inference::new(["null", "string"], Exists::May).with_format("integer"),
        );
        assert_eq!(tm.column_type(&big), Some("NUMERIC"));

        // keys are not formatted numerics, so they classify as plain integers
        let key = big.clone().primary_key();
        assert_eq!(tm.column_type(&key), Some("BIGINT"));
    }

    #[test]
    fn normalize_folds_aliases_and_parameters() {
        let tm = TypeMap::default();
        assert!(tm.types_compatible("integer", "INT4"));
        assert!(tm.types_compatible("character varying", "TEXT"));
        assert!(tm.types_compatible("timestamp with time zone", "timestamptz"));
        assert!(tm.types_compatible("numeric", "NUMERIC(38,0)"));
        assert!(tm.types_compatible("Double   Precision", "float8"));
        assert!(!tm.types_compatible("bigint", "text"));
    }

    #[test]
    fn compatible_checks_type_and_nullability() {
        let c = MappedConstrainer::default();
        let not_null = EndpointField::new("f", "bigint", false);
        let nullable = EndpointField::new("f", "int8", true);

        let required = projection(&["integer"], Exists::Must);
        let optional = projection(&["integer", "null"], Exists::May);

        assert!(c.compatible(&not_null, &required, None).unwrap());
        assert!(!c.compatible(&not_null, &optional, None).unwrap());
        assert!(c.compatible(&nullable, &optional, None).unwrap());
        assert!(!c
            .compatible(&nullable, &projection(&["string"], Exists::Must), None)
            .unwrap());
    }

    #[test]
    fn ddl_override_wins() {
        let c = MappedConstrainer::default();
        let existing = EndpointField::new("f", "text", true);
        let p = projection(&["integer"], Exists::Must);
        let config = json!({"ddl": "TEXT"});

        assert!(!c.compatible(&existing, &p, None).unwrap());
        assert!(c.compatible(&existing, &p, Some(&config)).unwrap());
    }

    #[test]
    fn malformed_field_config_is_an_error() {
        let c = MappedConstrainer::default();
        let existing = EndpointField::new("f", "text", true);
        let err = c
            .compatible(&existing, &projection(&["string"], Exists::May), Some(&json!({"ddl": 5})))
            .unwrap_err();
        assert!(matches!(err, ValidateError::FieldConfig { ref field, .. } if field == "f"));
    }

    #[test]
    fn description_includes_not_null() {
        let c = MappedConstrainer::default();
        assert_eq!(
            c.description_for_type(&projection(&["boolean"], Exists::Must)),
            "BOOLEAN NOT NULL"
        );
        assert_eq!(
            c.description_for_type(&projection(&["boolean", "null"], Exists::Must)),
            "BOOLEAN"
        );
    }

    #[test]
    fn typeless_fields_are_forbidden() {
        let c = MappedConstrainer::default();
        let none = c.new_constraints(&projection(&[], Exists::May), false);
        assert_eq!(none.kind, ConstraintType::FieldForbidden);
        let null = c.new_constraints(&projection(&["null"], Exists::May), false);
        assert_eq!(null.reason, "Cannot materialize this field");
        let ok = c.new_constraints(&projection(&["string"], Exists::May), false);
        assert_eq!(ok.kind, ConstraintType::LocationRecommended);
    }

    #[test]
    fn type_map_from_yaml_like_json() {
        let tm: TypeMap = serde_json::from_value(json!({"integer": "INT64", "string": "STRING"}))
            .unwrap();
        assert_eq!(tm.integer, "INT64");
        assert_eq!(tm.boolean, "BOOLEAN");
        assert!(tm.string_formats.contains_key("date-time"));
    }
}
