//! Collapsing JSON-schema type unions into storable flat types.

use matsql_types::{Inference, Projection};

/// The single destination-storable type a field's type union collapses to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlatType {
    /// No non-null type is possible.
    Never,
    Boolean,
    Integer,
    Number,
    String,
    Object,
    Array,
    /// A base64-encoded string.
    Binary,
    /// More than one type, with no narrowing that unifies them.
    Multiple,
}

impl FlatType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Never => "NEVER",
            Self::Boolean => "BOOLEAN",
            Self::Integer => "INTEGER",
            Self::Number => "NUMBER",
            Self::String => "STRING",
            Self::Object => "OBJECT",
            Self::Array => "ARRAY",
            Self::Binary => "BINARY",
            Self::Multiple => "MULTIPLE",
        }
    }
}

impl std::fmt::Display for FlatType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Numeric format carried by a string-typed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericStringFormat {
    Integer,
    Number,
}

impl NumericStringFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Integer => "integer",
            Self::Number => "number",
        }
    }

    fn parse(format: &str) -> Option<Self> {
        match format {
            "integer" => Some(Self::Integer),
            "number" => Some(Self::Number),
            _ => None,
        }
    }
}

/// Classify an inference into its [`FlatType`], and whether the location
/// must exist with a non-null value.
///
/// A `string` narrowed by an `integer` or `number` format classifies as that
/// numeric type, including when the union is exactly the string plus the
/// matching numeric type. Any other union of two or more non-null types is
/// [`FlatType::Multiple`]. An empty union is [`FlatType::Never`] and never
/// must exist.
#[must_use]
pub fn classify(inference: &Inference) -> (FlatType, bool) {
    let non_null: Vec<&str> = inference.non_null_types().collect();

    let flat = match non_null.as_slice() {
        [] => return (FlatType::Never, false),
        [single] => single_type(single, inference),
        [a, b] => numeric_string_pair(a, b, inference.string_format()),
        _ => FlatType::Multiple,
    };

    (flat, inference.must_exist())
}

fn single_type(ty: &str, inference: &Inference) -> FlatType {
    match ty {
        "boolean" => FlatType::Boolean,
        "integer" => FlatType::Integer,
        "number" => FlatType::Number,
        "object" => FlatType::Object,
        "array" => FlatType::Array,
        "string" => {
            match inference
                .string_format()
                .and_then(NumericStringFormat::parse)
            {
                Some(NumericStringFormat::Integer) => FlatType::Integer,
                Some(NumericStringFormat::Number) => FlatType::Number,
                None if inference.content_encoding() == Some("base64") => FlatType::Binary,
                None => FlatType::String,
            }
        }
        _ => FlatType::Multiple,
    }
}

fn numeric_string_pair(a: &str, b: &str, format: Option<&str>) -> FlatType {
    let other = match (a, b) {
        ("string", other) | (other, "string") if other != "string" => other,
        _ => return FlatType::Multiple,
    };

    match (other, format.and_then(NumericStringFormat::parse)) {
        ("integer", Some(NumericStringFormat::Integer)) => FlatType::Integer,
        ("number", Some(NumericStringFormat::Number)) => FlatType::Number,
        _ => FlatType::Multiple,
    }
}

/// The numeric format of a non-key field typed exactly `string` or
/// `null | string`.
///
/// Such fields may be stored as strings of arbitrary precision while still
/// being constrained as numerics.
#[must_use]
pub fn as_formatted_numeric(projection: &Projection) -> Option<NumericStringFormat> {
    if projection.is_primary_key {
        return None;
    }

    let mut non_null = projection.inference.non_null_types();
    if non_null.next() != Some("string") || non_null.next().is_some() {
        return None;
    }

    projection
        .inference
        .string_format()
        .and_then(NumericStringFormat::parse)
}

#[must_use]
pub fn formatted_numeric(projection: &Projection) -> bool {
    as_formatted_numeric(projection).is_some()
}
