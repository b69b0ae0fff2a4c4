//! Validation error types.

use matsql_types::CollectionName;

/// Errors produced by [`Validator::validate_binding`](crate::Validator::validate_binding).
///
/// The first three variants are hard rejections of the proposal. The rest
/// are failures to evaluate it at all.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("changing from delta updates to standard updates is not allowed (binding to '{path}')")]
    DeltaUpdatesDowngrade { path: String },

    #[error("backfill count {proposed} is less than previously applied count of {existing}")]
    BackfillRegression { proposed: u32, existing: u32 },

    #[error(
        "cannot add a new binding to materialize collection '{proposed}' to '{path}' because an \
         existing binding for collection '{existing}' is already materializing to '{path}'"
    )]
    TargetCollision {
        proposed: CollectionName,
        existing: CollectionName,
        path: String,
    },

    /// Per-field configuration could not be decoded.
    #[error("invalid configuration for field '{field}': {source}")]
    FieldConfig {
        field: String,
        #[source]
        source: serde_json::Error,
    },

    /// A [`Constrainer`](crate::Constrainer) failed to evaluate a field.
    #[error("evaluating field '{field}': {message}")]
    Constrainer { field: String, message: String },
}

impl ValidateError {
    /// Whether this error rejects the proposal on schema-evolution grounds,
    /// as opposed to failing to evaluate it.
    #[must_use]
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::DeltaUpdatesDowngrade { .. }
                | Self::BackfillRegression { .. }
                | Self::TargetCollision { .. }
        )
    }
}

/// Errors from value normalizers in [`convert`](crate::convert).
#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("'{0}' is not an integral value")]
    NotIntegral(String),

    #[error("'{value}' is not a valid {kind}: {source}")]
    Parse {
        value: String,
        kind: &'static str,
        #[source]
        source: chrono::ParseError,
    },
}
