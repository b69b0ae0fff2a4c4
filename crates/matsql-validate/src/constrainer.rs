//! Connector-supplied field policy.
//!
//! A [`Constrainer`] is the one place destination-specific typing rules
//! enter validation. Each destination supplies an implementation; the
//! [`Validator`](crate::Validator) only orchestrates.

use matsql_types::{Constraint, ConstraintType, Projection};

use crate::error::ValidateError;
use crate::flat_type::formatted_numeric;
use crate::info_schema::EndpointField;

/// Destination policy for existing columns and never-before-seen fields.
pub trait Constrainer {
    /// Whether `existing` can keep receiving values of `proposed` without
    /// loss or type errors.
    ///
    /// `field_config` is the raw per-field configuration from the binding,
    /// if any.
    ///
    /// # Errors
    ///
    /// Returns [`ValidateError::FieldConfig`] if the field configuration is
    /// malformed, or [`ValidateError::Constrainer`] if the check itself fails.
    fn compatible(
        &self,
        existing: &EndpointField,
        proposed: &Projection,
        field_config: Option<&serde_json::Value>,
    ) -> Result<bool, ValidateError>;

    /// Human-readable description of the type `projection` would be stored as.
    fn description_for_type(&self, projection: &Projection) -> String;

    /// Constraint for a field with no existing destination column.
    fn new_constraints(&self, projection: &Projection, delta_updates: bool) -> Constraint;
}

impl<T: Constrainer + ?Sized> Constrainer for &T {
    fn compatible(
        &self,
        existing: &EndpointField,
        proposed: &Projection,
        field_config: Option<&serde_json::Value>,
    ) -> Result<bool, ValidateError> {
        (**self).compatible(existing, proposed, field_config)
    }

    fn description_for_type(&self, projection: &Projection) -> String {
        (**self).description_for_type(projection)
    }

    fn new_constraints(&self, projection: &Projection, delta_updates: bool) -> Constraint {
        (**self).new_constraints(projection, delta_updates)
    }
}

impl<T: Constrainer + ?Sized> Constrainer for Box<T> {
    fn compatible(
        &self,
        existing: &EndpointField,
        proposed: &Projection,
        field_config: Option<&serde_json::Value>,
    ) -> Result<bool, ValidateError> {
        (**self).compatible(existing, proposed, field_config)
    }

    fn description_for_type(&self, projection: &Projection) -> String {
        (**self).description_for_type(projection)
    }

    fn new_constraints(&self, projection: &Projection, delta_updates: bool) -> Constraint {
        (**self).new_constraints(projection, delta_updates)
    }
}

/// Default severity for a new field, shared by every destination.
///
/// Keys are required. The root document is required for standard updates
/// and recommended for delta updates. Single scalars (including numbers
/// carried as formatted strings) are recommended, `null`-only fields are
/// forbidden, and anything else is optional.
#[must_use]
pub fn baseline_constraints(projection: &Projection, delta_updates: bool) -> Constraint {
    let inference = &projection.inference;

    if projection.is_primary_key {
        Constraint::new(
            ConstraintType::LocationRequired,
            "All Locations that are part of the collections key are required",
        )
    } else if projection.is_root_document_projection() && delta_updates {
        Constraint::new(
            ConstraintType::LocationRecommended,
            "The root document should usually be materialized",
        )
    } else if projection.is_root_document_projection() {
        Constraint::new(
            ConstraintType::LocationRequired,
            "The root document is required for a standard updates materialization",
        )
    } else if inference.is_single_scalar_type() || formatted_numeric(projection) {
        Constraint::new(
            ConstraintType::LocationRecommended,
            "The projection has a single scalar type",
        )
    } else if inference.is_null_only() {
        Constraint::new(ConstraintType::FieldForbidden, "Cannot materialize this field")
    } else {
        Constraint::new(
            ConstraintType::FieldOptional,
            "This field is able to be materialized",
        )
    }
}
