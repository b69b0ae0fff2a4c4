//! Binding validation.
//!
//! [`Validator::validate_binding`] runs in two phases. Hard checks reject
//! proposals that would break schema evolution (delta-updates downgrade,
//! backfill regression, a second collection writing to the same table).
//! Every candidate field then gets a [`Constraint`]: fields with an existing
//! destination column are checked for compatibility, others get the
//! [`Constrainer`]'s default. A final pass forbids fields whose names
//! collide after identifier translation.

use std::collections::{BTreeMap, HashMap};

use matsql_types::{
    BindingSpec, CollectionSpec, Constraint, ConstraintType, FieldSelection, MaterializationSpec,
    Projection,
};

use crate::constrainer::Constrainer;
use crate::error::ValidateError;
use crate::info_schema::{EndpointField, InfoSchema};

/// Validates proposed bindings against a destination snapshot.
pub struct Validator<'a, C> {
    constrainer: C,
    info_schema: &'a InfoSchema,
}

impl<'a, C: Constrainer> Validator<'a, C> {
    #[must_use]
    pub fn new(constrainer: C, info_schema: &'a InfoSchema) -> Self {
        Self {
            constrainer,
            info_schema,
        }
    }

    /// Decide a constraint for every projection of `collection` bound to the
    /// destination table at `path`.
    ///
    /// `existing` is the currently applied materialization, if any. Its
    /// binding at `path` (when present) is the baseline for the evolution
    /// checks. A backfill increase over that baseline means the table will
    /// be rebuilt, so existing columns are disregarded and every field is
    /// treated as new.
    ///
    /// # Errors
    ///
    /// Returns a rejection ([`ValidateError::is_rejection`]) for a
    /// delta-updates downgrade, a backfill regression, or a collision with
    /// another collection at `path`. Returns other [`ValidateError`]s if the
    /// constrainer cannot evaluate a field.
    pub fn validate_binding(
        &self,
        path: &[String],
        delta_updates: bool,
        backfill: u32,
        collection: &CollectionSpec,
        field_configs: &BTreeMap<String, serde_json::Value>,
        existing: Option<&MaterializationSpec>,
    ) -> Result<BTreeMap<String, Constraint>, ValidateError> {
        let label = display_path(path);
        let prior = self.prior_binding(path, existing);

        let checked =
            self.check_proposal(path, &label, delta_updates, backfill, collection, prior);
        if let Err(err) = checked {
            tracing::warn!(
                binding = %label,
                collection = %collection.name,
                error = %err,
                "Rejected binding"
            );
            return Err(err);
        }

        let rebuild = prior.is_some_and(|p| backfill > p.backfill);
        if rebuild {
            tracing::info!(
                binding = %label,
                backfill,
                "Backfill counter increased; destination table will be replaced"
            );
        }
        let prior_selection = prior.filter(|_| !rebuild).map(|p| &p.field_selection);
        let table_exists = !rebuild && self.info_schema.has_resource(path);

        let mut constraints = BTreeMap::new();
        for projection in &collection.projections {
            let endpoint = if table_exists {
                self.info_schema.resolve(path, &projection.field)
            } else {
                None
            };

            let constraint = match endpoint {
                Some(endpoint) => self.existing_field_constraint(
                    endpoint,
                    projection,
                    field_configs.get(&projection.field),
                    prior_selection,
                )?,
                None => self.constrainer.new_constraints(projection, delta_updates),
            };
            constraints.insert(projection.field.clone(), constraint);
        }

        if table_exists {
            self.log_unmatched_columns(path, &label, collection);
        }

        let constraints = forbid_ambiguous_fields(self.info_schema, constraints);
        tracing::debug!(
            binding = %label,
            fields = constraints.len(),
            forbidden = constraints.values().filter(|c| c.is_forbidden()).count(),
            "Validated binding"
        );
        Ok(constraints)
    }

    /// The applied binding writing to the same destination table as `path`,
    /// compared in destination form.
    fn prior_binding<'s>(
        &self,
        path: &[String],
        existing: Option<&'s MaterializationSpec>,
    ) -> Option<&'s BindingSpec> {
        let located = self.info_schema.locate_path(path);
        existing?
            .bindings
            .iter()
            .find(|b| self.info_schema.locate_path(&b.resource_path) == located)
    }

    fn check_proposal(
        &self,
        path: &[String],
        label: &str,
        delta_updates: bool,
        backfill: u32,
        collection: &CollectionSpec,
        prior: Option<&BindingSpec>,
    ) -> Result<(), ValidateError> {
        let owners = prior
            .map(|p| &p.collection.name)
            .into_iter()
            .chain(self.info_schema.table_used_by(path));
        for owner in owners {
            if *owner != collection.name {
                return Err(ValidateError::TargetCollision {
                    proposed: collection.name.clone(),
                    existing: owner.clone(),
                    path: label.to_string(),
                });
            }
        }

        let Some(prior) = prior else {
            return Ok(());
        };
        if prior.delta_updates && !delta_updates {
            return Err(ValidateError::DeltaUpdatesDowngrade {
                path: label.to_string(),
            });
        }
        if backfill < prior.backfill {
            return Err(ValidateError::BackfillRegression {
                proposed: backfill,
                existing: prior.backfill,
            });
        }
        Ok(())
    }

    fn existing_field_constraint(
        &self,
        endpoint: &EndpointField,
        projection: &Projection,
        field_config: Option<&serde_json::Value>,
        prior_selection: Option<&FieldSelection>,
    ) -> Result<Constraint, ValidateError> {
        if !self
            .constrainer
            .compatible(endpoint, projection, field_config)?
        {
            return Ok(Constraint::new(
                ConstraintType::FieldForbidden,
                format!(
                    "Field '{}' is already being materialized as endpoint type '{}' and cannot be \
                     changed to type '{}'",
                    projection.field,
                    endpoint.type_name,
                    self.constrainer.description_for_type(projection),
                ),
            ));
        }

        let in_prior_key_or_document = prior_selection.is_some_and(|fs| {
            fs.is_key(&projection.field) || fs.is_document(&projection.field)
        });
        if projection.is_primary_key
            || projection.is_root_document_projection()
            || in_prior_key_or_document
        {
            Ok(Constraint::new(
                ConstraintType::LocationRequired,
                "This location is part of the current materialization",
            ))
        } else {
            Ok(Constraint::new(
                ConstraintType::FieldOptional,
                "This field is compatible with the existing column",
            ))
        }
    }

    fn log_unmatched_columns(&self, path: &[String], label: &str, collection: &CollectionSpec) {
        let proposed: Vec<String> = collection
            .projections
            .iter()
            .map(|p| self.info_schema.translate_field(&p.field))
            .collect();

        for column in self.info_schema.fields(path) {
            let translated = self.info_schema.translate_field(&column.name);
            if !proposed.contains(&translated) {
                tracing::debug!(
                    binding = %label,
                    column = %column.name,
                    "Destination column has no matching collection field; leaving it in place"
                );
            }
        }
    }
}

/// Force every field whose translated name collides with another field's to
/// [`ConstraintType::FieldForbidden`].
///
/// Colliding names are listed case-insensitively, with lowercase before
/// uppercase on case-only ties. Non-colliding fields pass through unchanged.
#[must_use]
pub fn forbid_ambiguous_fields(
    info_schema: &InfoSchema,
    mut constraints: BTreeMap<String, Constraint>,
) -> BTreeMap<String, Constraint> {
    let mut groups: HashMap<String, Vec<String>> = HashMap::new();
    for field in constraints.keys() {
        groups
            .entry(info_schema.translate_field(field))
            .or_default()
            .push(field.clone());
    }

    for (translated, mut fields) in groups {
        if fields.len() < 2 {
            continue;
        }
        fields.sort_by(|a, b| {
            a.to_lowercase()
                .cmp(&b.to_lowercase())
                .then_with(|| b.cmp(a))
        });
        let listed = fields.join(",");

        tracing::debug!(translated = %translated, fields = %listed, "Ambiguous field names");
        for field in &fields {
            if let Some(constraint) = constraints.get_mut(field) {
                *constraint = Constraint::new(
                    ConstraintType::FieldForbidden,
                    format!(
                        "Flow collection field '{field}' would be materialized `{translated}`, \
                         which is ambiguous with the materializations for other Flow collection \
                         fields [{listed}]. Consider using an alternate, unambiguous projection \
                         of this field to allow it to be materialized."
                    ),
                );
            }
        }
    }

    constraints
}

fn display_path(path: &[String]) -> String {
    format!("[{}]", path.join("."))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::info_schema::Translation;

    fn optional(reason: &str) -> Constraint {
        Constraint::new(ConstraintType::FieldOptional, reason)
    }

    #[test]
    fn forbids_fields_ambiguous_after_lowercasing() {
        let is = InfoSchema::with_translation(Translation::Lowercase);
        let original: BTreeMap<String, Constraint> = [
            ("onlyOne", "this is ok"),
            ("notGood", "shouldn't be allowed"),
            ("NotGood", "shouldn't be allowed"),
            ("somethingelse", "this is ok"),
            ("something_else", "this is also ok"),
        ]
        .into_iter()
        .map(|(f, r)| (f.to_string(), optional(r)))
        .collect();

        let got = forbid_ambiguous_fields(&is, original);

        assert_eq!(got["onlyOne"], optional("this is ok"));
        assert_eq!(got["somethingelse"], optional("this is ok"));
        assert_eq!(got["something_else"], optional("this is also ok"));
        for field in ["notGood", "NotGood"] {
            assert_eq!(
                got[field],
                Constraint::new(
                    ConstraintType::FieldForbidden,
                    format!(
                        "Flow collection field '{field}' would be materialized `notgood`, which \
                         is ambiguous with the materializations for other Flow collection fields \
                         [notGood,NotGood]. Consider using an alternate, unambiguous projection \
                         of this field to allow it to be materialized."
                    )
                )
            );
        }
    }

    #[test]
    fn identity_translation_has_no_ambiguity() {
        let is = InfoSchema::with_translation(Translation::Identity);
        let original: BTreeMap<String, Constraint> = ["a", "A"]
            .into_iter()
            .map(|f| (f.to_string(), optional("ok")))
            .collect();
        assert_eq!(forbid_ambiguous_fields(&is, original.clone()), original);
    }

    #[test]
    fn three_way_collision_lists_all_names() {
        let is = InfoSchema::with_translation(Translation::Uppercase);
        let original: BTreeMap<String, Constraint> = ["Id", "ID", "id"]
            .into_iter()
            .map(|f| (f.to_string(), optional("ok")))
            .collect();
        let got = forbid_ambiguous_fields(&is, original);
        for c in got.values() {
            assert!(c.is_forbidden());
            assert!(c.reason.contains("[id,Id,ID]"), "reason: {}", c.reason);
            assert!(c.reason.contains("`ID`"));
        }
    }

    #[test]
    fn path_display() {
        assert_eq!(display_path(&["public".into(), "orders".into()]), "[public.orders]");
    }
}
