use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use matsql_types::{CollectionName, Constraint};
use matsql_validate::{MappedConstrainer, ValidateError, Validator};
use serde::Serialize;

use crate::config::{self, ValidateConfig};

/// Result of validating one proposed binding.
#[derive(Debug, Serialize)]
pub struct BindingReport {
    /// Dotted destination path.
    pub path: String,
    pub collection: CollectionName,
    #[serde(flatten)]
    pub outcome: BindingOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingOutcome {
    Constraints(BTreeMap<String, Constraint>),
    Rejected(String),
    Error(String),
}

impl BindingOutcome {
    fn is_ok(&self) -> bool {
        matches!(self, Self::Constraints(_))
    }
}

/// Execute the `validate` command: print constraints for every proposed binding.
pub fn execute(config_path: &Path) -> Result<()> {
    let config = config::parse_config(config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;
    let inputs = config
        .validate
        .context("Config has no `validate` section")?;

    let report = validate_all(&inputs, MappedConstrainer::new(config.type_map));
    println!("{}", serde_json::to_string_pretty(&report)?);

    let failed = report.iter().filter(|r| !r.outcome.is_ok()).count();
    if failed > 0 {
        anyhow::bail!("{failed} of {} binding(s) failed validation", report.len());
    }
    Ok(())
}

/// Validate each proposed binding, in proposal order.
pub fn validate_all(inputs: &ValidateConfig, constrainer: MappedConstrainer) -> Vec<BindingReport> {
    let info_schema = inputs.info_schema.clone().into_info_schema();
    let validator = Validator::new(constrainer, &info_schema);

    inputs
        .proposed
        .bindings
        .iter()
        .map(|binding| {
            let outcome = match validator.validate_binding(
                &binding.resource_path,
                binding.delta_updates,
                binding.backfill,
                &binding.collection,
                &binding.field_selection.field_config,
                inputs.existing.as_ref(),
            ) {
                Ok(constraints) => BindingOutcome::Constraints(constraints),
                Err(err) => outcome_for_error(&err),
            };
            BindingReport {
                path: binding.resource_path.join("."),
                collection: binding.collection.name.clone(),
                outcome,
            }
        })
        .collect()
}

fn outcome_for_error(err: &ValidateError) -> BindingOutcome {
    if err.is_rejection() {
        BindingOutcome::Rejected(err.to_string())
    } else {
        BindingOutcome::Error(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use matsql_types::ConstraintType;
    use matsql_validate::TypeMap;

    const CONFIG: &str = r#"
validate:
  info_schema:
    translation: lowercase
    tables:
      - path: [public, orders]
        owner: acme/orders
        columns:
          - { name: id, type: bigint, nullable: false }
          - { name: total, type: text, nullable: true }
  existing:
    name: acme/mat
    bindings:
      - resource_path: [public, orders]
        backfill: 1
        collection: &orders
          name: acme/orders
          key: [/id]
          projections:
            - field: id
              ptr: /id
              is_primary_key: true
              inference: { types: [integer], exists: MUST }
            - field: total
              ptr: /total
              inference: { types: [number], exists: MAY }
            - field: flow_document
              ptr: ""
              inference: { types: [object], exists: MUST }
        field_selection:
          keys: [id]
          values: [total]
          document: flow_document
  proposed:
    name: acme/mat
    bindings:
      - resource_path: [public, orders]
        backfill: 1
        collection: *orders
      - resource_path: [public, refunds]
        backfill: 0
        collection:
          name: acme/refunds
          key: [/id]
          projections:
            - field: id
              ptr: /id
              is_primary_key: true
              inference: { types: [integer], exists: MUST }
      - resource_path: [public, orders]
        backfill: 0
        collection:
          name: acme/other
          key: [/id]
"#;

    fn reports() -> Vec<BindingReport> {
        let config = config::parse_config_str(CONFIG).unwrap();
        validate_all(
            &config.validate.unwrap(),
            MappedConstrainer::new(TypeMap::default()),
        )
    }

    #[test]
    fn existing_table_is_checked_for_compatibility() {
        let reports = reports();
        assert_eq!(reports.len(), 3);
        let BindingOutcome::Constraints(orders) = &reports[0].outcome else {
            panic!("orders should validate: {:?}", reports[0]);
        };
        assert_eq!(orders["id"].kind, ConstraintType::LocationRequired);
        // A number can't be written to the existing text column.
        assert_eq!(orders["total"].kind, ConstraintType::FieldForbidden);
        assert!(orders["total"].reason.contains("'text'"), "{}", orders["total"].reason);
    }

    #[test]
    fn new_table_gets_default_constraints() {
        let reports = reports();
        assert_eq!(reports[1].path, "public.refunds");
        let BindingOutcome::Constraints(refunds) = &reports[1].outcome else {
            panic!("refunds should validate: {:?}", reports[1]);
        };
        assert_eq!(refunds["id"].kind, ConstraintType::LocationRequired);
    }

    #[test]
    fn second_collection_at_same_path_is_rejected() {
        let reports = reports();
        assert_eq!(reports[2].collection.as_str(), "acme/other");
        let BindingOutcome::Rejected(message) = &reports[2].outcome else {
            panic!("expected rejection: {:?}", reports[2]);
        };
        assert!(message.contains("'acme/orders'"));
    }

    #[test]
    fn report_json_shape() {
        let report = BindingReport {
            path: "public.t".into(),
            collection: CollectionName::new("acme/t"),
            outcome: BindingOutcome::Rejected("no".into()),
        };
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            serde_json::json!({ "path": "public.t", "collection": "acme/t", "rejected": "no" })
        );
    }
}
