use std::collections::{BTreeMap, HashMap};

use matsql_types::{Constraint, ConstraintType, Exists, Inference, Projection};
use matsql_validate::{
    classify, forbid_ambiguous_fields, formatted_numeric, FlatType, InfoSchema, Translation,
};
use proptest::prelude::*;

fn exists() -> impl Strategy<Value = Exists> {
    prop_oneof![
        Just(Exists::Must),
        Just(Exists::May),
        Just(Exists::Implicit),
        Just(Exists::Cannot),
    ]
}

fn structural_types() -> impl Strategy<Value = Vec<String>> {
    proptest::sample::subsequence(vec!["null", "object", "array"], 0..=3)
        .prop_map(|types| types.into_iter().map(str::to_string).collect())
}

fn any_format() -> impl Strategy<Value = Option<String>> {
    proptest::option::of(prop_oneof![
        Just("integer".to_string()),
        Just("number".to_string()),
        Just("date".to_string()),
        Just("date-time".to_string()),
        "[a-z]{1,8}",
    ])
}

fn inference(types: Vec<String>, exists: Exists, format: Option<String>) -> Inference {
    let inference = Inference::new(types, exists);
    match format {
        Some(format) => inference.with_format(format),
        None => inference,
    }
}

proptest! {
    #[test]
    fn structural_types_never_narrow_to_scalars(
        types in structural_types(),
        exists in exists(),
        format in any_format(),
    ) {
        let (flat, _) = classify(&inference(types, exists, format));
        prop_assert!(matches!(
            flat,
            FlatType::Never | FlatType::Object | FlatType::Array | FlatType::Multiple
        ));
    }

    #[test]
    fn must_exist_matches_inference(
        types in proptest::sample::subsequence(vec!["null", "string", "integer", "boolean"], 0..=4),
        exists in exists(),
    ) {
        let inf = Inference::new(types.iter().copied(), exists);
        let (flat, must_exist) = classify(&inf);
        if flat == FlatType::Never {
            prop_assert!(!must_exist);
        } else {
            prop_assert_eq!(must_exist, exists == Exists::Must && !types.contains(&"null"));
        }
    }

    #[test]
    fn formatted_numeric_only_for_plain_string_values(
        types in proptest::sample::subsequence(vec!["null", "string", "integer", "number", "object"], 0..=5),
        format in any_format(),
        key in any::<bool>(),
    ) {
        let numeric_format = matches!(format.as_deref(), Some("integer" | "number"));
        let mut p = Projection::new("f", "/f", inference(
            types.iter().map(|t| (*t).to_string()).collect(),
            Exists::May,
            format,
        ));
        p.is_primary_key = key;

        let string_only = types == ["string"] || types == ["null", "string"];
        prop_assert_eq!(formatted_numeric(&p), !key && string_only && numeric_format);
    }

    #[test]
    fn ambiguity_forbids_exactly_the_colliding_names(
        names in proptest::collection::btree_set("[a-cA-C_]{1,3}", 1..12),
    ) {
        let is = InfoSchema::with_translation(Translation::Lowercase);
        let input: BTreeMap<String, Constraint> = names
            .iter()
            .map(|n| (n.clone(), Constraint::new(ConstraintType::FieldOptional, "ok")))
            .collect();

        let mut group_sizes: HashMap<String, usize> = HashMap::new();
        for n in &names {
            *group_sizes.entry(n.to_lowercase()).or_default() += 1;
        }

        let output = forbid_ambiguous_fields(&is, input);
        prop_assert_eq!(output.len(), names.len());
        for (name, constraint) in &output {
            let colliding = group_sizes[&name.to_lowercase()] > 1;
            prop_assert_eq!(constraint.is_forbidden(), colliding, "field {}", name);
        }
    }
}
