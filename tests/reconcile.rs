use std::collections::BTreeMap;

use results_compiler::config::CompileConfig;
use results_compiler::model::{CanonicalSchema, ColumnDef, ColumnSchema};
use results_compiler::reconcile::{UnmappedReason, normalize_name, reconcile};

fn def(name: &str, index: usize) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        index,
        ambiguous: false,
    }
}

fn ambiguous(name: &str, index: usize) -> ColumnDef {
    ColumnDef {
        name: name.to_string(),
        index,
        ambiguous: true,
    }
}

fn schema_of(names: &[&str]) -> CanonicalSchema {
    let mut schema = CanonicalSchema::default();
    for name in names {
        schema.push(*name);
    }
    schema
}

#[test]
fn normalize_name_collapses_case_and_separators() {
    assert_eq!(normalize_name("  Study_Code "), "study code");
    assert_eq!(normalize_name("Study-Code!"), "study code");
    assert_eq!(normalize_name("STUDY   CODE"), "study code");
    assert_eq!(normalize_name("studycode"), "studycode");
}

#[test]
fn exact_and_normalized_matches_resolve_to_existing_columns() {
    let mut schema = schema_of(&["ID", "Dose Level"]);
    let detected = ColumnSchema {
        columns: vec![def("ID", 0), def("dose_level", 1)],
    };

    let mapping = reconcile(&mut schema, &detected, &CompileConfig::default());

    assert_eq!(
        mapping.mapped,
        vec![
            ("ID".to_string(), "ID".to_string()),
            ("dose_level".to_string(), "Dose Level".to_string()),
        ]
    );
    assert!(mapping.adopted.is_empty());
    assert!(mapping.unmapped.is_empty());
    assert_eq!(schema.len(), 2);
}

#[test]
fn alias_table_maps_synonyms() {
    let mut schema = schema_of(&["Gene Target"]);
    let config = CompileConfig {
        alias_table: BTreeMap::from([("Target".to_string(), "Gene Target".to_string())]),
        ..CompileConfig::default()
    };
    let detected = ColumnSchema {
        columns: vec![def("target", 0)],
    };

    let mapping = reconcile(&mut schema, &detected, &config);

    assert_eq!(
        mapping.mapped,
        vec![("target".to_string(), "Gene Target".to_string())]
    );
    assert!(mapping.unmapped.is_empty());
}

#[test]
fn ambiguous_columns_are_never_adopted() {
    let mut schema = schema_of(&["Score"]);
    let detected = ColumnSchema {
        columns: vec![ambiguous("Score", 0), ambiguous("Score_2", 1)],
    };

    let mapping = reconcile(&mut schema, &detected, &CompileConfig::default());

    assert!(mapping.mapped.is_empty());
    assert!(mapping.adopted.is_empty());
    assert_eq!(mapping.unmapped.len(), 2);
    assert!(
        mapping
            .unmapped
            .iter()
            .all(|column| column.reason == UnmappedReason::Ambiguous)
    );
    assert_eq!(schema.len(), 1);
}

#[test]
fn second_claim_on_a_canonical_column_is_reported() {
    let mut schema = CanonicalSchema::default();
    let detected = ColumnSchema {
        columns: vec![def("Total", 0), def("total", 1)],
    };

    let mapping = reconcile(&mut schema, &detected, &CompileConfig::default());

    assert_eq!(
        mapping.mapped,
        vec![("Total".to_string(), "Total".to_string())]
    );
    assert_eq!(mapping.unmapped.len(), 1);
    assert_eq!(mapping.unmapped[0].name, "total");
    assert_eq!(mapping.unmapped[0].reason, UnmappedReason::DuplicateTarget);
    assert_eq!(schema.columns(), ["Total".to_string()]);
}

#[test]
fn growth_disallowed_reports_new_columns_unmapped() {
    let mut schema = schema_of(&["ID"]);
    let config = CompileConfig {
        allow_schema_growth: false,
        ..CompileConfig::default()
    };
    let detected = ColumnSchema {
        columns: vec![def("ID", 0), def("Comment", 1)],
    };

    let mapping = reconcile(&mut schema, &detected, &config);

    assert_eq!(mapping.mapped, vec![("ID".to_string(), "ID".to_string())]);
    assert_eq!(mapping.unmapped.len(), 1);
    assert_eq!(mapping.unmapped[0].name, "Comment");
    assert_eq!(mapping.unmapped[0].reason, UnmappedReason::NoMatch);
    assert_eq!(schema.len(), 1);
}

#[test]
fn adoption_preserves_first_seen_order() {
    let mut schema = CanonicalSchema::default();
    let detected = ColumnSchema {
        columns: vec![def("Tissue", 0), def("Dose", 1)],
    };

    let mapping = reconcile(&mut schema, &detected, &CompileConfig::default());

    assert_eq!(mapping.adopted, vec!["Tissue".to_string(), "Dose".to_string()]);
    assert_eq!(
        schema.columns(),
        ["Tissue".to_string(), "Dose".to_string()]
    );
}
