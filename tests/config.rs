use results_compiler::compiler::Compiler;
use results_compiler::config::{CompileConfig, ConflictPolicy};
use results_compiler::error::CompileError;

#[test]
fn defaults_are_valid() {
    CompileConfig::default().validate().expect("valid defaults");
}

#[test]
fn out_of_range_fill_ratio_is_refused() {
    let config = CompileConfig {
        header_min_fill_ratio: 0.0,
        ..CompileConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(CompileError::InvalidConfig(_))
    ));

    let config = CompileConfig {
        header_min_fill_ratio: 1.5,
        ..CompileConfig::default()
    };
    assert!(matches!(
        Compiler::new(config),
        Err(CompileError::InvalidConfig(_))
    ));
}

#[test]
fn invalid_sheet_pattern_is_refused() {
    let config = CompileConfig {
        sheet_name_pattern: Some("(".to_string()),
        ..CompileConfig::default()
    };
    assert!(matches!(config.validate(), Err(CompileError::Pattern(_))));
}

#[test]
fn blank_identity_column_is_refused() {
    let config = CompileConfig {
        identity_columns: vec!["ID".to_string(), "  ".to_string()],
        ..CompileConfig::default()
    };
    assert!(matches!(
        config.validate(),
        Err(CompileError::InvalidConfig(_))
    ));
}

#[test]
fn unknown_conflict_policy_fails_to_parse() {
    let json = r#"{"conflict_policy": "keep-middle"}"#;
    let parsed: Result<CompileConfig, _> = serde_json::from_str(json);
    assert!(parsed.is_err());
}

#[test]
fn kebab_case_options_deserialize() {
    let json = r#"{"conflict_policy": "merge-non-absent", "identity_columns": ["ID"]}"#;
    let config: CompileConfig = serde_json::from_str(json).expect("parsed");
    assert_eq!(config.conflict_policy, ConflictPolicy::MergeNonAbsent);
    assert_eq!(config.identity_columns, vec!["ID".to_string()]);
    assert!(config.allow_schema_growth);
}
