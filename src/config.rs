use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{CompileError, Result};

/// Rule applied when two accepted rows share an identity key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictPolicy {
    /// The earlier row stays, the later row is rejected.
    KeepFirst,
    /// The later row replaces the earlier one, which is rejected.
    #[default]
    KeepLast,
    /// The later row's non-absent values fill the earlier row's absent
    /// cells; a later row that contributes nothing is rejected.
    MergeNonAbsent,
    /// Both rows are rejected and the key is flagged; every further row
    /// bearing it is rejected as well.
    RejectBoth,
}

/// Options recognised by the compilation core. Loaded from a JSON file by
/// the CLI; all fields have defaults so a partial file is valid.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompileConfig {
    /// Fraction of non-empty text cells required for a row to be recognised
    /// as the header row. Must lie in (0, 1].
    pub header_min_fill_ratio: f64,
    /// Explicit synonym list: alias name to canonical column name.
    pub alias_table: BTreeMap<String, String>,
    /// When true, previously-unseen columns are adopted into the canonical
    /// schema; when false their fields are rejected.
    pub allow_schema_growth: bool,
    /// Canonical columns forming the identity key for de-duplication. Empty
    /// disables de-duplication entirely.
    pub identity_columns: Vec<String>,
    /// Rule resolving two rows sharing an identity key.
    pub conflict_policy: ConflictPolicy,
    /// Optional regex; sheets whose names do not match are skipped.
    pub sheet_name_pattern: Option<String>,
}

impl Default for CompileConfig {
    fn default() -> Self {
        Self {
            header_min_fill_ratio: 0.5,
            alias_table: BTreeMap::new(),
            allow_schema_growth: true,
            identity_columns: Vec::new(),
            conflict_policy: ConflictPolicy::default(),
            sheet_name_pattern: None,
        }
    }
}

impl CompileConfig {
    /// Loads and validates a configuration from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&data)?;
        config.validate()?;
        Ok(config)
    }

    /// Fails fast on invalid option values, before any file is processed.
    pub fn validate(&self) -> Result<()> {
        if !(self.header_min_fill_ratio > 0.0 && self.header_min_fill_ratio <= 1.0) {
            return Err(CompileError::InvalidConfig(format!(
                "header_min_fill_ratio must lie in (0, 1], got {}",
                self.header_min_fill_ratio
            )));
        }
        if self
            .identity_columns
            .iter()
            .any(|column| column.trim().is_empty())
        {
            return Err(CompileError::InvalidConfig(
                "identity_columns must not contain blank names".into(),
            ));
        }
        if let Some((alias, _)) = self
            .alias_table
            .iter()
            .find(|(alias, canonical)| alias.trim().is_empty() || canonical.trim().is_empty())
        {
            return Err(CompileError::InvalidConfig(format!(
                "alias_table entry '{alias}' maps a blank name"
            )));
        }
        self.sheet_filter()?;
        Ok(())
    }

    /// Compiles the sheet name filter, when one is configured.
    pub fn sheet_filter(&self) -> Result<Option<Regex>> {
        match self.sheet_name_pattern.as_deref() {
            Some(pattern) => Ok(Some(Regex::new(pattern)?)),
            None => Ok(None),
        }
    }
}
