use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::CompileConfig;
use crate::model::{CanonicalSchema, ColumnDef, ColumnSchema};

/// Why a source column ended up without a canonical mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnmappedReason {
    /// Duplicated or blank header; never matched or adopted automatically.
    Ambiguous,
    /// No exact, normalised, or alias match, and schema growth is off.
    NoMatch,
    /// Another source column in the same sheet already claimed the target.
    DuplicateTarget,
}

/// A source column with no canonical mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnmappedColumn {
    pub name: String,
    /// 0-based position in the source sheet.
    pub index: usize,
    pub reason: UnmappedReason,
}

/// Result of aligning one sheet's detected columns with the canonical
/// schema.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ColumnMapping {
    /// (source name, canonical name) pairs in detected order.
    pub mapped: Vec<(String, String)>,
    /// Canonical columns newly adopted while reconciling this sheet.
    pub adopted: Vec<String>,
    /// Source columns left without a mapping.
    pub unmapped: Vec<UnmappedColumn>,
}

/// Normalises a column name for comparison: lowercased, punctuation and
/// separator runs collapsed to single spaces. Pure, so matching behaviour
/// is testable independently of any file parsing.
pub fn normalize_name(raw: &str) -> String {
    raw.to_lowercase()
        .chars()
        .map(|ch| if ch.is_alphanumeric() { ch } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

enum Match {
    /// Resolved to a column already in the canonical schema.
    Existing(String),
    /// An alias points at a canonical name not yet in the schema.
    AliasNew(String),
    /// Previously unseen column.
    New,
}

/// Computes the column alignment for one sheet.
///
/// Precedence per source column, first match wins: exact name, normalised
/// name, alias table, then adoption (when growth is allowed). Ambiguous
/// columns are always reported unmapped, and a canonical column can be
/// claimed at most once per sheet.
pub fn reconcile(
    schema: &mut CanonicalSchema,
    detected: &ColumnSchema,
    config: &CompileConfig,
) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    let mut claimed: BTreeSet<String> = BTreeSet::new();

    for column in &detected.columns {
        if column.ambiguous {
            mapping.unmapped.push(UnmappedColumn {
                name: column.name.clone(),
                index: column.index,
                reason: UnmappedReason::Ambiguous,
            });
            continue;
        }

        match match_column(schema, &config.alias_table, &column.name) {
            Match::Existing(canonical) => {
                if claimed.contains(&canonical) {
                    mapping.unmapped.push(UnmappedColumn {
                        name: column.name.clone(),
                        index: column.index,
                        reason: UnmappedReason::DuplicateTarget,
                    });
                } else {
                    claimed.insert(canonical.clone());
                    mapping.mapped.push((column.name.clone(), canonical));
                }
            }
            Match::AliasNew(canonical) => {
                adopt(schema, config, &mut mapping, &mut claimed, column, canonical);
            }
            Match::New => {
                let canonical = column.name.clone();
                adopt(schema, config, &mut mapping, &mut claimed, column, canonical);
            }
        }
    }

    mapping
}

fn adopt(
    schema: &mut CanonicalSchema,
    config: &CompileConfig,
    mapping: &mut ColumnMapping,
    claimed: &mut BTreeSet<String>,
    column: &ColumnDef,
    canonical: String,
) {
    if !config.allow_schema_growth {
        mapping.unmapped.push(UnmappedColumn {
            name: column.name.clone(),
            index: column.index,
            reason: UnmappedReason::NoMatch,
        });
        return;
    }
    if claimed.contains(&canonical) {
        mapping.unmapped.push(UnmappedColumn {
            name: column.name.clone(),
            index: column.index,
            reason: UnmappedReason::DuplicateTarget,
        });
        return;
    }
    claimed.insert(canonical.clone());
    schema.push(canonical.clone());
    mapping.adopted.push(canonical.clone());
    mapping.mapped.push((column.name.clone(), canonical));
}

fn match_column(
    schema: &CanonicalSchema,
    aliases: &BTreeMap<String, String>,
    name: &str,
) -> Match {
    if schema.contains(name) {
        return Match::Existing(name.to_string());
    }

    let normalized = normalize_name(name);
    if let Some(column) = schema
        .columns()
        .iter()
        .find(|column| normalize_name(column) == normalized)
    {
        return Match::Existing(column.clone());
    }

    for (alias, canonical) in aliases {
        if normalize_name(alias) != normalized {
            continue;
        }
        if schema.contains(canonical) {
            return Match::Existing(canonical.clone());
        }
        let canonical_normalized = normalize_name(canonical);
        if let Some(column) = schema
            .columns()
            .iter()
            .find(|column| normalize_name(column) == canonical_normalized)
        {
            return Match::Existing(column.clone());
        }
        return Match::AliasNew(canonical.clone());
    }

    Match::New
}
