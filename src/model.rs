use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A source file as handed over by the retrieval layer: identifier, raw
/// bytes, and the modification timestamp reported by the store. Owned
/// transiently by the parser during extraction.
#[derive(Debug, Clone)]
pub struct RawFile {
    /// Source path or file name, used in rejection reports and log events.
    pub id: String,
    /// Raw workbook bytes.
    pub bytes: Vec<u8>,
    /// Modification time, when the source reports one.
    pub modified: Option<DateTime<Utc>>,
}

impl RawFile {
    /// Creates a raw file without a modification timestamp.
    pub fn new(id: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: id.into(),
            bytes,
            modified: None,
        }
    }
}

/// A typed cell value.
///
/// `Absent` is the explicit marker for a missing cell and is distinct from
/// `Text("")`; the compiled table never omits cells, it stores `Absent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum CellValue {
    /// Plain text cell.
    Text(String),
    /// Numeric cell. Integers surface as floats, matching the spreadsheet
    /// engine's storage model.
    Number(f64),
    /// Date or datetime cell, taken from the engine's native cell type.
    Date(NaiveDateTime),
    /// Boolean cell.
    Bool(bool),
    /// Explicit absent marker for a missing cell.
    Absent,
}

impl CellValue {
    /// Returns true for the absent marker.
    pub fn is_absent(&self) -> bool {
        matches!(self, CellValue::Absent)
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Text(value) => f.write_str(value),
            CellValue::Number(value) => {
                // Whole numbers render without a trailing fraction so that
                // identity keys built from numeric and text cells agree.
                if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "{}", *value as i64)
                } else {
                    write!(f, "{value}")
                }
            }
            CellValue::Date(value) => write!(f, "{}", value.format("%Y-%m-%dT%H:%M:%S")),
            CellValue::Bool(value) => write!(f, "{value}"),
            CellValue::Absent => Ok(()),
        }
    }
}

/// A column as detected in one sheet's header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name, disambiguated when the header repeats.
    pub name: String,
    /// 0-based position in the sheet, retained for error messages.
    pub index: usize,
    /// Set when the header was duplicated or blank. Ambiguous columns are
    /// never matched or adopted automatically.
    pub ambiguous: bool,
}

/// The ordered column layout detected in one sheet. Created once per sheet
/// by the parser, consumed by schema reconciliation, then discarded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub columns: Vec<ColumnDef>,
}

/// One data row as extracted from a sheet: the 1-based source row position
/// and an ordered mapping from detected column name to cell value.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 1-based row position in the source sheet.
    pub row: u32,
    /// Ordered (column name, value) pairs following the detected schema.
    pub cells: Vec<(String, CellValue)>,
}

impl Record {
    /// Looks up a cell by detected column name.
    pub fn get(&self, name: &str) -> Option<&CellValue> {
        self.cells
            .iter()
            .find(|(cell_name, _)| cell_name == name)
            .map(|(_, value)| value)
    }
}

/// The unified, authoritative ordered list of column names for the compiled
/// result. Grows monotonically in first-seen order; never shrinks. Owned
/// exclusively by one compiler instance per run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalSchema {
    columns: Vec<String>,
}

impl CanonicalSchema {
    /// Returns the position of an exactly-named column.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column == name)
    }

    /// Returns true when a column with exactly this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Appends a newly adopted column at the end.
    pub fn push(&mut self, name: impl Into<String>) {
        self.columns.push(name.into());
    }

    /// The canonical column names in adoption order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Consumes the schema, yielding the final column list.
    pub fn into_columns(self) -> Vec<String> {
        self.columns
    }
}

/// The finalized compilation result: rectangular, canonical-schema-ordered.
/// Every row holds one value (possibly `Absent`) per canonical column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompiledTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

/// Why a file, row, or field was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    /// The whole file could not be parsed.
    UnparsableFile,
    /// The field sat under a duplicated or blank header.
    AmbiguousColumn,
    /// The field's column had no canonical mapping and schema growth was
    /// disallowed.
    UnmappedColumn,
    /// A second source column resolved to an already-claimed canonical
    /// column within the same sheet.
    DuplicateTarget,
    /// The row shared an identity key with another accepted row and the
    /// conflict policy discarded it.
    DuplicateIdentity,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RejectReason::UnparsableFile => "unparsable-file",
            RejectReason::AmbiguousColumn => "ambiguous-column",
            RejectReason::UnmappedColumn => "unmapped-column",
            RejectReason::DuplicateTarget => "duplicate-target",
            RejectReason::DuplicateIdentity => "duplicate-identity",
        };
        f.write_str(label)
    }
}

/// One rejected file, row, or field, with enough context to reproduce and
/// fix the source. Appended exactly once per rejection, never retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectionEntry {
    /// Identifier of the source file.
    pub file: String,
    /// 1-based row position in the source sheet, when the rejection is
    /// narrower than the whole file.
    pub row: Option<u32>,
    /// Offending column name, for field-level rejections.
    pub column: Option<String>,
    /// Reason code.
    pub reason: RejectReason,
    /// Offending raw data rendered as text.
    pub raw: Option<String>,
}
