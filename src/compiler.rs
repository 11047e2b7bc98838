use std::collections::{BTreeMap, BTreeSet};

use regex::Regex;
use tracing::{debug, info, instrument, warn};

use crate::config::{CompileConfig, ConflictPolicy};
use crate::error::Result;
use crate::model::{
    CanonicalSchema, CellValue, CompiledTable, RawFile, Record, RejectReason, RejectionEntry,
};
use crate::parse::{self, ParsedSheet};
use crate::reconcile::{self, UnmappedColumn, UnmappedReason};

/// Separator between identity key parts; a control character so composite
/// keys cannot collide with cell text.
const KEY_SEPARATOR: char = '\u{1f}';

/// Where an accepted row came from, kept so a later displacement can be
/// reported against the right file and row.
#[derive(Debug, Clone)]
struct Provenance {
    file: String,
    row: u32,
}

#[derive(Debug, Clone)]
struct TableRow {
    origin: Provenance,
    cells: Vec<CellValue>,
}

/// The finished output of one run: the rectangular table and the rejection
/// report.
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub table: CompiledTable,
    pub rejections: Vec<RejectionEntry>,
}

/// Owns the canonical table under construction for one run. Files are
/// folded in one at a time; concurrent runs use independent instances.
pub struct Compiler {
    config: CompileConfig,
    sheet_filter: Option<Regex>,
    schema: CanonicalSchema,
    // Displaced rows become `None` so positions held by the identity index
    // stay valid.
    rows: Vec<Option<TableRow>>,
    index: BTreeMap<String, usize>,
    poisoned: BTreeSet<String>,
    rejections: Vec<RejectionEntry>,
    files_seen: usize,
}

impl Compiler {
    /// Creates a compiler, failing fast on invalid configuration before any
    /// file is processed.
    pub fn new(config: CompileConfig) -> Result<Self> {
        config.validate()?;
        let sheet_filter = config.sheet_filter()?;
        Ok(Self {
            config,
            sheet_filter,
            schema: CanonicalSchema::default(),
            rows: Vec::new(),
            index: BTreeMap::new(),
            poisoned: BTreeSet::new(),
            rejections: Vec::new(),
            files_seen: 0,
        })
    }

    /// Folds one file into the table. A file that fails to parse is
    /// recorded as rejected; it never aborts the run.
    #[instrument(level = "info", skip_all, fields(file = %file.id))]
    pub fn add_file(&mut self, file: &RawFile) {
        self.files_seen += 1;
        let sheets = match parse::parse_workbook(
            file,
            self.config.header_min_fill_ratio,
            self.sheet_filter.as_ref(),
        ) {
            Ok(sheets) => sheets,
            Err(error) => {
                warn!(%error, "file skipped as unparsable");
                self.rejections.push(RejectionEntry {
                    file: file.id.clone(),
                    row: None,
                    column: None,
                    reason: RejectReason::UnparsableFile,
                    raw: Some(error.to_string()),
                });
                return;
            }
        };

        for sheet in sheets {
            self.add_sheet(file, sheet);
        }
    }

    fn add_sheet(&mut self, file: &RawFile, sheet: ParsedSheet) {
        let mapping = reconcile::reconcile(&mut self.schema, &sheet.schema, &self.config);

        for adopted in &mapping.adopted {
            info!(
                file = %file.id,
                sheet = %sheet.sheet_name,
                column = %adopted,
                "canonical column adopted"
            );
        }
        for unmapped in &mapping.unmapped {
            debug!(
                file = %file.id,
                sheet = %sheet.sheet_name,
                column = %unmapped.name,
                reason = ?unmapped.reason,
                "source column left unmapped"
            );
        }

        let targets: BTreeMap<&str, usize> = mapping
            .mapped
            .iter()
            .filter_map(|(source, canonical)| {
                self.schema
                    .position(canonical)
                    .map(|position| (source.as_str(), position))
            })
            .collect();
        let unmapped: BTreeMap<&str, &UnmappedColumn> = mapping
            .unmapped
            .iter()
            .map(|column| (column.name.as_str(), column))
            .collect();

        for record in sheet.records {
            self.add_record(file, &sheet.sheet_name, record, &targets, &unmapped);
        }
    }

    fn add_record(
        &mut self,
        file: &RawFile,
        sheet_name: &str,
        record: Record,
        targets: &BTreeMap<&str, usize>,
        unmapped: &BTreeMap<&str, &UnmappedColumn>,
    ) {
        let Record { row, cells } = record;
        let mut translated = vec![CellValue::Absent; self.schema.len()];

        for (name, value) in cells {
            if let Some(&position) = targets.get(name.as_str()) {
                translated[position] = value;
            } else if let Some(entry) = unmapped.get(name.as_str()) {
                if value.is_absent() {
                    continue;
                }
                let reason = match entry.reason {
                    UnmappedReason::Ambiguous => RejectReason::AmbiguousColumn,
                    UnmappedReason::NoMatch => RejectReason::UnmappedColumn,
                    UnmappedReason::DuplicateTarget => RejectReason::DuplicateTarget,
                };
                debug!(
                    file = %file.id,
                    sheet = sheet_name,
                    row,
                    column = %name,
                    reason = %reason,
                    "field rejected"
                );
                self.rejections.push(RejectionEntry {
                    file: file.id.clone(),
                    row: Some(row),
                    column: Some(name),
                    reason,
                    raw: Some(value.to_string()),
                });
            }
        }

        // A row whose every surviving field is absent carries no data once
        // its unmapped fields have been reported.
        if translated.iter().all(CellValue::is_absent) {
            debug!(file = %file.id, sheet = sheet_name, row, "row empty after translation");
            return;
        }

        let origin = Provenance {
            file: file.id.clone(),
            row,
        };

        match self.identity_key(&translated) {
            None => {
                self.rows.push(Some(TableRow {
                    origin,
                    cells: translated,
                }));
            }
            Some(key) => {
                if self.poisoned.contains(&key) {
                    debug!(file = %origin.file, row = origin.row, "row matches a flagged identity key");
                    self.reject_row(origin, &translated);
                    return;
                }
                match self.index.get(&key).copied() {
                    None => {
                        self.index.insert(key, self.rows.len());
                        self.rows.push(Some(TableRow {
                            origin,
                            cells: translated,
                        }));
                    }
                    Some(position) => self.resolve_conflict(position, key, origin, translated),
                }
            }
        }
    }

    fn resolve_conflict(
        &mut self,
        position: usize,
        key: String,
        origin: Provenance,
        cells: Vec<CellValue>,
    ) {
        debug!(
            file = %origin.file,
            row = origin.row,
            policy = ?self.config.conflict_policy,
            "duplicate identity key"
        );
        match self.config.conflict_policy {
            ConflictPolicy::KeepFirst => {
                self.reject_row(origin, &cells);
            }
            ConflictPolicy::KeepLast => {
                let displaced = self.rows[position].replace(TableRow { origin, cells });
                if let Some(displaced) = displaced {
                    let raw = self.render_row(&displaced.cells);
                    self.push_duplicate(displaced.origin, raw);
                }
            }
            ConflictPolicy::MergeNonAbsent => {
                let mut adopted_any = false;
                if let Some(existing) = self.rows[position].as_mut() {
                    if existing.cells.len() < cells.len() {
                        existing.cells.resize(cells.len(), CellValue::Absent);
                    }
                    for (idx, value) in cells.iter().enumerate() {
                        if value.is_absent() {
                            continue;
                        }
                        if existing.cells[idx].is_absent() {
                            existing.cells[idx] = value.clone();
                            adopted_any = true;
                        }
                    }
                }
                if !adopted_any {
                    self.reject_row(origin, &cells);
                }
            }
            ConflictPolicy::RejectBoth => {
                if let Some(existing) = self.rows[position].take() {
                    let raw = self.render_row(&existing.cells);
                    self.push_duplicate(existing.origin, raw);
                }
                self.index.remove(&key);
                self.reject_row(origin, &cells);
                warn!("identity conflict flagged; key rejected for the rest of the run");
                self.poisoned.insert(key);
            }
        }
    }

    fn reject_row(&mut self, origin: Provenance, cells: &[CellValue]) {
        let raw = self.render_row(cells);
        self.push_duplicate(origin, raw);
    }

    fn push_duplicate(&mut self, origin: Provenance, raw: String) {
        self.rejections.push(RejectionEntry {
            file: origin.file,
            row: Some(origin.row),
            column: None,
            reason: RejectReason::DuplicateIdentity,
            raw: Some(raw),
        });
    }

    /// Builds the identity key for a translated row, or `None` when
    /// de-duplication does not apply (no identity columns configured, or
    /// every identity cell absent).
    fn identity_key(&self, cells: &[CellValue]) -> Option<String> {
        if self.config.identity_columns.is_empty() {
            return None;
        }
        let mut parts = Vec::with_capacity(self.config.identity_columns.len());
        let mut any_present = false;
        for column in &self.config.identity_columns {
            let value = self
                .identity_position(column)
                .and_then(|position| cells.get(position))
                .cloned()
                .unwrap_or(CellValue::Absent);
            if !value.is_absent() {
                any_present = true;
            }
            parts.push(value.to_string());
        }
        if !any_present {
            return None;
        }
        let mut key = String::new();
        for (idx, part) in parts.iter().enumerate() {
            if idx > 0 {
                key.push(KEY_SEPARATOR);
            }
            key.push_str(part);
        }
        Some(key)
    }

    /// Identity columns are configured by canonical name; fall back to
    /// normalised lookup so `ID` still keys a schema that adopted `Id`.
    fn identity_position(&self, name: &str) -> Option<usize> {
        self.schema.position(name).or_else(|| {
            let normalized = reconcile::normalize_name(name);
            self.schema
                .columns()
                .iter()
                .position(|column| reconcile::normalize_name(column) == normalized)
        })
    }

    fn render_row(&self, cells: &[CellValue]) -> String {
        let mut parts = Vec::new();
        for (idx, column) in self.schema.columns().iter().enumerate() {
            if let Some(value) = cells.get(idx) {
                if !value.is_absent() {
                    parts.push(format!("{column}={value}"));
                }
            }
        }
        parts.join("; ")
    }

    /// Finalizes the run: back-fills every row to the final schema width so
    /// the table is rectangular, and hands out the rejection report.
    #[instrument(level = "info", skip_all)]
    pub fn finish(self) -> Compilation {
        let width = self.schema.len();
        let mut rows = Vec::new();
        for slot in self.rows.into_iter().flatten() {
            let mut cells = slot.cells;
            cells.resize(width, CellValue::Absent);
            rows.push(cells);
        }
        info!(
            files = self.files_seen,
            columns = width,
            rows = rows.len(),
            rejections = self.rejections.len(),
            "compilation finished"
        );
        Compilation {
            table: CompiledTable {
                columns: self.schema.into_columns(),
                rows,
            },
            rejections: self.rejections,
        }
    }
}

/// One-shot convenience: validates the configuration, folds every file in
/// the order supplied, and finalizes. Callers needing a deterministic
/// outcome must supply files in a deterministic order.
pub fn compile_files<I>(config: CompileConfig, files: I) -> Result<Compilation>
where
    I: IntoIterator<Item = RawFile>,
{
    let mut compiler = Compiler::new(config)?;
    for file in files {
        compiler.add_file(&file);
    }
    Ok(compiler.finish())
}
