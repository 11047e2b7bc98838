use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::Path;

use calamine::{DataType, Reader, Xlsx};
use regex::Regex;
use tracing::debug;

use crate::error::ParseError;
use crate::model::{CellValue, ColumnDef, ColumnSchema, RawFile, Record};

/// Rows scanned from the top of a sheet when looking for the header row.
pub const HEADER_SCAN_WINDOW: usize = 32;

/// One parsed sheet: its name, the detected column layout, and the data
/// rows extracted below the header.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSheet {
    pub sheet_name: String,
    pub schema: ColumnSchema,
    pub records: Vec<Record>,
}

/// Extracts every eligible sheet of a workbook into records.
///
/// Sheets whose names do not match `sheet_filter` are skipped and logged.
/// The workbook fails with [`ParseError::NoHeaderFound`] only when at least
/// one sheet was eligible but none contained a recognisable header row; a
/// workbook where the filter excluded every sheet parses to an empty list.
pub fn parse_workbook(
    file: &RawFile,
    min_fill_ratio: f64,
    sheet_filter: Option<&Regex>,
) -> Result<Vec<ParsedSheet>, ParseError> {
    if !has_supported_extension(&file.id) {
        return Err(ParseError::UnsupportedFormat(file.id.clone()));
    }

    let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(file.bytes.as_slice()))
        .map_err(|error| ParseError::Unreadable(error.to_string()))?;

    let sheet_names = workbook.sheet_names().to_owned();
    let mut sheets = Vec::new();
    let mut eligible = 0usize;

    for sheet_name in sheet_names {
        if let Some(pattern) = sheet_filter {
            if !pattern.is_match(&sheet_name) {
                debug!(file = %file.id, sheet = %sheet_name, "sheet skipped by name filter");
                continue;
            }
        }
        eligible += 1;

        let range = match workbook.worksheet_range(&sheet_name) {
            Some(Ok(range)) => range,
            Some(Err(error)) => return Err(ParseError::Unreadable(error.to_string())),
            None => continue,
        };

        match parse_sheet(&sheet_name, &range, min_fill_ratio) {
            Some(sheet) => sheets.push(sheet),
            None => {
                debug!(file = %file.id, sheet = %sheet_name, "no header row detected");
            }
        }
    }

    if sheets.is_empty() && eligible > 0 {
        return Err(ParseError::NoHeaderFound {
            window: HEADER_SCAN_WINDOW,
        });
    }

    Ok(sheets)
}

/// Fraction of a row's cells holding non-empty text. The header detection
/// policy is exactly this ratio compared against the configured minimum.
pub fn header_fill_ratio(row: &[DataType]) -> f64 {
    if row.is_empty() {
        return 0.0;
    }
    let text_cells = row
        .iter()
        .filter(|cell| matches!(cell, DataType::String(value) if !value.trim().is_empty()))
        .count();
    text_cells as f64 / row.len() as f64
}

fn parse_sheet(
    sheet_name: &str,
    range: &calamine::Range<DataType>,
    min_fill_ratio: f64,
) -> Option<ParsedSheet> {
    let rows: Vec<&[DataType]> = range.rows().collect();
    let header_idx = rows
        .iter()
        .take(HEADER_SCAN_WINDOW)
        .position(|row| header_fill_ratio(row) >= min_fill_ratio)?;

    // Row numbers are reported 1-based and absolute to the sheet, so the
    // offset of the used range has to be added back.
    let base_row = range.start().map(|(row, _)| row).unwrap_or(0);
    let schema = build_schema(rows[header_idx]);

    let mut records = Vec::new();
    for (offset, row) in rows.iter().enumerate().skip(header_idx + 1) {
        if row.iter().all(cell_is_empty) {
            continue;
        }
        let cells = schema
            .columns
            .iter()
            .map(|column| (column.name.clone(), convert_cell(row.get(column.index))))
            .collect();
        records.push(Record {
            row: base_row + offset as u32 + 1,
            cells,
        });
    }

    Some(ParsedSheet {
        sheet_name: sheet_name.to_string(),
        schema,
        records,
    })
}

/// Derives column names from the header row. Duplicate names get an
/// occurrence suffix and every occurrence is flagged ambiguous; blank
/// header cells get a positional placeholder, also flagged ambiguous.
fn build_schema(header: &[DataType]) -> ColumnSchema {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    let mut first_seen: BTreeMap<String, usize> = BTreeMap::new();
    let mut columns: Vec<ColumnDef> = Vec::with_capacity(header.len());

    for (index, cell) in header.iter().enumerate() {
        let raw = match cell {
            DataType::String(value) => value.trim().to_string(),
            DataType::Empty => String::new(),
            other => other.to_string().trim().to_string(),
        };

        if raw.is_empty() {
            columns.push(ColumnDef {
                name: format!("Column{}", index + 1),
                index,
                ambiguous: true,
            });
            continue;
        }

        let seen = counts.entry(raw.clone()).or_insert(0);
        *seen += 1;
        if *seen == 1 {
            first_seen.insert(raw.clone(), columns.len());
            columns.push(ColumnDef {
                name: raw,
                index,
                ambiguous: false,
            });
        } else {
            if let Some(&first) = first_seen.get(&raw) {
                columns[first].ambiguous = true;
            }
            columns.push(ColumnDef {
                name: format!("{raw}_{seen}"),
                index,
                ambiguous: true,
            });
        }
    }

    ColumnSchema { columns }
}

/// Coerces a cell to a typed value using the engine's native cell type,
/// never by inspecting strings, so locale quirks cannot leak in.
fn convert_cell(cell: Option<&DataType>) -> CellValue {
    match cell {
        None | Some(DataType::Empty) => CellValue::Absent,
        Some(DataType::String(value)) => {
            if value.trim().is_empty() {
                CellValue::Absent
            } else {
                CellValue::Text(value.clone())
            }
        }
        Some(DataType::Float(value)) => CellValue::Number(*value),
        Some(DataType::Int(value)) => CellValue::Number(*value as f64),
        Some(DataType::Bool(value)) => CellValue::Bool(*value),
        Some(other) => match other.as_datetime() {
            Some(stamp) => CellValue::Date(stamp),
            None => CellValue::Text(other.to_string()),
        },
    }
}

fn cell_is_empty(cell: &DataType) -> bool {
    match cell {
        DataType::Empty => true,
        DataType::String(value) => value.trim().is_empty(),
        _ => false,
    }
}

fn has_supported_extension(id: &str) -> bool {
    Path::new(id)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("xlsx") || ext.eq_ignore_ascii_case("xlsm"))
        .unwrap_or(false)
}
