use std::path::Path;

use rust_xlsxwriter::{Table, Workbook, Worksheet};

use crate::compiler::Compilation;
use crate::error::Result;
use crate::model::{CellValue, CompiledTable, RejectionEntry};

const RESULTS_SHEET: &str = "Results";
const REJECTIONS_SHEET: &str = "Rejections";

/// Writes the finished compilation to a workbook: the canonical table on a
/// `Results` sheet and the rejection report on a `Rejections` sheet.
pub fn write_compilation(path: &Path, compilation: &Compilation) -> Result<()> {
    let mut workbook = Workbook::new();

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(RESULTS_SHEET)?;
    write_results(worksheet, &compilation.table)?;

    let worksheet = workbook.add_worksheet();
    worksheet.set_name(REJECTIONS_SHEET)?;
    write_rejections(worksheet, &compilation.rejections)?;

    workbook.save(path)?;
    Ok(())
}

fn write_results(worksheet: &mut Worksheet, table: &CompiledTable) -> Result<()> {
    for (col_idx, header) in table.columns.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, header)?;
    }
    for (row_idx, row) in table.rows.iter().enumerate() {
        for (col_idx, cell) in row.iter().enumerate() {
            write_cell(worksheet, (row_idx + 1) as u32, col_idx as u16, cell)?;
        }
    }

    if !table.columns.is_empty() && !table.rows.is_empty() {
        let mut excel_table = Table::new();
        excel_table.set_autofilter(true);
        let col_end = (table.columns.len() as u16).saturating_sub(1);
        worksheet.add_table(0, 0, table.rows.len() as u32, col_end, &excel_table)?;
    }
    Ok(())
}

fn write_rejections(worksheet: &mut Worksheet, rejections: &[RejectionEntry]) -> Result<()> {
    let headers = ["File", "Row", "Column", "Reason", "Value"];
    for (col_idx, header) in headers.iter().enumerate() {
        worksheet.write_string(0, col_idx as u16, *header)?;
    }
    for (row_idx, entry) in rejections.iter().enumerate() {
        let row = (row_idx + 1) as u32;
        worksheet.write_string(row, 0, &entry.file)?;
        if let Some(source_row) = entry.row {
            worksheet.write_number(row, 1, source_row as f64)?;
        }
        if let Some(column) = &entry.column {
            worksheet.write_string(row, 2, column)?;
        }
        worksheet.write_string(row, 3, &entry.reason.to_string())?;
        if let Some(raw) = &entry.raw {
            worksheet.write_string(row, 4, raw)?;
        }
    }

    if !rejections.is_empty() {
        let mut excel_table = Table::new();
        excel_table.set_autofilter(true);
        let col_end = (headers.len() as u16).saturating_sub(1);
        worksheet.add_table(0, 0, rejections.len() as u32, col_end, &excel_table)?;
    }
    Ok(())
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue) -> Result<()> {
    match cell {
        CellValue::Text(value) => {
            worksheet.write_string(row, col, value)?;
        }
        CellValue::Number(value) => {
            worksheet.write_number(row, col, *value)?;
        }
        CellValue::Bool(value) => {
            worksheet.write_boolean(row, col, *value)?;
        }
        CellValue::Date(value) => {
            worksheet.write_string(row, col, &value.format("%Y-%m-%dT%H:%M:%S").to_string())?;
        }
        CellValue::Absent => {}
    }
    Ok(())
}
