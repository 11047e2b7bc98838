#![allow(dead_code)]

use results_compiler::model::RawFile;
use rust_xlsxwriter::Workbook;

/// Fixture cell: string, number, boolean, or empty.
#[derive(Debug, Clone, Copy)]
pub enum Cell {
    S(&'static str),
    N(f64),
    B(bool),
    E,
}

/// Builds a single-sheet workbook in memory.
pub fn sheet_bytes(rows: &[Vec<Cell>]) -> Vec<u8> {
    named_sheets_bytes(&[("Sheet1", rows)])
}

/// Builds a workbook with the given named sheets in memory.
pub fn named_sheets_bytes(sheets: &[(&str, &[Vec<Cell>])]) -> Vec<u8> {
    let mut workbook = Workbook::new();
    for (name, rows) in sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(*name).expect("sheet name");
        for (row_idx, row) in rows.iter().enumerate() {
            for (col_idx, cell) in row.iter().enumerate() {
                let (row_idx, col_idx) = (row_idx as u32, col_idx as u16);
                match cell {
                    Cell::S(value) => {
                        worksheet
                            .write_string(row_idx, col_idx, *value)
                            .expect("write string");
                    }
                    Cell::N(value) => {
                        worksheet
                            .write_number(row_idx, col_idx, *value)
                            .expect("write number");
                    }
                    Cell::B(value) => {
                        worksheet
                            .write_boolean(row_idx, col_idx, *value)
                            .expect("write boolean");
                    }
                    Cell::E => {}
                }
            }
        }
    }
    workbook.save_to_buffer().expect("workbook bytes")
}

pub fn raw(id: &str, bytes: Vec<u8>) -> RawFile {
    RawFile::new(id, bytes)
}

pub fn cols(names: &[&str]) -> Vec<String> {
    names.iter().map(|name| name.to_string()).collect()
}
