// Excel import (xlsx via calamine) and export (xlsx via rust_xlsxwriter)
//
// Import flattens every cell to text. Export writes every cell as a string so
// phone numbers and zero-padded identifiers survive a round trip untouched.

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader, Sheets};
use rust_xlsxwriter::{Workbook as XlsxWorkbook, Worksheet};

use crate::error::IoError;
use crate::table::Table;
use crate::ReadOptions;

/// Excel's hard row limit.
const MAX_ROWS: usize = 1_048_576;

/// One named worksheet as raw rows, no header semantics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NamedSheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

/// Every sheet of a workbook in workbook order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionWorkbook {
    pub sheets: Vec<NamedSheet>,
}

impl SectionWorkbook {
    pub fn sheet(&self, name: &str) -> Option<&NamedSheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    /// Replace the rows of `name`, appending the sheet when it does not exist.
    pub fn replace_sheet(&mut self, name: &str, rows: Vec<Vec<String>>) {
        match self.sheets.iter_mut().find(|s| s.name == name) {
            Some(sheet) => sheet.rows = rows,
            None => self.sheets.push(NamedSheet {
                name: name.to_string(),
                rows,
            }),
        }
    }
}

fn open(bytes: Vec<u8>) -> Result<Sheets<Cursor<Vec<u8>>>, IoError> {
    open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| IoError::Read(format!("Failed to open Excel file: {e}")))
}

/// Read one worksheet (named, or the first) into a table.
pub fn read_bytes(bytes: Vec<u8>, options: &ReadOptions) -> Result<Table, IoError> {
    let mut workbook = open(bytes)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let sheet_name = match &options.sheet {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(IoError::MissingSheet { sheet: name.clone() });
            }
            name.clone()
        }
        None => sheet_names
            .first()
            .cloned()
            .ok_or_else(|| IoError::Read("Excel file contains no sheets".to_string()))?,
    };

    let rows = read_sheet_rows(&mut workbook, &sheet_name)?;
    let mut table = Table::default();
    let mut iter = rows.into_iter().skip(options.header_row);
    if let Some(header) = iter.next() {
        table.headers = header.into_iter().map(|h| h.trim().to_string()).collect();
    }
    for row in iter {
        if row.iter().all(|c| c.trim().is_empty()) {
            continue;
        }
        table.push_row(row);
    }
    Ok(table)
}

pub fn read(path: &Path) -> Result<Table, IoError> {
    let bytes = std::fs::read(path).map_err(|e| IoError::Read(format!("{}: {e}", path.display())))?;
    read_bytes(bytes, &ReadOptions::default())
}

/// Read every sheet as raw rows.
pub fn read_workbook_bytes(bytes: Vec<u8>) -> Result<SectionWorkbook, IoError> {
    let mut workbook = open(bytes)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let mut out = SectionWorkbook::default();
    for name in sheet_names {
        let rows = read_sheet_rows(&mut workbook, &name)?;
        out.sheets.push(NamedSheet { name, rows });
    }
    Ok(out)
}

/// Dense rows in absolute sheet coordinates (data may not begin at A1).
fn read_sheet_rows(
    workbook: &mut Sheets<Cursor<Vec<u8>>>,
    sheet_name: &str,
) -> Result<Vec<Vec<String>>, IoError> {
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| IoError::Read(format!("Failed to read sheet '{sheet_name}': {e}")))?;

    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return Ok(Vec::new());
    }

    let (data_start_row, data_start_col) = range.start().unwrap_or((0, 0));
    let mut rows: Vec<Vec<String>> = vec![Vec::new(); data_start_row as usize];

    for row in range.rows() {
        let mut cells = vec![String::new(); data_start_col as usize];
        cells.extend(row.iter().map(cell_to_string));
        while cells.last().is_some_and(|c| c.is_empty()) {
            cells.pop();
        }
        rows.push(cells);
    }
    Ok(rows)
}

fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(n) => {
            // Integers without decimals
            if n.fract() == 0.0 && n.abs() < 1e15 {
                format!("{}", *n as i64)
            } else {
                format!("{}", n)
            }
        }
        Data::Int(n) => n.to_string(),
        Data::Bool(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
        Data::Error(e) => format!("#{:?}", e),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => ndt.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format!("{}", dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
    }
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<(), IoError> {
    if rows.len() > MAX_ROWS {
        return Err(IoError::Write(format!(
            "{} rows exceed the Excel limit of {MAX_ROWS}",
            rows.len()
        )));
    }
    for (r, row) in rows.iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            if value.is_empty() {
                continue;
            }
            worksheet
                .write_string(r as u32, c as u16, value)
                .map_err(|e| IoError::Write(format!("Failed to write cell: {e}")))?;
        }
    }
    Ok(())
}

fn table_rows(table: &Table) -> Vec<Vec<String>> {
    let mut rows = Vec::with_capacity(table.rows.len() + 1);
    rows.push(table.headers.clone());
    rows.extend(table.rows.iter().cloned());
    rows
}

/// Write a single-sheet workbook with the header on the first row.
pub fn write(table: &Table, path: &Path) -> Result<(), IoError> {
    let mut workbook = XlsxWorkbook::new();
    let worksheet = workbook.add_worksheet();
    write_rows(worksheet, &table_rows(table))?;
    workbook
        .save(path)
        .map_err(|e| IoError::Write(format!("Failed to save {}: {e}", path.display())))
}

/// Serialize every sheet, in order, into xlsx bytes.
pub fn write_workbook_bytes(sections: &SectionWorkbook) -> Result<Vec<u8>, IoError> {
    let mut workbook = XlsxWorkbook::new();
    for sheet in &sections.sheets {
        let worksheet = workbook
            .add_worksheet()
            .set_name(&sheet.name)
            .map_err(|e| IoError::Write(format!("Failed to create sheet '{}': {}", sheet.name, e)))?;
        write_rows(worksheet, &sheet.rows)?;
    }
    workbook
        .save_to_buffer()
        .map_err(|e| IoError::Write(format!("Failed to serialize workbook: {e}")))
}
