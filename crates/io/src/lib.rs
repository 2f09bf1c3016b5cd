// Tabular file I/O for suppression sources and outreach lists

pub mod csv;
pub mod error;
pub mod table;
pub mod xlsx;

use std::path::Path;

pub use error::IoError;
pub use table::Table;
pub use xlsx::{NamedSheet, SectionWorkbook};

/// The two tabular formats accepted everywhere, picked by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Xlsx,
}

impl TableFormat {
    pub fn from_path(path: &str) -> Result<Self, IoError> {
        let extension = Path::new(path)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "csv" => Ok(Self::Csv),
            "xlsx" => Ok(Self::Xlsx),
            _ => Err(IoError::Unsupported { extension }),
        }
    }
}

/// Where the header row lives and which sheet to read (XLSX only).
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub sheet: Option<String>,
    /// Zero-based row index of the header row.
    pub header_row: usize,
}

/// Read a table from bytes already fetched from storage. `name` is only used to
/// pick the format.
pub fn read_table_bytes(name: &str, bytes: &[u8], options: &ReadOptions) -> Result<Table, IoError> {
    match TableFormat::from_path(name)? {
        TableFormat::Csv => csv::read_bytes(bytes, options.header_row),
        TableFormat::Xlsx => xlsx::read_bytes(bytes.to_vec(), options),
    }
}

/// Read a table from a local file, first sheet, header on the first row.
pub fn read_table(path: &Path) -> Result<Table, IoError> {
    let name = path.to_string_lossy();
    let format = TableFormat::from_path(&name)?;
    let bytes = std::fs::read(path).map_err(|e| IoError::Read(format!("{}: {e}", path.display())))?;
    match format {
        TableFormat::Csv => csv::read_bytes(&bytes, 0),
        TableFormat::Xlsx => xlsx::read_bytes(bytes, &ReadOptions::default()),
    }
}

/// Write a table in the format implied by the path's extension.
pub fn write_table(table: &Table, path: &Path) -> Result<(), IoError> {
    match TableFormat::from_path(&path.to_string_lossy())? {
        TableFormat::Csv => csv::write(table, path),
        TableFormat::Xlsx => xlsx::write(table, path),
    }
}
