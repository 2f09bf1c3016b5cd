use std::fmt;

#[derive(Debug)]
pub enum IoError {
    /// File extension is neither `.csv` nor `.xlsx`.
    Unsupported { extension: String },
    /// A named sheet was requested but the workbook does not contain it.
    MissingSheet { sheet: String },
    /// The file could not be opened, decoded, or parsed.
    Read(String),
    /// The file could not be written.
    Write(String),
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsupported { extension } => {
                write!(f, "invalid file format '{extension}': please provide a .csv or .xlsx file")
            }
            Self::MissingSheet { sheet } => write!(f, "sheet '{sheet}' does not exist in the workbook"),
            Self::Read(msg) => write!(f, "read error: {msg}"),
            Self::Write(msg) => write!(f, "write error: {msg}"),
        }
    }
}

impl std::error::Error for IoError {}
