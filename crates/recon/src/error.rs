use std::fmt;

use listscrub_io::IoError;

/// A failure reported by the backing object store for one path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    NotFound(String),
    Access { path: String, message: String },
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(path) => write!(f, "path not found: {path}"),
            Self::Access { path, message } => write!(f, "error accessing path '{path}': {message}"),
        }
    }
}

impl std::error::Error for StorageError {}

#[derive(Debug)]
pub enum ScrubError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Config validation error (bad window, duplicate sheet name, etc.).
    ConfigValidation(String),
    /// Unsupported file, unreadable table, or missing sheet.
    Format(IoError),
    /// Required column missing in a source or candidate file.
    MissingColumn { source: String, column: String },
    /// A single storage path failed.
    Storage(StorageError),
    /// The root of the storage tree could not be resolved at all.
    RootUnavailable { path: String, message: String },
    /// Disposition database query failure.
    Disposition(String),
}

impl fmt::Display for ScrubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::Format(e) => write!(f, "format error: {e}"),
            Self::MissingColumn { source, column } => {
                write!(f, "'{source}': missing column '{column}'")
            }
            Self::Storage(e) => write!(f, "storage error: {e}"),
            Self::RootUnavailable { path, message } => {
                write!(f, "cannot resolve root path '{path}': {message}")
            }
            Self::Disposition(msg) => write!(f, "disposition source error: {msg}"),
        }
    }
}

impl std::error::Error for ScrubError {}

impl From<IoError> for ScrubError {
    fn from(e: IoError) -> Self {
        Self::Format(e)
    }
}

impl From<StorageError> for ScrubError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<rusqlite::Error> for ScrubError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Disposition(e.to_string())
    }
}

/// The single terminal failure signal handed to the invoking layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolFailure {
    pub message: String,
}

impl fmt::Display for ToolFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tool failed: {}", self.message)
    }
}

impl std::error::Error for ToolFailure {}

impl From<ScrubError> for ToolFailure {
    fn from(e: ScrubError) -> Self {
        Self { message: e.to_string() }
    }
}
