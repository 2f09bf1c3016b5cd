//! Object-store seam. The engine lists, downloads and uploads through
//! [`ObjectStore`]; remote backends live outside this crate.
//!
//! Paths are `/`-separated store paths (`/sources/jc/export.xlsx`), never
//! local filesystem paths.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::error::StorageError;

/// One listing entry. `modified` is UTC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Entry {
    File {
        path: String,
        modified: NaiveDateTime,
        size: u64,
    },
    Folder {
        path: String,
    },
}

/// One page of a folder listing. A `Some` cursor means more pages follow.
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    pub entries: Vec<Entry>,
    pub cursor: Option<String>,
}

pub trait ObjectStore {
    /// List one page of the immediate children of `path`.
    fn list_folder(&self, path: &str, cursor: Option<&str>) -> Result<ListPage, StorageError>;

    fn download(&self, path: &str) -> Result<Vec<u8>, StorageError>;

    /// Write `bytes` at `path`, overwriting anything already there.
    fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError>;

    fn metadata(&self, path: &str) -> Result<Entry, StorageError>;
}

/// Join a store folder path and a child name.
pub fn join(folder: &str, name: &str) -> String {
    format!("{}/{}", folder.trim_end_matches('/'), name.trim_start_matches('/'))
}

/// Final path component of a store path.
pub fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

// ---------------------------------------------------------------------------
// Local directory backend
// ---------------------------------------------------------------------------

/// An [`ObjectStore`] over a local directory. Listings come back in name order,
/// `page_size` entries at a time, with the next offset as cursor.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
    page_size: usize,
}

impl LocalStore {
    pub const DEFAULT_PAGE_SIZE: usize = 500;

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            page_size: Self::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let mut local = self.root.clone();
        for part in path.split('/').filter(|p| !p.is_empty() && *p != "." && *p != "..") {
            local.push(part);
        }
        local
    }

    fn entry_for(&self, store_path: String, local: &std::path::Path) -> Result<Entry, StorageError> {
        let meta = fs::metadata(local).map_err(|e| classify(&store_path, e))?;
        if meta.is_dir() {
            return Ok(Entry::Folder { path: store_path });
        }
        let modified = meta
            .modified()
            .map(|t| DateTime::<Utc>::from(t).naive_utc())
            .map_err(|e| classify(&store_path, e))?;
        Ok(Entry::File {
            path: store_path,
            modified,
            size: meta.len(),
        })
    }
}

fn classify(path: &str, err: std::io::Error) -> StorageError {
    if err.kind() == std::io::ErrorKind::NotFound {
        StorageError::NotFound(path.to_string())
    } else {
        StorageError::Access {
            path: path.to_string(),
            message: err.to_string(),
        }
    }
}

impl ObjectStore for LocalStore {
    fn list_folder(&self, path: &str, cursor: Option<&str>) -> Result<ListPage, StorageError> {
        let local = self.resolve(path);
        let mut names: Vec<String> = fs::read_dir(&local)
            .map_err(|e| classify(path, e))?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();

        let offset = match cursor {
            Some(c) => c.parse::<usize>().map_err(|_| StorageError::Access {
                path: path.to_string(),
                message: format!("invalid listing cursor '{c}'"),
            })?,
            None => 0,
        };
        let end = (offset + self.page_size).min(names.len());
        let mut entries = Vec::with_capacity(end.saturating_sub(offset));
        for name in names.iter().take(end).skip(offset) {
            entries.push(self.entry_for(join(path, name), &local.join(name))?);
        }
        let cursor = (end < names.len()).then(|| end.to_string());
        Ok(ListPage { entries, cursor })
    }

    fn download(&self, path: &str) -> Result<Vec<u8>, StorageError> {
        fs::read(self.resolve(path)).map_err(|e| classify(path, e))
    }

    fn upload(&self, path: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let local = self.resolve(path);
        if let Some(parent) = local.parent() {
            fs::create_dir_all(parent).map_err(|e| classify(path, e))?;
        }
        fs::write(&local, bytes).map_err(|e| classify(path, e))
    }

    fn metadata(&self, path: &str) -> Result<Entry, StorageError> {
        self.entry_for(path.to_string(), &self.resolve(path))
    }
}
