//! Source Locator: walks the store tree and picks which export files feed
//! the registry.
//!
//! A folder named after a single-latest channel contributes its newest file.
//! Concatenation folders live at fixed paths under the root and contribute
//! every file through [`SourceLocator::concat_all`].

use chrono::NaiveDateTime;
use listscrub_io::TableFormat;

use crate::config::FolderConfig;
use crate::error::{ScrubError, StorageError};
use crate::model::ChannelKind;
use crate::store::{self, Entry, ObjectStore};

/// A file selected for normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocatedFile {
    pub path: String,
    pub channel: ChannelKind,
    /// Last-modified time in the store (UTC).
    pub modified: NaiveDateTime,
}

pub struct SourceLocator<'a> {
    store: &'a dyn ObjectStore,
    folders: &'a FolderConfig,
}

impl<'a> SourceLocator<'a> {
    pub fn new(store: &'a dyn ObjectStore, folders: &'a FolderConfig) -> Self {
        Self { store, folders }
    }

    /// Every entry of `folder`, all pages drained.
    fn list_all(&self, folder: &str) -> Result<Vec<Entry>, StorageError> {
        let mut entries = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = self.store.list_folder(folder, cursor.as_deref())?;
            entries.extend(page.entries);
            match page.cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(entries),
            }
        }
    }

    /// Lazily walk the tree under `root`, yielding the newest file of each
    /// single-latest channel folder. Fails only if `root` itself cannot be listed.
    pub fn locate(&self, root: &str) -> Result<Locate<'_, 'a>, ScrubError> {
        let entries = self.list_all(root).map_err(|e| ScrubError::RootUnavailable {
            path: root.to_string(),
            message: e.to_string(),
        })?;
        Ok(Locate {
            locator: self,
            pending: Vec::new(),
            root: Some((root.to_string(), entries)),
        })
    }

    /// Newest supported file directly in `folder`, if any.
    pub fn single_latest(&self, folder: &str) -> Result<Option<LocatedFile>, StorageError> {
        let entries = self.list_all(folder)?;
        Ok(self.latest_of(folder, &entries))
    }

    /// Every supported file directly in `folder`, in path order.
    pub fn concat_all(&self, folder: &str) -> Result<Vec<LocatedFile>, StorageError> {
        let Some(channel) = ChannelKind::from_folder_key(store::file_name(folder)) else {
            return Ok(Vec::new());
        };
        let mut files: Vec<LocatedFile> = self
            .list_all(folder)?
            .into_iter()
            .filter_map(|entry| as_source_file(entry, channel))
            .collect();
        files.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(files)
    }

    fn latest_of(&self, folder: &str, entries: &[Entry]) -> Option<LocatedFile> {
        let channel = ChannelKind::from_folder_key(store::file_name(folder))?;
        if self.folders.is_concatenated(channel) {
            return None;
        }
        // Ties on modified time go to the lexicographically greatest path.
        entries
            .iter()
            .cloned()
            .filter_map(|entry| as_source_file(entry, channel))
            .max_by(|a, b| a.modified.cmp(&b.modified).then_with(|| a.path.cmp(&b.path)))
    }
}

fn as_source_file(entry: Entry, channel: ChannelKind) -> Option<LocatedFile> {
    match entry {
        Entry::File { path, modified, .. } => {
            if TableFormat::from_path(&path).is_err() {
                log::debug!("Skipping non-tabular file {path}");
                return None;
            }
            Some(LocatedFile {
                path,
                channel,
                modified,
            })
        }
        Entry::Folder { .. } => None,
    }
}

/// Depth-first walk produced by [`SourceLocator::locate`]. Listing happens as
/// the iterator is advanced; a folder that fails to list is logged and skipped.
pub struct Locate<'l, 'a> {
    locator: &'l SourceLocator<'a>,
    pending: Vec<String>,
    root: Option<(String, Vec<Entry>)>,
}

impl Locate<'_, '_> {
    fn visit(&mut self, folder: &str, entries: Vec<Entry>) -> Option<LocatedFile> {
        let picked = self.locator.latest_of(folder, &entries);
        let mut subfolders: Vec<String> = entries
            .into_iter()
            .filter_map(|e| match e {
                Entry::Folder { path } => Some(path),
                Entry::File { .. } => None,
            })
            .collect();
        // Reverse so that popping visits folders in name order.
        subfolders.sort();
        subfolders.reverse();
        self.pending.extend(subfolders);
        picked
    }
}

impl Iterator for Locate<'_, '_> {
    type Item = LocatedFile;

    fn next(&mut self) -> Option<LocatedFile> {
        if let Some((root, entries)) = self.root.take() {
            if let Some(found) = self.visit(&root, entries) {
                return Some(found);
            }
        }
        while let Some(folder) = self.pending.pop() {
            match self.locator.list_all(&folder) {
                Ok(entries) => {
                    if let Some(found) = self.visit(&folder, entries) {
                        return Some(found);
                    }
                }
                Err(e) => log::warn!("Skipping {folder}: {e}"),
            }
        }
        None
    }
}
