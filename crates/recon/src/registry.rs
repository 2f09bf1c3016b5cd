//! Suppression registry: the persisted, section-partitioned workbook, and the
//! builder that refreshes it from the channel exports in the store.

use std::collections::{BTreeMap, BTreeSet};

use listscrub_io::{read_table_bytes, xlsx, SectionWorkbook, Table};
use serde::Serialize;

use crate::config::{EngineConfig, SectionSheets};
use crate::error::{ScrubError, StorageError};
use crate::locator::{LocatedFile, SourceLocator};
use crate::model::{ChannelKind, ChannelOutput, RunClock, Section};
use crate::normalize::{normalizer_for, NormalizeContext};
use crate::phone::{canonical_identifier, canonical_number, DigitRule};
use crate::store::{self, ObjectStore};

/// Section name to set of canonical entries. Sets keep each section free of
/// duplicates and give a stable, sorted sheet order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuppressionRegistry {
    sections: BTreeMap<Section, BTreeSet<String>>,
}

impl SuppressionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every section sheet present in `workbook`. Cells that are not a
    /// canonical entry for their section (headers, notes) are ignored.
    pub fn from_workbook(workbook: &SectionWorkbook, sheets: &SectionSheets) -> Self {
        let mut registry = Self::new();
        for section in Section::ALL {
            let Some(sheet) = workbook.sheet(sheets.name(section)) else {
                continue;
            };
            for cell in sheet.rows.iter().filter_map(|row| row.first()) {
                if let Some(value) = canonical_entry(section, cell) {
                    registry.insert(section, value);
                }
            }
        }
        registry
    }

    pub fn section(&self, section: Section) -> Option<&BTreeSet<String>> {
        self.sections.get(&section)
    }

    pub fn insert(&mut self, section: Section, value: impl Into<String>) -> bool {
        self.sections.entry(section).or_default().insert(value.into())
    }

    /// Add `values` to a section, returning how many were new.
    pub fn extend(&mut self, section: Section, values: BTreeSet<String>) -> usize {
        let entries = self.sections.entry(section).or_default();
        let before = entries.len();
        entries.extend(values);
        entries.len() - before
    }

    /// Replace a section's contents wholesale.
    pub fn replace(&mut self, section: Section, values: BTreeSet<String>) {
        self.sections.insert(section, values);
    }

    /// Whether `number` is in any phone-bearing section.
    pub fn contains_number(&self, number: &str) -> bool {
        self.sections
            .iter()
            .any(|(section, values)| section.is_phone_bearing() && values.contains(number))
    }

    pub fn contains_identifier(&self, id: &str) -> bool {
        self.section(Section::UniqueId).is_some_and(|ids| ids.contains(id))
    }

    pub fn len(&self) -> usize {
        self.sections.values().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Overwrite each section's sheet in `workbook` (header row first), leaving
    /// any other sheet untouched.
    pub fn write_into(&self, workbook: &mut SectionWorkbook, sheets: &SectionSheets) {
        for section in Section::ALL {
            let values = self.section(section).cloned().unwrap_or_default();
            let mut rows = Vec::with_capacity(values.len() + 1);
            rows.push(vec![section.column_header().to_string()]);
            rows.extend(values.into_iter().map(|v| vec![v]));
            workbook.replace_sheet(sheets.name(section), rows);
        }
    }
}

fn canonical_entry(section: Section, cell: &str) -> Option<String> {
    if section.is_phone_bearing() {
        canonical_number(cell, DigitRule::STANDARD)
    } else {
        canonical_identifier(cell)
    }
}

// ---------------------------------------------------------------------------
// Build context
// ---------------------------------------------------------------------------

/// Everything one build accumulates before the single final write. Entries
/// are added to what the template already holds. The rolling outbound section
/// is the exception: when fed, it is rebuilt from this run's windowed numbers
/// so entries older than their window fall out.
#[derive(Debug, Default)]
pub struct BuildContext {
    fed: BTreeMap<Section, BTreeSet<String>>,
    pub sources: Vec<String>,
    pub dropped: usize,
}

impl BuildContext {
    pub fn merge(&mut self, output: ChannelOutput) {
        self.dropped += output.dropped;
        self.fed
            .entry(output.channel.primary_section())
            .or_default()
            .extend(output.unconditional);
        if output.channel.emits_outbound() {
            self.fed
                .entry(Section::RollingOutbound)
                .or_default()
                .extend(output.windowed);
        }
    }

    pub fn fed_sections(&self) -> impl Iterator<Item = Section> + '_ {
        self.fed.keys().copied()
    }

    pub fn apply(self, registry: &mut SuppressionRegistry) {
        for (section, values) in self.fed {
            if section == Section::RollingOutbound {
                log::info!("Rebuilding section {section}: {} entries", values.len());
                registry.replace(section, values);
            } else {
                let total = values.len();
                let added = registry.extend(section, values);
                log::info!("Adding section {section}: {added} new of {total} entries");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LastUpdated {
    last_updated: String,
}

/// What a finished build produced.
#[derive(Debug)]
pub struct BuildReport {
    pub registry: SuppressionRegistry,
    /// Serialized workbook exactly as uploaded.
    pub workbook_bytes: Vec<u8>,
    pub artifact_path: String,
    pub sources: Vec<String>,
    pub last_updated: String,
}

pub struct RegistryBuilder<'a> {
    store: &'a dyn ObjectStore,
    config: &'a EngineConfig,
    clock: RunClock,
}

impl<'a> RegistryBuilder<'a> {
    pub fn new(store: &'a dyn ObjectStore, config: &'a EngineConfig, clock: RunClock) -> Self {
        Self { store, config, clock }
    }

    /// Refresh the registry under `root` and persist it. Nothing is written to
    /// the store unless every source was read and normalized.
    pub fn build(&self, root: &str) -> Result<BuildReport, ScrubError> {
        let sheets = &self.config.registry.sheets;
        let artifact_path = store::join(root, &self.config.registry.artifact);
        let mut workbook = self.load_template(&artifact_path)?;
        let mut registry = SuppressionRegistry::from_workbook(&workbook, sheets);

        let locator = SourceLocator::new(self.store, &self.config.folders);
        let mut ctx = BuildContext::default();

        for file in locator.locate(root)? {
            log::info!("Processing file {} ({})", file.path, file.channel);
            let Some(table) = self.download_table(&file)? else {
                continue;
            };
            self.normalize_into(&mut ctx, file.channel, &table, Some(file.modified))?;
            ctx.sources.push(file.path);
        }

        for channel in self.config.folders.concatenated_channels() {
            let folder = store::join(root, channel.folder_key());
            let files = match locator.concat_all(&folder) {
                Ok(files) => files,
                Err(e) => {
                    log::warn!("Skipping {folder}: {e}");
                    continue;
                }
            };
            if files.is_empty() {
                log::warn!("No files in {folder}");
                continue;
            }
            let mut tables = Vec::with_capacity(files.len());
            for file in &files {
                log::info!("Processing file {} ({})", file.path, file.channel);
                if let Some(table) = self.download_table(file)? {
                    tables.push(table);
                    ctx.sources.push(file.path.clone());
                }
            }
            let newest = files.iter().map(|f| f.modified).max();
            self.normalize_into(&mut ctx, channel, &Table::union(tables), newest)?;
        }

        let fed: Vec<Section> = ctx.fed_sections().collect();
        if fed.is_empty() {
            log::warn!("No channel exports found under {root}; registry sections carried over");
        }
        let sources = std::mem::take(&mut ctx.sources);
        if ctx.dropped > 0 {
            log::info!("Dropped {} values that could not be normalized", ctx.dropped);
        }
        ctx.apply(&mut registry);

        registry.write_into(&mut workbook, sheets);
        let workbook_bytes = xlsx::write_workbook_bytes(&workbook)?;
        let last_updated = self.clock.local.format("%Y-%m-%d %H:%M").to_string();
        let status = serde_json::to_vec_pretty(&LastUpdated {
            last_updated: last_updated.clone(),
        })
        .map_err(|e| StorageError::Access {
            path: self.config.registry.last_updated_file.clone(),
            message: e.to_string(),
        })?;

        // Both payloads are serialized before anything is written. The artifact
        // goes first so a failed upload never stamps a fresh time on an old registry.
        self.store.upload(&artifact_path, &workbook_bytes)?;
        log::info!("Uploaded {artifact_path} ({} entries)", registry.len());
        self.store
            .upload(&store::join(root, &self.config.registry.last_updated_file), &status)?;

        Ok(BuildReport {
            registry,
            workbook_bytes,
            artifact_path,
            sources,
            last_updated,
        })
    }

    /// The stored registry, or an empty workbook on the very first build.
    fn load_template(&self, path: &str) -> Result<SectionWorkbook, ScrubError> {
        match self.store.download(path) {
            Ok(bytes) => Ok(xlsx::read_workbook_bytes(bytes)?),
            Err(StorageError::NotFound(_)) => {
                log::warn!("No registry at {path}; starting from an empty workbook");
                Ok(SectionWorkbook::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Download and parse one export. A storage failure skips the file;
    /// a format failure aborts the build.
    fn download_table(&self, file: &LocatedFile) -> Result<Option<Table>, ScrubError> {
        let bytes = match self.store.download(&file.path) {
            Ok(bytes) => bytes,
            Err(e) => {
                log::warn!("Skipping {}: {e}", file.path);
                return Ok(None);
            }
        };
        let options = normalizer_for(file.channel, &self.config.windows).read_options();
        Ok(Some(read_table_bytes(&file.path, &bytes, &options)?))
    }

    fn normalize_into(
        &self,
        ctx: &mut BuildContext,
        channel: ChannelKind,
        table: &Table,
        ingest_time: Option<chrono::NaiveDateTime>,
    ) -> Result<(), ScrubError> {
        let normalizer = normalizer_for(channel, &self.config.windows);
        let output = normalizer.normalize(
            table,
            &NormalizeContext {
                clock: self.clock,
                ingest_time,
            },
        )?;
        ctx.merge(output);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::InclusionPolicy;
    use listscrub_io::NamedSheet;

    fn output(channel: ChannelKind, unconditional: &[&str], windowed: &[&str]) -> ChannelOutput {
        let mut out = ChannelOutput::new(channel, InclusionPolicy::Unconditional);
        out.unconditional = unconditional.iter().map(|s| s.to_string()).collect();
        out.windowed = windowed.iter().map(|s| s.to_string()).collect();
        out
    }

    #[test]
    fn loads_sections_skipping_headers() {
        let sheets = SectionSheets::default();
        let workbook = SectionWorkbook {
            sheets: vec![
                NamedSheet {
                    name: "DNC".into(),
                    rows: vec![vec!["Phone Number".into()], vec!["5550000001".into()], vec!["5550000001.0".into()]],
                },
                NamedSheet {
                    name: "UniqueDB ID".into(),
                    rows: vec![vec!["Deal - Unique Database ID".into()], vec!["0042".into()]],
                },
                NamedSheet {
                    name: "Notes".into(),
                    rows: vec![vec!["5559999999".into()]],
                },
            ],
        };
        let registry = SuppressionRegistry::from_workbook(&workbook, &sheets);
        assert_eq!(registry.len(), 2);
        assert!(registry.contains_number("5550000001"));
        assert!(registry.contains_identifier("42"));
        assert!(!registry.contains_number("5559999999"));
    }

    #[test]
    fn identifiers_never_match_as_numbers() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::UniqueId, "5551234567");
        assert!(!registry.contains_number("5551234567"));
        registry.insert(Section::FromOtherList, "5551234567");
        assert!(registry.contains_number("5551234567"));
    }

    #[test]
    fn context_routes_outputs_to_sections() {
        let mut ctx = BuildContext::default();
        ctx.merge(output(ChannelKind::Rc, &["5550000001"], &["5550000002"]));
        ctx.merge(output(ChannelKind::Mvp, &["5550000001", "5550000003"], &[]));
        ctx.merge(output(ChannelKind::PdDb, &["17"], &[]));

        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::General, "5559999999");
        registry.insert(Section::Dnc, "5558888888");
        ctx.apply(&mut registry);

        let general: Vec<_> = registry.section(Section::General).unwrap().iter().cloned().collect();
        assert_eq!(general, ["5550000001", "5550000003", "5559999999"]);
        assert!(registry.section(Section::RollingOutbound).unwrap().contains("5550000002"));
        assert!(registry.contains_identifier("17"));
        assert!(registry.section(Section::Dnc).unwrap().contains("5558888888"));
    }

    #[test]
    fn rolling_outbound_is_rebuilt_when_fed() {
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::RollingOutbound, "5557777777");
        registry.insert(Section::General, "5556666666");

        let mut ctx = BuildContext::default();
        ctx.merge(output(ChannelKind::ContactCenter, &["5556666666"], &["5550000002"]));
        ctx.apply(&mut registry);

        let outbound: Vec<_> = registry.section(Section::RollingOutbound).unwrap().iter().cloned().collect();
        assert_eq!(outbound, ["5550000002"]);
        assert_eq!(registry.section(Section::General).unwrap().len(), 1);
    }

    #[test]
    fn write_into_keeps_foreign_sheets() {
        let sheets = SectionSheets::default();
        let mut workbook = SectionWorkbook {
            sheets: vec![NamedSheet {
                name: "Readme".into(),
                rows: vec![vec!["hello".into()]],
            }],
        };
        let mut registry = SuppressionRegistry::new();
        registry.insert(Section::General, "5550000001");
        registry.write_into(&mut workbook, &sheets);

        assert_eq!(workbook.sheets.len(), 7);
        assert_eq!(workbook.sheets[0].name, "Readme");
        let general = workbook.sheet("ContMgt+MVP+JC+PD+RC").unwrap();
        assert_eq!(general.rows, vec![vec!["Phone Number".to_string()], vec!["5550000001".to_string()]]);
        let reloaded = SuppressionRegistry::from_workbook(&workbook, &sheets);
        assert_eq!(reloaded.len(), 1);
        assert!(reloaded.contains_number("5550000001"));
    }
}
