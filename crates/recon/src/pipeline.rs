//! Top-level entry points for the invoking layer.
//!
//! Each run either completes fully or logs its error once and reports a single
//! [`ToolFailure`]. Outputs are written only after every input was processed.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use listscrub_io::{read_table, write_table, xlsx, IoError, Table};

use crate::cleaner::{clean, CandidateList, CleanReport};
use crate::config::EngineConfig;
use crate::disposition::{DispositionSets, DispositionSource};
use crate::error::{ScrubError, ToolFailure};
use crate::lookup::{resolve, PhoneIndex};
use crate::model::RunClock;
use crate::registry::{BuildReport, RegistryBuilder, SuppressionRegistry};
use crate::store::{self, ObjectStore};
use crate::tagging::{tag_removal_reasons, tagged_output_name};

fn fail(e: ScrubError) -> ToolFailure {
    log::error!("{e}");
    e.into()
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Write every output, or stop at the first failure.
fn write_all(outputs: &[(PathBuf, Table)]) -> Result<(), ScrubError> {
    for (path, table) in outputs {
        write_table(table, path)?;
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Build
// ---------------------------------------------------------------------------

/// Rebuild the registry under `root`, optionally keeping a local copy of the
/// uploaded workbook.
pub fn run_build(
    store: &dyn ObjectStore,
    root: &str,
    config: &EngineConfig,
    clock: RunClock,
    local_copy: Option<&Path>,
) -> Result<BuildReport, ToolFailure> {
    let report = RegistryBuilder::new(store, config, clock).build(root).map_err(fail)?;
    if let Some(path) = local_copy {
        std::fs::write(path, &report.workbook_bytes)
            .map_err(|e| ScrubError::Format(IoError::Write(format!("{}: {e}", path.display()))))
            .map_err(fail)?;
        log::info!("Saved local copy to {}", path.display());
    }
    Ok(report)
}

// ---------------------------------------------------------------------------
// Clean
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CleanedFile {
    pub input: PathBuf,
    pub output: PathBuf,
    pub report: CleanReport,
}

/// Fetch the persisted registry from the store.
pub fn load_registry(store: &dyn ObjectStore, root: &str, config: &EngineConfig) -> Result<SuppressionRegistry, ScrubError> {
    let path = store::join(root, &config.registry.artifact);
    let workbook = xlsx::read_workbook_bytes(store.download(&path)?)?;
    let registry = SuppressionRegistry::from_workbook(&workbook, &config.registry.sheets);
    log::info!("Loaded registry {path}: {} entries", registry.len());
    Ok(registry)
}

/// Clean each candidate list against the stored registry and the disposition
/// history, writing `<prefix><name>` into `save_dir` in the input's format.
pub fn run_clean(
    store: &dyn ObjectStore,
    root: &str,
    inputs: &[PathBuf],
    save_dir: &Path,
    dispositions: Option<&dyn DispositionSource>,
    config: &EngineConfig,
    clock: RunClock,
) -> Result<Vec<CleanedFile>, ToolFailure> {
    clean_files(store, root, inputs, save_dir, dispositions, config, clock).map_err(fail)
}

fn clean_files(
    store: &dyn ObjectStore,
    root: &str,
    inputs: &[PathBuf],
    save_dir: &Path,
    dispositions: Option<&dyn DispositionSource>,
    config: &EngineConfig,
    clock: RunClock,
) -> Result<Vec<CleanedFile>, ScrubError> {
    let registry = load_registry(store, root, config)?;
    let sets = match dispositions {
        Some(source) => DispositionSets::load(source, &config.disposition, clock.local)?,
        None => {
            log::warn!("No disposition source configured; skipping disposition suppression");
            DispositionSets::default()
        }
    };

    let mut outputs = Vec::with_capacity(inputs.len());
    let mut cleaned = Vec::with_capacity(inputs.len());
    for input in inputs {
        let name = file_name(input);
        log::info!("Processing file {name}");
        let list = CandidateList::from_table(read_table(input)?, &config.cleaner, &name)?;
        let outcome = clean(list, &registry, &sets, &config.cleaner);
        let output = save_dir.join(format!("{}{name}", config.cleaner.output_prefix));
        outputs.push((output.clone(), outcome.survivors.into_table()));
        cleaned.push(CleanedFile {
            input: input.clone(),
            output,
            report: outcome.report,
        });
    }
    write_all(&outputs)?;
    Ok(cleaned)
}

// ---------------------------------------------------------------------------
// Lookup + tagging
// ---------------------------------------------------------------------------

/// Resolve each log against the CRM export at `record_source`, writing
/// `<i>. Text Lookup.xlsx` / `<i>. Call Lookup.xlsx` into `save_dir`.
pub fn run_lookup(
    record_source: &Path,
    logs: &[PathBuf],
    save_dir: &Path,
    config: &EngineConfig,
    today: NaiveDate,
) -> Result<Vec<PathBuf>, ToolFailure> {
    let run = || -> Result<Vec<PathBuf>, ScrubError> {
        let index = PhoneIndex::build(&read_table(record_source)?, &config.lookup)?;
        log::info!("Indexed {} phones from {}", index.len(), record_source.display());

        let mut outputs = Vec::with_capacity(logs.len());
        for (i, log_path) in logs.iter().enumerate() {
            let name = file_name(log_path);
            log::info!("Processing {name}");
            let resolved = resolve(&read_table(log_path)?, &index, &config.lookup, today, &name)?;
            outputs.push((save_dir.join(resolved.output_name(i + 1)), resolved.table));
        }
        write_all(&outputs)?;
        Ok(outputs.into_iter().map(|(path, _)| path).collect())
    };
    run().map_err(fail)
}

/// Tag removal reasons on each lead list, writing
/// `(With Cleanup Tagging) <name>` into `save_dir`.
pub fn run_tagging(inputs: &[PathBuf], save_dir: &Path, today: NaiveDate) -> Result<Vec<PathBuf>, ToolFailure> {
    let run = || -> Result<Vec<PathBuf>, ScrubError> {
        let mut outputs = Vec::with_capacity(inputs.len());
        for input in inputs {
            let name = file_name(input);
            log::info!("Processing file {name}");
            let tagged = tag_removal_reasons(&read_table(input)?, today, &name)?;
            outputs.push((save_dir.join(tagged_output_name(&name)), tagged.table));
        }
        write_all(&outputs)?;
        Ok(outputs.into_iter().map(|(path, _)| path).collect())
    };
    run().map_err(fail)
}
