//! Subcommand handlers. Each maps engine results onto exit codes and prints a
//! short summary; the engine does its own logging.

use std::path::{Path, PathBuf};

use chrono::Local;
use listscrub_recon::pipeline::{run_build, run_clean, run_lookup, run_tagging};
use listscrub_recon::{DispositionSource, EngineConfig, LocalStore, RunClock, SqliteDispositionSource};

use crate::exit_codes::EXIT_DISPOSITION;
use crate::CliError;

const CONFIG_DIR: &str = "listscrub";
const CONFIG_FILE: &str = "config.toml";

/// `--config` if given, else the per-user config file if it exists, else defaults.
pub fn load_config(explicit: Option<&Path>) -> Result<EngineConfig, CliError> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match dirs::config_dir().map(|d| d.join(CONFIG_DIR).join(CONFIG_FILE)) {
            Some(path) if path.is_file() => path,
            _ => {
                log::debug!("No config file; using built-in defaults");
                return Ok(EngineConfig::default());
            }
        },
    };
    let text = std::fs::read_to_string(&path)
        .map_err(|e| CliError::config(format!("cannot read config {}: {e}", path.display())))?;
    let config = EngineConfig::from_toml(&text).map_err(|e| CliError::config(format!("{}: {e}", path.display())))?;
    log::debug!("Loaded config from {}", path.display());
    Ok(config)
}

fn require_dir(path: &Path, what: &str) -> Result<(), CliError> {
    if path.is_dir() {
        Ok(())
    } else {
        Err(CliError::args(format!("{what} is not a directory: {}", path.display())))
    }
}

fn require_files(paths: &[PathBuf]) -> Result<(), CliError> {
    match paths.iter().find(|p| !p.is_file()) {
        Some(missing) => Err(CliError::args(format!("file not found: {}", missing.display()))),
        None => Ok(()),
    }
}

fn ensure_out_dir(path: &Path) -> Result<(), CliError> {
    std::fs::create_dir_all(path)
        .map_err(|e| CliError::args(format!("cannot create output directory {}: {e}", path.display())))
}

pub fn cmd_build(
    config: &EngineConfig,
    store: PathBuf,
    root: String,
    local_copy: Option<PathBuf>,
    page_size: usize,
) -> Result<(), CliError> {
    require_dir(&store, "store")
        .map_err(|e| e.with_hint("point --store at the directory holding the channel folders"))?;
    let store = LocalStore::new(store).with_page_size(page_size);

    let report = run_build(&store, &root, config, RunClock::now(), local_copy.as_deref()).map_err(CliError::tool)?;
    println!(
        "registry: {} ({} entries from {} files, updated {})",
        report.artifact_path,
        report.registry.len(),
        report.sources.len(),
        report.last_updated
    );
    Ok(())
}

pub fn cmd_clean(
    config: &EngineConfig,
    inputs: Vec<PathBuf>,
    store: PathBuf,
    root: String,
    out: PathBuf,
    disposition_db: Option<PathBuf>,
) -> Result<(), CliError> {
    require_files(&inputs)?;
    require_dir(&store, "store")?;
    ensure_out_dir(&out)?;

    let dispositions = match &disposition_db {
        Some(path) => Some(SqliteDispositionSource::open(path).map_err(|e| CliError {
            code: EXIT_DISPOSITION,
            message: format!("cannot open disposition database {}: {e}", path.display()),
            hint: Some("set LISTSCRUB_DISPOSITION_DB to a SQLite file with a call_dispositions table".into()),
        })?),
        None => None,
    };
    let source = dispositions.as_ref().map(|s| s as &dyn DispositionSource);

    let store = LocalStore::new(store);
    let cleaned = run_clean(&store, &root, &inputs, &out, source, config, RunClock::now()).map_err(CliError::tool)?;
    for file in cleaned {
        println!(
            "{} -> {} ({} of {} kept)",
            file.input.display(),
            file.output.display(),
            file.report.survivors,
            file.report.input
        );
    }
    Ok(())
}

pub fn cmd_lookup(config: &EngineConfig, logs: Vec<PathBuf>, source: PathBuf, out: PathBuf) -> Result<(), CliError> {
    require_files(std::slice::from_ref(&source))?;
    require_files(&logs)?;
    ensure_out_dir(&out)?;

    let today = Local::now().date_naive();
    let written = run_lookup(&source, &logs, &out, config, today).map_err(CliError::tool)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn cmd_tag(inputs: Vec<PathBuf>, out: PathBuf) -> Result<(), CliError> {
    require_files(&inputs)?;
    ensure_out_dir(&out)?;

    let today = Local::now().date_naive();
    let written = run_tagging(&inputs, &out, today).map_err(CliError::tool)?;
    for path in written {
        println!("{}", path.display());
    }
    Ok(())
}

pub fn cmd_config_validate(config: &EngineConfig) -> Result<(), CliError> {
    config.validate().map_err(|e| CliError::config(e.to_string()))?;
    eprintln!(
        "valid: registry '{}', {} slot column(s), concatenating {}",
        config.registry.artifact,
        config.cleaner.slot_columns.len(),
        config.folders.concatenate.join(", ")
    );
    Ok(())
}
