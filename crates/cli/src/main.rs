// lscrub: build the suppression registry and clean outreach lists.

mod commands;
mod exit_codes;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};

use exit_codes::{EXIT_CONFIG, EXIT_SUCCESS, EXIT_TOOL_FAILURE, EXIT_USAGE};

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("GIT_COMMIT_HASH"),
        ")",
        "\nengine:  listscrub-recon ",
        env!("CARGO_PKG_VERSION"),
    )
}

#[derive(Parser)]
#[command(name = "lscrub")]
#[command(about = "Suppression registry builder and outreach list cleaner")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Engine config (TOML). Defaults to <config dir>/listscrub/config.toml when present.
    #[arg(long, global = true, env = "LISTSCRUB_CONFIG")]
    config: Option<PathBuf>,

    /// Only log warnings and errors
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the suppression registry from the channel exports in a store
    #[command(after_help = "\
Examples:
  lscrub build --store /mnt/share/List-Scrub
  lscrub build --store ./store --root /sources --local-copy registry.xlsx")]
    Build {
        /// Local directory acting as the object store
        #[arg(long)]
        store: PathBuf,

        /// Store path holding the channel folders and the registry workbook
        #[arg(long, default_value = "/")]
        root: String,

        /// Also write the uploaded workbook here
        #[arg(long)]
        local_copy: Option<PathBuf>,

        /// Listing page size
        #[arg(long, default_value_t = 500)]
        page_size: usize,
    },

    /// Clean candidate lists against the registry and disposition history
    #[command(after_help = "\
Examples:
  lscrub clean --store ./store leads.csv more_leads.xlsx --out ./cleaned
  LISTSCRUB_DISPOSITION_DB=calls.db lscrub clean --store ./store leads.csv --out .")]
    Clean {
        /// Candidate list files (.csv or .xlsx)
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Local directory acting as the object store
        #[arg(long)]
        store: PathBuf,

        /// Store path of the registry workbook's folder
        #[arg(long, default_value = "/")]
        root: String,

        /// Directory receiving the cleaned files
        #[arg(long)]
        out: PathBuf,

        /// SQLite database with a call_dispositions table
        #[arg(long, env = "LISTSCRUB_DISPOSITION_DB")]
        disposition_db: Option<PathBuf>,
    },

    /// Backfill missing deal IDs on text and call logs from a CRM phone export
    #[command(after_help = "\
Examples:
  lscrub lookup --source crm_phones.csv texts.xlsx calls.csv --out ./lookups")]
    Lookup {
        /// Text or call logs (.csv or .xlsx)
        #[arg(required = true)]
        logs: Vec<PathBuf>,

        /// CRM export with phone and deal ID columns
        #[arg(long)]
        source: PathBuf,

        #[arg(long)]
        out: PathBuf,
    },

    /// Tag each lead with its removal reasons and keep one row per phone
    #[command(after_help = "\
Examples:
  lscrub tag leads.csv --out ./tagged")]
    Tag {
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        #[arg(long)]
        out: PathBuf,
    },

    /// Config utilities
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Parse and validate the engine config without running anything
    #[command(after_help = "\
Examples:
  lscrub config validate
  lscrub --config team.toml config validate")]
    Validate,
}

fn init_logging(quiet: bool) {
    let level = if quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.quiet);

    let result = commands::load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Build {
            store,
            root,
            local_copy,
            page_size,
        } => commands::cmd_build(&config, store, root, local_copy, page_size),
        Commands::Clean {
            inputs,
            store,
            root,
            out,
            disposition_db,
        } => commands::cmd_clean(&config, inputs, store, root, out, disposition_db),
        Commands::Lookup { logs, source, out } => commands::cmd_lookup(&config, logs, source, out),
        Commands::Tag { inputs, out } => commands::cmd_tag(inputs, out),
        Commands::Config(ConfigCommands::Validate) => commands::cmd_config_validate(&config),
    });

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self { code: EXIT_CONFIG, message: msg.into(), hint: None }
    }

    /// The engine already logged the cause; the message repeats it for the shell.
    pub fn tool(failure: listscrub_recon::ToolFailure) -> Self {
        Self { code: EXIT_TOOL_FAILURE, message: failure.to_string(), hint: None }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}
