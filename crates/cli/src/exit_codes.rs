//! CLI Exit Code Registry
//!
//! The single source of truth for `lscrub` exit codes. Scripts rely on them.
//!
//! | Code | Meaning                                              |
//! |------|------------------------------------------------------|
//! | 0    | Success                                              |
//! | 2    | Usage error (bad arguments, missing input file)      |
//! | 3    | Config file unreadable or invalid                    |
//! | 4    | Tool run failed (build, clean, lookup or tag)        |
//! | 5    | Disposition database could not be opened             |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant with what triggers it
//! 2. Update the table above
//! 3. Wire it into the command's error handling

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// Usage error - bad arguments, missing input files or directories.
pub const EXIT_USAGE: u8 = 2;

/// Config could not be read, parsed, or validated.
pub const EXIT_CONFIG: u8 = 3;

/// The engine reported a tool failure; nothing partial was written.
pub const EXIT_TOOL_FAILURE: u8 = 4;

/// `--disposition-db` / `LISTSCRUB_DISPOSITION_DB` could not be opened.
pub const EXIT_DISPOSITION: u8 = 5;
