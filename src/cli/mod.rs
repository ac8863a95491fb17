//! CLI module
//!
//! Command-line interface for running harvests.
//!
//! # Commands
//!
//! - `run` - Harvest a roster into an output table
//! - `validate` - Check a source definition
//! - `status` - Show which roster units are done
//! - `windows` - Print how a date range is chunked

mod commands;
mod runner;

pub use commands::{Cli, Commands, OutputFormat, RunArgs};
pub use runner::{default_ledger_path, Runner, EXIT_ERROR, EXIT_OK, EXIT_QUOTA};
