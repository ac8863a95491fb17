//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resumable harvesting from paginated search APIs
#[derive(Parser, Debug)]
#[command(name = "species-harvest")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, global = true, default_value = "pretty")]
    pub format: OutputFormat,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest every pending roster unit into the output table
    Run(RunArgs),

    /// Validate a source definition
    Validate {
        /// Source definition file (YAML)
        #[arg(short, long)]
        source: PathBuf,
    },

    /// Show done and pending roster units
    Status {
        /// Source definition file (YAML)
        #[arg(short, long)]
        source: PathBuf,

        /// Roster file (CSV)
        #[arg(short, long)]
        roster: PathBuf,

        /// Ledger file (CSV)
        #[arg(short, long)]
        ledger: PathBuf,
    },

    /// Print the sub-windows a date range splits into
    Windows {
        /// Range start (date or datetime)
        #[arg(long)]
        start: String,

        /// Range end, exclusive (date, datetime or "now")
        #[arg(long, default_value = "now")]
        end: String,

        /// Chunk size, e.g. "1mo" or "100d"
        #[arg(long, default_value = "1mo")]
        chunk: String,
    },
}

/// Arguments of the `run` command
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Source definition file (YAML)
    #[arg(short, long)]
    pub source: PathBuf,

    /// Roster file (CSV)
    #[arg(short, long)]
    pub roster: PathBuf,

    /// Output table (CSV), appended to across runs
    #[arg(short, long)]
    pub output: PathBuf,

    /// Ledger file (CSV); defaults to `<output>.done.csv`
    #[arg(short, long)]
    pub ledger: Option<PathBuf>,

    /// Override the range start
    #[arg(long)]
    pub start: Option<String>,

    /// Override the range end
    #[arg(long)]
    pub end: Option<String>,
}

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output (one document per line)
    Json,
    /// Human-readable output
    Pretty,
}
