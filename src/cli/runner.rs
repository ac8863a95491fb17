//! CLI runner - executes commands

use crate::cli::commands::{Cli, Commands, OutputFormat, RunArgs};
use crate::engine::{HarvestConfig, Harvester, RunReport, RunStatus};
use crate::error::Result;
use crate::ledger::{CsvLedger, Ledger};
use crate::loader::load_source;
use crate::roster::load_roster;
use crate::sink::CsvSink;
use crate::source::JsonSearchSource;
use crate::window::{parse_chunk_size, parse_datetime, split_window, TimeWindow};
use chrono::Utc;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use tracing::info;

/// Every unit was attempted
pub const EXIT_OK: i32 = 0;
/// Configuration, I/O or other fatal error
pub const EXIT_ERROR: i32 = 1;
/// The run stopped early on a quota signal
pub const EXIT_QUOTA: i32 = 2;

/// Ledger path used when `--ledger` is not given
pub fn default_ledger_path(output: &Path) -> PathBuf {
    output.with_extension("done.csv")
}

/// CLI runner
pub struct Runner {
    cli: Cli,
}

impl Runner {
    /// Create a new runner
    pub fn new(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the CLI command, returning the process exit code
    pub async fn run(&self) -> Result<i32> {
        match &self.cli.command {
            Commands::Run(args) => self.harvest(args).await,
            Commands::Validate { source } => self.validate(source).map(|()| EXIT_OK),
            Commands::Status {
                source,
                roster,
                ledger,
            } => self.status(source, roster, ledger).map(|()| EXIT_OK),
            Commands::Windows { start, end, chunk } => {
                self.windows(start, end, chunk).map(|()| EXIT_OK)
            }
        }
    }

    /// Harvest the roster
    async fn harvest(&self, args: &RunArgs) -> Result<i32> {
        let def = load_source(&args.source)?;
        let window = def
            .harvest
            .window(args.start.as_deref(), args.end.as_deref())?;
        let units = load_roster(&args.roster, &def.roster)?;

        let source = JsonSearchSource::from_definition(&def)?;
        let refine = def.refine.to_policy(&def.pagination)?;
        let schema = def.output.to_schema()?;

        let harvester = Harvester::new(
            source,
            def.retry.to_policy(),
            def.pagination.to_policy(),
            refine,
        )
        .with_config(
            HarvestConfig::new()
                .with_window(window)
                .with_inter_unit_delay(def.harvest.inter_unit_delay),
        );

        let ledger_path = args
            .ledger
            .clone()
            .unwrap_or_else(|| default_ledger_path(&args.output));
        info!(
            "Source '{}', {} units, output {}, ledger {}",
            def.name,
            units.len(),
            args.output.display(),
            ledger_path.display()
        );
        if let Some(window) = &window {
            info!("Date range {window}");
        }

        let mut ledger = CsvLedger::new(&ledger_path);
        let mut sink = CsvSink::new(&args.output, schema);
        let report = harvester.run(&units, &mut ledger, &mut sink).await;

        self.output_report(&report);
        Ok(match report.status {
            RunStatus::Completed => EXIT_OK,
            RunStatus::QuotaHalted { .. } => EXIT_QUOTA,
        })
    }

    /// Validate a source definition
    fn validate(&self, path: &Path) -> Result<()> {
        let def = load_source(path)?;

        self.output_message(&json!({
            "type": "LOG",
            "log": {
                "level": "INFO",
                "message": format!(
                    "Source '{}' is valid ({} output columns)",
                    def.name,
                    def.output.columns.len()
                )
            }
        }));

        Ok(())
    }

    /// Show ledger progress over the roster
    fn status(&self, source: &Path, roster: &Path, ledger: &Path) -> Result<()> {
        let def = load_source(source)?;
        let units = load_roster(roster, &def.roster)?;
        let done = CsvLedger::new(ledger).load();

        let pending: Vec<&str> = units
            .iter()
            .filter(|u| !done.contains(&u.key))
            .map(|u| u.key.as_str())
            .collect();

        self.output_message(&json!({
            "type": "STATUS",
            "status": {
                "units": units.len(),
                "done": units.len() - pending.len(),
                "pending": pending,
            }
        }));

        Ok(())
    }

    /// Print the chunking of a date range
    fn windows(&self, start: &str, end: &str, chunk: &str) -> Result<()> {
        let start = parse_datetime(start)?;
        let end = if end == "now" {
            Utc::now()
        } else {
            parse_datetime(end)?
        };
        let window = TimeWindow::new(start, end)?;
        let chunk = parse_chunk_size(chunk)?;

        let windows: Vec<Value> = split_window(&window, chunk)
            .iter()
            .map(|w| {
                let (start, end) = w.format("%Y-%m-%dT%H:%M:%SZ");
                json!({ "start": start, "end": end })
            })
            .collect();

        self.output_message(&json!({
            "type": "WINDOWS",
            "windows": windows,
        }));

        Ok(())
    }

    /// Output a run report
    fn output_report(&self, report: &RunReport) {
        let msg = serde_json::to_value(report)
            .map(|report| json!({ "type": "REPORT", "report": report }))
            .unwrap_or_else(|e| json!({ "type": "LOG", "log": { "level": "ERROR", "message": e.to_string() } }));
        self.output_message(&msg);
    }

    /// Output a message
    fn output_message(&self, msg: &Value) {
        match self.cli.format {
            OutputFormat::Json => {
                println!("{}", serde_json::to_string(msg).unwrap_or_default());
            }
            OutputFormat::Pretty => {
                println!("{}", serde_json::to_string_pretty(msg).unwrap_or_default());
            }
        }
    }
}
