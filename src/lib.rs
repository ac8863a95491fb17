// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::struct_excessive_bools)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::match_wildcard_for_single_variants)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # Species Harvest
//!
//! Resumable, rate-limited harvesting of evidence records from paginated
//! search APIs, one roster unit (species, optionally per region) at a time.
//!
//! ## Features
//!
//! - **Retry and Backoff**: Bounded retries for transient failures, quota
//!   signals end the run cleanly
//! - **Pagination**: Token, offset and page-number cursors with item caps
//! - **Cap Refinement**: Re-queries capped results over smaller date windows
//! - **Checkpointing**: Append-only ledger of completed units
//! - **Dedup Merge**: Appends only new identity keys to the output table
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use species_harvest::engine::{HarvestConfig, Harvester};
//! use species_harvest::ledger::CsvLedger;
//! use species_harvest::sink::CsvSink;
//! use species_harvest::source::JsonSearchSource;
//! use species_harvest::{load_roster, load_source};
//!
//! #[tokio::main]
//! async fn main() -> species_harvest::Result<()> {
//!     let def = load_source("sources/inaturalist.yaml")?;
//!     let units = load_roster("species.csv", &def.roster)?;
//!
//!     let harvester = Harvester::new(
//!         JsonSearchSource::from_definition(&def)?,
//!         def.retry.to_policy(),
//!         def.pagination.to_policy(),
//!         def.refine.to_policy(&def.pagination)?,
//!     )
//!     .with_config(HarvestConfig::new().with_window(def.harvest.window(None, None)?));
//!
//!     let mut ledger = CsvLedger::new("observations.done.csv");
//!     let mut sink = CsvSink::new("observations.csv", def.output.to_schema()?);
//!     let report = harvester.run(&units, &mut ledger, &mut sink).await;
//!     println!("{}", report.stats);
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                 Harvester (per roster unit)                   │
//! │  ledger.load() → skip done → refine → sink.merge → mark_done  │
//! └───────────────────────────────────────────────────────────────┘
//!                               │
//! ┌───────────┬─────────────────┴──┬──────────────┬──────────────┐
//! │  Refine   │    Pagination      │    Retry     │   Source     │
//! ├───────────┼────────────────────┼──────────────┼──────────────┤
//! │ Cap rule  │ Cursor loop        │ Backoff      │ JSON / HTTP  │
//! │ Windows   │ Item cap           │ Quota halt   │ Rate limit   │
//! │ Bisection │ Empty-page streak  │ Reset wait   │ Templates    │
//! └───────────┴────────────────────┴──────────────┴──────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// HTTP client with rate limiting
pub mod http;

/// Retry and backoff controller
pub mod retry;

/// Pagination driver
pub mod pagination;

/// Cap detection and query refinement
pub mod refine;

/// Date ranges and window splitting
pub mod window;

/// Search source abstraction and the declarative JSON source
pub mod source;

/// Checkpoint ledger of completed units
pub mod ledger;

/// Dedup and append-merge output
pub mod sink;

/// Unit roster loading
pub mod roster;

/// Main harvest loop
pub mod engine;

/// Source definitions
pub mod config;

/// YAML loader for source definitions
pub mod loader;

/// Template interpolation
pub mod template;

/// Command-line interface
pub mod cli;

mod io;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use config::SourceDefinition;
pub use engine::{HarvestConfig, HarvestStats, Harvester, RunReport, RunStatus};
pub use loader::{load_source, load_source_from_str};
pub use roster::load_roster;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
