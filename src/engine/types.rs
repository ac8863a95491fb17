//! Engine types
//!
//! Configuration, statistics and the run report for the harvester.

use crate::types::UnitKey;
use crate::window::TimeWindow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Configuration for a harvest run
#[derive(Debug, Clone, Default)]
pub struct HarvestConfig {
    /// Date range for time-bounded sources
    pub window: Option<TimeWindow>,
    /// Pause after each unit that issued requests
    pub inter_unit_delay: Duration,
}

impl HarvestConfig {
    /// Create a new harvest config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the date range
    #[must_use]
    pub fn with_window(mut self, window: Option<TimeWindow>) -> Self {
        self.window = window;
        self
    }

    /// Set the inter-unit delay
    #[must_use]
    pub fn with_inter_unit_delay(mut self, delay: Duration) -> Self {
        self.inter_unit_delay = delay;
        self
    }
}

/// Statistics from a harvest run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HarvestStats {
    /// Units in the roster
    pub units_total: usize,
    /// Units skipped because the ledger has them
    pub units_skipped: usize,
    /// Units merged and marked done
    pub units_completed: usize,
    /// Units left pending after a failure
    pub units_failed: usize,
    /// Unique records collected from the source
    pub records_fetched: u64,
    /// Rows appended to the output
    pub records_written: u64,
    /// Records dropped as already present (across sub-queries or in output)
    pub duplicates_dropped: u64,
    /// Placeholder rows written for empty units
    pub placeholders: u64,
    /// Pages fetched
    pub pages_fetched: u64,
    /// Sub-window queries issued by refinement
    pub sub_queries: u64,
    /// Retries performed
    pub retries: u64,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl fmt::Display for HarvestStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} units: {} completed, {} skipped, {} failed; {} records fetched, {} written, {} duplicates dropped; {} pages, {} sub-queries, {} retries in {}ms",
            self.units_total,
            self.units_completed,
            self.units_skipped,
            self.units_failed,
            self.records_fetched,
            self.records_written,
            self.duplicates_dropped,
            self.pages_fetched,
            self.sub_queries,
            self.retries,
            self.duration_ms
        )
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RunStatus {
    /// Every unit was attempted
    Completed,
    /// A quota signal stopped the run early
    QuotaHalted {
        /// The unit being harvested when the quota hit
        unit: UnitKey,
        /// When the quota resets, if reported
        reset_at: Option<DateTime<Utc>>,
    },
}

/// Result of a harvest run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// How the run ended
    pub status: RunStatus,
    /// Run statistics
    pub stats: HarvestStats,
    /// Units left pending by failures
    pub failed: Vec<UnitKey>,
}

impl RunReport {
    /// Check if the run attempted every unit
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// Check if the run stopped on a quota signal
    pub fn is_quota_halted(&self) -> bool {
        matches!(self.status, RunStatus::QuotaHalted { .. })
    }
}

/// What happened to one unit
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum UnitOutcome {
    /// Merged and marked done
    Completed,
    /// Left pending; the next run retries it
    Failed,
    /// Quota stopped the unit and the run
    QuotaHalted {
        /// Reported reset time
        reset_at: Option<DateTime<Utc>>,
    },
}
