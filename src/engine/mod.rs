//! Execution engine module
//!
//! Main harvest loop over the unit roster.
//!
//! # Overview
//!
//! The engine module provides:
//! - `Harvester` - iterates units, skipping those in the ledger, refines each
//!   through the search source, merges results into the sink, then marks the
//!   unit done
//! - `HarvestConfig` - date range and pacing
//! - `HarvestStats` / `RunReport` / `RunStatus` - what a run did and how it ended

mod types;

pub use types::{HarvestConfig, HarvestStats, RunReport, RunStatus};

use crate::ledger::Ledger;
use crate::pagination::{PaginationPolicy, StopReason};
use crate::refine::{RefineOutcome, RefinePolicy, RefineState, Refiner};
use crate::retry::{RetryController, RetryPolicy};
use crate::sink::RecordSink;
use crate::source::{Query, SearchSource};
use crate::types::UnitOfWork;
use chrono::Utc;
use std::time::Instant;
use tracing::{debug, info, warn};
use types::UnitOutcome;

/// Harvests a roster of units from one search source
pub struct Harvester<S> {
    /// Search source
    source: S,
    /// Retry controller shared by every call of the run
    retry: RetryController,
    /// Pagination limits
    pagination: PaginationPolicy,
    /// Refinement policy
    refine: RefinePolicy,
    /// Harvest configuration
    config: HarvestConfig,
}

impl<S: SearchSource> Harvester<S> {
    /// Create a new harvester
    pub fn new(
        source: S,
        retry: RetryPolicy,
        pagination: PaginationPolicy,
        refine: RefinePolicy,
    ) -> Self {
        Self {
            source,
            retry: RetryController::new(retry),
            pagination,
            refine,
            config: HarvestConfig::default(),
        }
    }

    /// Set harvest configuration
    #[must_use]
    pub fn with_config(mut self, config: HarvestConfig) -> Self {
        self.config = config;
        self
    }

    /// Get the search source
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Get the harvest configuration
    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    /// Harvest every unit not yet in the ledger
    ///
    /// Per-unit failures are logged and leave the unit pending; only a quota
    /// signal ends the run early, after flushing what was already collected.
    pub async fn run(
        &self,
        units: &[UnitOfWork],
        ledger: &mut dyn Ledger,
        sink: &mut dyn RecordSink,
    ) -> RunReport {
        let start = Instant::now();
        let done = ledger.load();
        let total = units.len();

        let mut stats = HarvestStats {
            units_total: total,
            ..HarvestStats::default()
        };
        let mut failed = Vec::new();
        let mut status = RunStatus::Completed;

        info!(
            "Harvesting {total} units from {} ({} already done)",
            self.source.name(),
            units.iter().filter(|u| done.contains(&u.key)).count()
        );

        let mut first = true;
        for (i, unit) in units.iter().enumerate() {
            if done.contains(&unit.key) {
                debug!("[{}/{total}] {} already done, skipping", i + 1, unit.key);
                stats.units_skipped += 1;
                continue;
            }

            if !first && !self.config.inter_unit_delay.is_zero() {
                tokio::time::sleep(self.config.inter_unit_delay).await;
            }
            first = false;

            info!("[{}/{total}] {}", i + 1, unit.key);
            match self.process_unit(unit, ledger, sink, &mut stats).await {
                UnitOutcome::Completed => stats.units_completed += 1,
                UnitOutcome::Failed => {
                    stats.units_failed += 1;
                    failed.push(unit.key.clone());
                }
                UnitOutcome::QuotaHalted { reset_at } => {
                    warn!(
                        "Quota exhausted at {}; stopping. Re-run to resume from this unit",
                        unit.key
                    );
                    status = RunStatus::QuotaHalted {
                        unit: unit.key.clone(),
                        reset_at,
                    };
                    break;
                }
            }
        }

        stats.retries = self.retry.retries();
        stats.duration_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!("Harvest finished: {stats}");

        RunReport {
            status,
            stats,
            failed,
        }
    }

    /// Fetch, merge and checkpoint one unit
    async fn process_unit(
        &self,
        unit: &UnitOfWork,
        ledger: &mut dyn Ledger,
        sink: &mut dyn RecordSink,
        stats: &mut HarvestStats,
    ) -> UnitOutcome {
        let query = Query::new(unit.clone(), self.config.window, self.pagination.page_size);
        let outcome = Refiner::new(&self.source, &self.retry, &self.pagination, &self.refine)
            .harvest(&query)
            .await;

        stats.records_fetched += outcome.records.len() as u64;
        stats.duplicates_dropped += outcome.overlap_duplicates;
        stats.pages_fetched += u64::from(outcome.pages);
        stats.sub_queries += u64::from(outcome.sub_queries);

        match outcome.state {
            RefineState::Done => self.complete_unit(unit, &outcome, ledger, sink, stats),
            RefineState::QuotaHalted => {
                self.flush_partial(unit, &outcome, sink, stats);
                let reset_at = match outcome.halt {
                    Some(StopReason::Quota { reset_at, .. }) => reset_at,
                    _ => None,
                };
                UnitOutcome::QuotaHalted { reset_at }
            }
            _ => {
                self.flush_partial(unit, &outcome, sink, stats);
                warn!("{}: left pending for the next run", unit.key);
                UnitOutcome::Failed
            }
        }
    }

    /// Merge a fully harvested unit and mark it done
    fn complete_unit(
        &self,
        unit: &UnitOfWork,
        outcome: &RefineOutcome,
        ledger: &mut dyn Ledger,
        sink: &mut dyn RecordSink,
        stats: &mut HarvestStats,
    ) -> UnitOutcome {
        let merged = match sink.merge(unit, &outcome.records) {
            Ok(merged) => merged,
            Err(e) => {
                warn!("{}: failed to write output ({e}), left pending", unit.key);
                return UnitOutcome::Failed;
            }
        };

        stats.records_written += merged.written;
        stats.duplicates_dropped += merged.duplicates;
        if merged.placeholder {
            stats.placeholders += 1;
        }

        if let Err(e) = ledger.mark_done(&unit.key, Utc::now()) {
            warn!("{}: records written but ledger update failed: {e}", unit.key);
        }

        info!(
            "{}: {} records, {} new{}",
            unit.key,
            outcome.records.len(),
            merged.written,
            if merged.placeholder { " (placeholder)" } else { "" }
        );
        UnitOutcome::Completed
    }

    /// Keep what completed sub-queries collected, without marking the unit
    fn flush_partial(
        &self,
        unit: &UnitOfWork,
        outcome: &RefineOutcome,
        sink: &mut dyn RecordSink,
        stats: &mut HarvestStats,
    ) {
        if outcome.records.is_empty() {
            return;
        }
        match sink.merge(unit, &outcome.records) {
            Ok(merged) => {
                stats.records_written += merged.written;
                stats.duplicates_dropped += merged.duplicates;
                debug!("{}: flushed {} partial records", unit.key, merged.written);
            }
            Err(e) => warn!("{}: failed to flush partial records: {e}", unit.key),
        }
    }
}
