//! Refiner: drives one unit through fetch, cap detection and splitting

use super::policy::{RefinePolicy, RefineTrigger};
use super::state::{transition, RefineEvent, RefineState};
use crate::pagination::{FetchOutcome, PaginationDriver, PaginationPolicy, StopReason};
use crate::retry::{CallOutcome, RetryController};
use crate::source::{Query, SearchSource};
use crate::types::Record;
use crate::window::{split_window, TimeWindow};
use std::collections::{HashSet, VecDeque};
use tracing::{debug, info, warn};

/// Everything collected for one query, plus how refinement ended
#[derive(Debug, Clone)]
pub struct RefineOutcome {
    /// Unique records from every completed fetch
    pub records: Vec<Record>,
    /// Final state (`Done`, `QuotaHalted` or `Failed`)
    pub state: RefineState,
    /// The stop reason that ended a halted or failed run
    pub halt: Option<StopReason>,
    /// Sub-window queries issued
    pub sub_queries: u32,
    /// Pages fetched across all queries
    pub pages: u32,
    /// Records dropped because an earlier query already returned them
    pub overlap_duplicates: u64,
}

impl RefineOutcome {
    /// Every reachable record was collected
    pub fn is_done(&self) -> bool {
        self.state == RefineState::Done
    }

    /// Stopped by a quota signal
    pub fn is_quota(&self) -> bool {
        self.state == RefineState::QuotaHalted
    }
}

/// Union of records by identity key, in arrival order
#[derive(Debug, Default)]
struct RecordUnion {
    records: Vec<Record>,
    seen: HashSet<String>,
    duplicates: u64,
}

impl RecordUnion {
    fn absorb(&mut self, records: Vec<Record>) {
        for record in records {
            if self.seen.insert(record.id.clone()) {
                self.records.push(record);
            } else {
                self.duplicates += 1;
            }
        }
    }
}

/// Fetches a query, refining its time window when the cap hides results
pub struct Refiner<'a> {
    source: &'a dyn SearchSource,
    retry: &'a RetryController,
    pagination: &'a PaginationPolicy,
    policy: &'a RefinePolicy,
}

impl<'a> Refiner<'a> {
    /// Create a refiner
    pub fn new(
        source: &'a dyn SearchSource,
        retry: &'a RetryController,
        pagination: &'a PaginationPolicy,
        policy: &'a RefinePolicy,
    ) -> Self {
        Self {
            source,
            retry,
            pagination,
            policy,
        }
    }

    /// Collect every reachable record for `query`
    pub async fn harvest(&self, query: &Query) -> RefineOutcome {
        let label = query.label();
        let mut state = RefineState::Fetching;
        let mut union = RecordUnion::default();
        let mut halt = None;
        let mut pages = 0;
        let mut sub_queries = 0;

        if let (RefineTrigger::Estimate { threshold }, Some(_)) = (self.policy.trigger, query.window) {
            let estimate_label = format!("{} estimate {label}", self.source.name());
            match self
                .retry
                .run(&estimate_label, || self.source.estimate(query))
                .await
            {
                CallOutcome::Success(Some(estimate)) if estimate > threshold => {
                    info!("{label}: estimate {estimate} exceeds {threshold}, splitting up front");
                    state = transition(state, RefineEvent::EstimateTooLarge);
                }
                CallOutcome::Success(estimate) => {
                    debug!("{label}: estimate {estimate:?} within threshold");
                }
                CallOutcome::Quota { reason, reset_at } => {
                    state = transition(state, RefineEvent::Quota);
                    halt = Some(StopReason::Quota { reason, reset_at });
                }
                CallOutcome::Exhausted { last_error, .. } => {
                    warn!("{label}: estimate unavailable ({last_error}), fetching full range");
                }
            }
        }

        if state == RefineState::Fetching {
            let outcome = self.fetch(query).await;
            pages += outcome.pages;
            state = match self.settle(state, &outcome) {
                Some(event) => {
                    halt = Some(outcome.stop.clone());
                    transition(state, event)
                }
                None => {
                    let requery = self.needs_refinement(&outcome);
                    if requery {
                        info!(
                            "{label}: fetched {} of ~{:?}, refining",
                            outcome.fetched, outcome.estimated_total
                        );
                    }
                    union.absorb(outcome.records);
                    transition(state, RefineEvent::FetchComplete { requery })
                }
            };
        }

        let mut pending = VecDeque::new();
        if state == RefineState::Capped {
            pending = self.plan(query.window);
            let event = if pending.is_empty() {
                warn!("{label}: capped but the window cannot be split, keeping capped results");
                RefineEvent::NothingToSplit
            } else {
                debug!("{label}: {} sub-windows planned", pending.len());
                RefineEvent::SubQueriesPlanned
            };
            state = transition(state, event);
        }

        while state == RefineState::Refining {
            let Some(window) = pending.pop_front() else {
                state = transition(state, RefineEvent::SubQueriesComplete);
                break;
            };

            let sub = query.for_window(window);
            let outcome = self.fetch(&sub).await;
            sub_queries += 1;
            pages += outcome.pages;

            if let Some(event) = self.settle(state, &outcome) {
                halt = Some(outcome.stop.clone());
                state = transition(state, event);
                break;
            }

            if self.policy.recursive && self.needs_refinement(&outcome) {
                if let Some((left, right)) = window.bisect(self.policy.min_window) {
                    debug!("{}: still capped, bisecting", sub.label());
                    pending.push_front(right);
                    pending.push_front(left);
                    continue;
                }
                warn!(
                    "{}: still capped at the minimum window, keeping {} records",
                    sub.label(),
                    outcome.fetched
                );
            }

            union.absorb(outcome.records);
        }

        RefineOutcome {
            records: union.records,
            state,
            halt,
            sub_queries,
            pages,
            overlap_duplicates: union.duplicates,
        }
    }

    /// Walk one query with a fresh driver
    async fn fetch(&self, query: &Query) -> FetchOutcome {
        PaginationDriver::new(self.source, self.retry, self.pagination)
            .fetch(query)
            .await
    }

    /// Event for a fetch that ended abnormally
    fn settle(&self, state: RefineState, outcome: &FetchOutcome) -> Option<RefineEvent> {
        match &outcome.stop {
            StopReason::Quota { reason, .. } => {
                warn!("quota while {state}: {reason}");
                Some(RefineEvent::Quota)
            }
            StopReason::Failed { attempts, error } => {
                warn!("fetch failed after {attempts} attempts while {state}: {error}");
                Some(RefineEvent::Failure)
            }
            _ => None,
        }
    }

    /// Whether a finished fetch left results behind the cap
    fn needs_refinement(&self, outcome: &FetchOutcome) -> bool {
        match self.policy.trigger {
            RefineTrigger::Never => false,
            RefineTrigger::CapHit(rule) => match outcome.estimated_total {
                Some(estimate) => rule.should_requery(outcome.fetched, estimate),
                None => outcome.hit_cap(),
            },
            RefineTrigger::Estimate { threshold } => {
                outcome.estimated_total.is_some_and(|e| e > threshold)
            }
        }
    }

    /// Sub-windows for a capped query (empty when it cannot be split)
    fn plan(&self, window: Option<TimeWindow>) -> VecDeque<TimeWindow> {
        let Some(window) = window else {
            return VecDeque::new();
        };
        let chunks = split_window(&window, self.policy.chunk);
        if chunks.len() > 1 {
            return chunks.into();
        }
        // The range fits in one chunk; bisecting is the only way down
        match (self.policy.recursive, window.bisect(self.policy.min_window)) {
            (true, Some((left, right))) => VecDeque::from([left, right]),
            _ => VecDeque::new(),
        }
    }
}
