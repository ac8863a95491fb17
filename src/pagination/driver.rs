//! Pagination driver

use super::types::{FetchOutcome, PaginationPolicy, StopReason};
use crate::http::RateLimitStatus;
use crate::retry::{CallOutcome, QuotaAction, RetryController};
use crate::source::{Query, SearchSource};
use chrono::Utc;
use std::collections::HashSet;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Walks one query through its pages
pub struct PaginationDriver<'a> {
    source: &'a dyn SearchSource,
    retry: &'a RetryController,
    policy: &'a PaginationPolicy,
}

impl<'a> PaginationDriver<'a> {
    /// Create a driver over a source
    pub fn new(
        source: &'a dyn SearchSource,
        retry: &'a RetryController,
        policy: &'a PaginationPolicy,
    ) -> Self {
        Self {
            source,
            retry,
            policy,
        }
    }

    /// Fetch every reachable page of `query`
    ///
    /// Never returns an error: failures and quota signals are reported
    /// through [`StopReason`] together with whatever was collected before.
    pub async fn fetch(&self, query: &Query) -> FetchOutcome {
        let label = format!("{} {}", self.source.name(), query.label());
        let max_empty = self.policy.max_consecutive_empty.max(1);

        let mut current = query.clone();
        let mut records = Vec::new();
        let mut seen = HashSet::new();
        let mut estimated_total = None;
        let mut pages: u32 = 0;
        let mut empty_streak: u32 = 0;

        let stop = loop {
            if pages > 0 && !self.policy.inter_page_delay.is_zero() {
                tokio::time::sleep(self.policy.inter_page_delay).await;
            }

            let outcome = self
                .retry
                .run(&label, || self.source.fetch_page(&current))
                .await;

            let page = match outcome {
                CallOutcome::Success(page) => page,
                CallOutcome::Exhausted {
                    attempts,
                    last_error,
                } => {
                    break StopReason::Failed {
                        attempts,
                        error: last_error,
                    }
                }
                CallOutcome::Quota { reason, reset_at } => {
                    break StopReason::Quota { reason, reset_at }
                }
            };

            pages += 1;
            if page.total.is_some() {
                estimated_total = page.total;
            }

            let mut fresh = 0usize;
            for record in page.records {
                if seen.insert(record.id.clone()) {
                    records.push(record);
                    fresh += 1;
                }
            }
            debug!(
                "{label}: page {pages} added {fresh}, {} so far (total {estimated_total:?})",
                records.len()
            );

            if let Some(max) = self.policy.max_items {
                if records.len() as u64 >= max {
                    records.truncate(usize::try_from(max).unwrap_or(usize::MAX));
                    info!("{label}: reached item cap of {max}");
                    break StopReason::ItemCap;
                }
            }

            if fresh == 0 {
                empty_streak += 1;
                if empty_streak >= max_empty {
                    break StopReason::EmptyPages;
                }
            } else {
                empty_streak = 0;
            }

            let Some(next) = page.next_cursor else {
                break StopReason::Exhausted;
            };
            if current.cursor.as_ref() == Some(&next) {
                warn!("{label}: source repeated cursor {next}, stopping");
                break StopReason::Exhausted;
            }

            if page.rate_limit.is_exhausted() {
                match self.reset_wait(&page.rate_limit) {
                    Some(wait) => {
                        warn!("{label}: rate limit exhausted, waiting {wait:?} for reset");
                        tokio::time::sleep(wait).await;
                    }
                    None => {
                        break StopReason::Quota {
                            reason: "rate limit exhausted".to_string(),
                            reset_at: page.rate_limit.reset_at,
                        }
                    }
                }
            }

            current = current.with_cursor(Some(next));
        };

        FetchOutcome {
            fetched: records.len() as u64,
            records,
            estimated_total,
            pages,
            stop,
        }
    }

    /// How long to wait for an exhausted rate-limit window, or `None` to halt
    fn reset_wait(&self, status: &RateLimitStatus) -> Option<Duration> {
        let policy = self.retry.policy();
        if policy.quota_action != QuotaAction::SleepUntilReset {
            return None;
        }
        let until_reset = (status.reset_at? - Utc::now())
            .to_std()
            .unwrap_or(Duration::ZERO);
        (until_reset <= policy.max_quota_wait).then(|| until_reset + policy.reset_grace)
    }
}
