//! Pagination types

use crate::types::Record;
use chrono::{DateTime, Utc};
use std::time::Duration;

/// Limits for walking one query
#[derive(Debug, Clone)]
pub struct PaginationPolicy {
    /// Items requested per page
    pub page_size: u32,
    /// Hard per-query item cap (`None` = unbounded)
    pub max_items: Option<u64>,
    /// Consecutive empty or duplicate-only pages tolerated before stopping
    pub max_consecutive_empty: u32,
    /// Delay between page requests
    pub inter_page_delay: Duration,
}

impl Default for PaginationPolicy {
    fn default() -> Self {
        Self {
            page_size: 100,
            max_items: None,
            max_consecutive_empty: 1,
            inter_page_delay: Duration::ZERO,
        }
    }
}

impl PaginationPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// Set the per-query item cap
    #[must_use]
    pub fn with_max_items(mut self, max_items: Option<u64>) -> Self {
        self.max_items = max_items;
        self
    }

    /// Set how many empty pages in a row end the query
    #[must_use]
    pub fn with_max_consecutive_empty(mut self, pages: u32) -> Self {
        self.max_consecutive_empty = pages;
        self
    }

    /// Set the inter-page delay
    #[must_use]
    pub fn with_inter_page_delay(mut self, delay: Duration) -> Self {
        self.inter_page_delay = delay;
        self
    }
}

/// Why the driver stopped paging
#[derive(Debug, Clone, PartialEq)]
pub enum StopReason {
    /// The source returned no next cursor
    Exhausted,
    /// Too many empty or duplicate-only pages in a row
    EmptyPages,
    /// The per-query item cap was reached
    ItemCap,
    /// A quota signal ended paging
    Quota {
        /// Display form of the signal
        reason: String,
        /// Reported reset time
        reset_at: Option<DateTime<Utc>>,
    },
    /// A page could not be fetched within the retry budget
    Failed {
        /// Attempts spent on the failing page
        attempts: u32,
        /// Last error seen
        error: String,
    },
}

/// Result of walking one query
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    /// Unique records in arrival order
    pub records: Vec<Record>,
    /// Number of unique records collected
    pub fetched: u64,
    /// Latest total the source reported
    pub estimated_total: Option<u64>,
    /// Pages fetched successfully
    pub pages: u32,
    /// Why paging ended
    pub stop: StopReason,
}

impl FetchOutcome {
    /// Paging ended normally (records are everything reachable)
    pub fn is_complete(&self) -> bool {
        matches!(
            self.stop,
            StopReason::Exhausted | StopReason::EmptyPages | StopReason::ItemCap
        )
    }

    /// Paging stopped at the item cap
    pub fn hit_cap(&self) -> bool {
        self.stop == StopReason::ItemCap
    }

    /// Paging stopped on a quota signal
    pub fn is_quota(&self) -> bool {
        matches!(self.stop, StopReason::Quota { .. })
    }

    /// Paging stopped after retries ran out
    pub fn is_failed(&self) -> bool {
        matches!(self.stop, StopReason::Failed { .. })
    }
}
