//! Source types and traits

use crate::error::Result;
use crate::http::RateLimitStatus;
use crate::types::{Record, UnitOfWork};
use crate::window::TimeWindow;
use async_trait::async_trait;
use std::fmt;

/// Position marker for the next page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cursor {
    /// Opaque continuation token
    Token(String),
    /// Item offset
    Offset(u64),
    /// Page number
    Page(u32),
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Token(token) => f.write_str(token),
            Self::Offset(offset) => write!(f, "{offset}"),
            Self::Page(page) => write!(f, "{page}"),
        }
    }
}

/// One outbound search request descriptor
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// The unit of work this query belongs to
    pub unit: UnitOfWork,
    /// Time window, for time-bounded sources
    pub window: Option<TimeWindow>,
    /// Page cursor (`None` = first page)
    pub cursor: Option<Cursor>,
    /// Requested page size
    pub page_size: u32,
}

impl Query {
    /// Create a first-page query
    pub fn new(unit: UnitOfWork, window: Option<TimeWindow>, page_size: u32) -> Self {
        Self {
            unit,
            window,
            cursor: None,
            page_size,
        }
    }

    /// Same query positioned at a cursor
    #[must_use]
    pub fn with_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.cursor = cursor;
        self
    }

    /// Same query with a different page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    /// First-page query for a sub-window of this one
    pub fn for_window(&self, window: TimeWindow) -> Self {
        Self {
            unit: self.unit.clone(),
            window: Some(window),
            cursor: None,
            page_size: self.page_size,
        }
    }

    /// Human-readable label for logs
    pub fn label(&self) -> String {
        match &self.window {
            Some(window) => format!("{} {window}", self.unit.key),
            None => self.unit.key.to_string(),
        }
    }
}

/// One page of search results
#[derive(Debug, Clone, Default)]
pub struct Page {
    /// Records on this page
    pub records: Vec<Record>,
    /// Cursor for the next page (`None` = exhausted)
    pub next_cursor: Option<Cursor>,
    /// Self-reported total/estimate for the whole query
    pub total: Option<u64>,
    /// Rate-limit headers seen with this page
    pub rate_limit: RateLimitStatus,
}

impl Page {
    /// An empty, terminal page
    pub fn empty() -> Self {
        Self::default()
    }

    /// A page holding records
    pub fn new(records: Vec<Record>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    /// Set the next cursor
    #[must_use]
    pub fn with_next(mut self, cursor: Option<Cursor>) -> Self {
        self.next_cursor = cursor;
        self
    }

    /// Set the total estimate
    #[must_use]
    pub fn with_total(mut self, total: Option<u64>) -> Self {
        self.total = total;
        self
    }

    /// Set the rate-limit status
    #[must_use]
    pub fn with_rate_limit(mut self, rate_limit: RateLimitStatus) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

/// An external paginated search API
#[async_trait]
pub trait SearchSource: Send + Sync {
    /// Source name for logs
    fn name(&self) -> &str;

    /// Fetch one page for the query
    ///
    /// Not-found responses must come back as an empty page, and quota or
    /// permission failures as `Error::QuotaExhausted`.
    async fn fetch_page(&self, query: &Query) -> Result<Page>;

    /// Estimate the total result count without fetching everything
    ///
    /// The default fetches the first page with a page size of one.
    async fn estimate(&self, query: &Query) -> Result<Option<u64>> {
        let first = query.clone().with_cursor(None).with_page_size(1);
        Ok(self.fetch_page(&first).await?.total)
    }
}
