//! In-memory search sources for tests

use super::types::{Cursor, Page, Query, SearchSource};
use crate::error::Result;
use crate::types::Record;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Mutex;

type Handler = Box<dyn Fn(&Query, usize) -> Result<Page> + Send + Sync>;

/// A source answering from a closure; the closure also sees the call index
pub(crate) struct FakeSource {
    handler: Handler,
    calls: Mutex<Vec<Query>>,
}

impl FakeSource {
    /// Answer every call with `handler`
    pub(crate) fn new(handler: impl Fn(&Query, usize) -> Result<Page> + Send + Sync + 'static) -> Self {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Serve timestamped items through offset pagination
    ///
    /// Each query sees only the items inside its window; at most `cap` of
    /// them are reachable, while the reported total is the true count.
    pub(crate) fn timeline(items: Vec<(String, DateTime<Utc>)>, cap: usize) -> Self {
        Self::new(move |query, _| {
            let mut matching: Vec<&(String, DateTime<Utc>)> = items
                .iter()
                .filter(|(_, at)| query.window.map_or(true, |w| w.contains(*at)))
                .collect();
            matching.sort_by_key(|(_, at)| *at);

            let total = matching.len() as u64;
            let visible = &matching[..matching.len().min(cap)];
            let offset = match query.cursor {
                Some(Cursor::Offset(offset)) => offset as usize,
                _ => 0,
            };
            let end = (offset + query.page_size as usize).min(visible.len());
            let records = visible
                .get(offset..end)
                .unwrap_or_default()
                .iter()
                .map(|(id, _)| Record::bare(id.clone()))
                .collect();
            let next = (end < visible.len()).then_some(Cursor::Offset(end as u64));

            Ok(Page::new(records).with_next(next).with_total(Some(total)))
        })
    }

    /// Serve a fixed id list through offset pagination, no window filtering
    pub(crate) fn ids(ids: &[&str]) -> Self {
        let now = Utc::now();
        let items = ids.iter().map(|id| ((*id).to_string(), now)).collect();
        Self::timeline(items, usize::MAX)
    }

    /// Answer a query without recording it
    pub(crate) fn answer(&self, query: &Query) -> Result<Page> {
        (self.handler)(query, 0)
    }

    /// Queries received so far
    pub(crate) fn calls(&self) -> Vec<Query> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Number of calls received so far
    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }
}

#[async_trait]
impl SearchSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_page(&self, query: &Query) -> Result<Page> {
        let index = {
            let mut calls = self.calls.lock().expect("calls lock poisoned");
            calls.push(query.clone());
            calls.len() - 1
        };
        (self.handler)(query, index)
    }
}
