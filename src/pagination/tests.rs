//! Tests for pagination module

use super::*;
use crate::error::Error;
use crate::http::RateLimitStatus;
use crate::retry::{QuotaAction, RetryController, RetryPolicy};
use crate::source::fake::FakeSource;
use crate::source::{Cursor, Page, Query};
use crate::types::{BackoffType, Record, UnitOfWork};
use chrono::Utc;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn retry(attempts: u32) -> RetryController {
    RetryController::new(
        RetryPolicy::new()
            .with_max_attempts(attempts)
            .with_backoff(
                BackoffType::Constant,
                Duration::from_millis(1),
                Duration::from_millis(1),
            )
            .with_reset_grace(Duration::ZERO),
    )
}

fn query(page_size: u32) -> Query {
    Query::new(UnitOfWork::new("Vespa velutina"), None, page_size)
}

fn ids(outcome: &FetchOutcome) -> Vec<&str> {
    outcome.records.iter().map(|r| r.id.as_str()).collect()
}

// ============================================================================
// Policy Tests
// ============================================================================

#[test]
fn test_policy_builders() {
    let policy = PaginationPolicy::new()
        .with_page_size(200)
        .with_max_items(Some(10_000))
        .with_max_consecutive_empty(3)
        .with_inter_page_delay(Duration::from_millis(250));

    assert_eq!(policy.page_size, 200);
    assert_eq!(policy.max_items, Some(10_000));
    assert_eq!(policy.max_consecutive_empty, 3);
    assert_eq!(policy.inter_page_delay, Duration::from_millis(250));
}

// ============================================================================
// Driver Tests
// ============================================================================

#[tokio::test]
async fn test_walks_all_pages_until_no_cursor() {
    let source = FakeSource::ids(&["a", "b", "c", "d", "e"]);
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(2)).await;

    assert_eq!(ids(&outcome), vec!["a", "b", "c", "d", "e"]);
    assert_eq!(outcome.fetched, 5);
    assert_eq!(outcome.pages, 3);
    assert_eq!(outcome.estimated_total, Some(5));
    assert_eq!(outcome.stop, StopReason::Exhausted);
    assert!(outcome.is_complete());
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_item_cap_truncates() {
    let source = FakeSource::ids(&["a", "b", "c", "d", "e"]);
    let retry = retry(3);
    let policy = PaginationPolicy::new().with_max_items(Some(3));
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(2)).await;

    assert_eq!(ids(&outcome), vec!["a", "b", "c"]);
    assert!(outcome.hit_cap());
    assert_eq!(source.call_count(), 2);
}

#[tokio::test]
async fn test_first_empty_page_stops() {
    let source = FakeSource::new(|_, _| {
        Ok(Page::empty().with_next(Some(Cursor::Token("more".to_string()))))
    });
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(10)).await;

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stop, StopReason::EmptyPages);
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_tolerates_configured_empty_pages() {
    // empty, duplicate-only, then fresh data
    let source = FakeSource::new(|query, index| {
        let next = Some(Cursor::Page(index as u32 + 2));
        match index {
            0 => Ok(Page::new(vec![Record::bare("x")]).with_next(next)),
            1 => Ok(Page::empty().with_next(next)),
            2 => Ok(Page::new(vec![Record::bare("x")]).with_next(next)),
            3 => Ok(Page::new(vec![Record::bare("y")])),
            _ => panic!("unexpected call for {query:?}"),
        }
    });
    let retry = retry(3);
    let policy = PaginationPolicy::new().with_max_consecutive_empty(3);
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["x", "y"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_duplicate_only_pages_count_as_empty() {
    let source = FakeSource::new(|_, index| {
        Ok(Page::new(vec![Record::bare("same")]).with_next(Some(Cursor::Offset(index as u64 + 1))))
    });
    let retry = retry(3);
    let policy = PaginationPolicy::new().with_max_consecutive_empty(2);
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["same"]);
    assert_eq!(outcome.stop, StopReason::EmptyPages);
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_repeated_cursor_stops() {
    let source = FakeSource::new(|_, index| {
        Ok(Page::new(vec![Record::bare(format!("r{index}"))])
            .with_next(Some(Cursor::Token("stuck".to_string()))))
    });
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["r0", "r1"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_failure_keeps_earlier_pages() {
    let source = FakeSource::new(|_, index| {
        if index == 0 {
            Ok(Page::new(vec![Record::bare("a")]).with_next(Some(Cursor::Offset(1))))
        } else {
            Err(Error::http_status(500, "boom"))
        }
    });
    let retry = retry(2);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["a"]);
    assert!(outcome.is_failed());
    assert!(!outcome.is_complete());
    assert_eq!(source.call_count(), 3);
}

#[tokio::test]
async fn test_quota_error_stops() {
    let source = FakeSource::new(|_, _| Err(Error::quota("daily limit", None)));
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert!(outcome.is_quota());
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_exhausted_rate_limit_halts_before_next_page() {
    let reset = Utc::now() + chrono::Duration::hours(1);
    let source = FakeSource::new(move |_, _| {
        Ok(Page::new(vec![Record::bare("a")])
            .with_next(Some(Cursor::Offset(1)))
            .with_rate_limit(RateLimitStatus {
                remaining: Some(0),
                reset_at: Some(reset),
            }))
    });
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["a"]);
    assert_eq!(
        outcome.stop,
        StopReason::Quota {
            reason: "rate limit exhausted".to_string(),
            reset_at: Some(reset),
        }
    );
    assert_eq!(source.call_count(), 1);
}

#[tokio::test]
async fn test_exhausted_rate_limit_waits_when_configured() {
    let source = FakeSource::new(|_, index| {
        if index == 0 {
            Ok(Page::new(vec![Record::bare("a")])
                .with_next(Some(Cursor::Offset(1)))
                .with_rate_limit(RateLimitStatus {
                    remaining: Some(0),
                    reset_at: Some(Utc::now() + chrono::Duration::milliseconds(10)),
                }))
        } else {
            Ok(Page::new(vec![Record::bare("b")]))
        }
    });
    let retry = RetryController::new(
        RetryPolicy::new()
            .with_quota_action(QuotaAction::SleepUntilReset, Duration::from_secs(5))
            .with_reset_grace(Duration::ZERO),
    );
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    let outcome = driver.fetch(&query(1)).await;

    assert_eq!(ids(&outcome), vec!["a", "b"]);
    assert_eq!(outcome.stop, StopReason::Exhausted);
}

#[tokio::test]
async fn test_cursor_is_forwarded() {
    let source = FakeSource::ids(&["a", "b", "c"]);
    let retry = retry(3);
    let policy = PaginationPolicy::new();
    let driver = PaginationDriver::new(&source, &retry, &policy);

    driver.fetch(&query(2)).await;

    let cursors: Vec<_> = source.calls().into_iter().map(|q| q.cursor).collect();
    assert_eq!(cursors, vec![None, Some(Cursor::Offset(2))]);
}
