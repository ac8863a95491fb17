//! Tests for window module

use super::*;
use chrono::{Duration, TimeZone, Utc};
use pretty_assertions::assert_eq;

fn day(y: i32, m: u32, d: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn assert_exact_cover(window: &TimeWindow, chunks: &[TimeWindow]) {
    assert!(!chunks.is_empty());
    assert_eq!(chunks.first().unwrap().start, window.start);
    assert_eq!(chunks.last().unwrap().end, window.end);
    for pair in chunks.windows(2) {
        assert_eq!(pair[0].end, pair[1].start, "gap or overlap between chunks");
    }
    for chunk in chunks {
        assert!(chunk.start < chunk.end);
    }
}

// ============================================================================
// TimeWindow Tests
// ============================================================================

#[test]
fn test_window_rejects_inverted_range() {
    assert!(TimeWindow::new(day(2023, 2, 1), day(2023, 1, 1)).is_err());
    assert!(TimeWindow::new(day(2023, 1, 1), day(2023, 1, 1)).is_err());
}

#[test]
fn test_window_contains_is_half_open() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 2, 1)).unwrap();
    assert!(window.contains(day(2023, 1, 1)));
    assert!(window.contains(day(2023, 1, 31)));
    assert!(!window.contains(day(2023, 2, 1)));
}

#[test]
fn test_window_bisect() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 1, 11)).unwrap();
    let (left, right) = window.bisect(Duration::days(1)).unwrap();
    assert_eq!(left.end, day(2023, 1, 6));
    assert_eq!(right.start, day(2023, 1, 6));
    assert_eq!(right.end, window.end);

    assert!(window.bisect(Duration::days(6)).is_none());
}

#[test]
fn test_window_display() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 7, 20)).unwrap();
    assert_eq!(window.to_string(), "[2023-01-01, 2023-07-20)");
}

// ============================================================================
// Split Tests
// ============================================================================

#[test]
fn test_split_100_days_covers_range_exactly() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 7, 20)).unwrap();
    let chunks = split_window(&window, ChunkSize::Days(100));

    assert_exact_cover(&window, &chunks);
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].end, day(2023, 4, 11));
}

#[test]
fn test_split_short_final_chunk() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 8, 1)).unwrap();
    let chunks = split_window(&window, ChunkSize::Days(100));

    assert_exact_cover(&window, &chunks);
    assert_eq!(chunks.len(), 3);
    assert_eq!(chunks[2].start, day(2023, 7, 20));
    assert_eq!(chunks[2].end, day(2023, 8, 1));
    assert!(chunks[2].duration() < Duration::days(100));
}

#[test]
fn test_split_calendar_months() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 5, 15)).unwrap();
    let chunks = split_window(&window, ChunkSize::Months(1));

    assert_exact_cover(&window, &chunks);
    let starts: Vec<_> = chunks.iter().map(|c| c.start).collect();
    assert_eq!(
        starts,
        vec![
            day(2023, 1, 1),
            day(2023, 2, 1),
            day(2023, 3, 1),
            day(2023, 4, 1),
            day(2023, 5, 1)
        ]
    );
}

#[test]
fn test_split_months_does_not_drift_from_month_end() {
    let window = TimeWindow::new(day(2023, 1, 31), day(2023, 6, 1)).unwrap();
    let chunks = split_window(&window, ChunkSize::Months(1));

    assert_exact_cover(&window, &chunks);
    // Feb is clamped to the 28th but March returns to the 31st.
    assert_eq!(chunks[1].start, day(2023, 2, 28));
    assert_eq!(chunks[2].start, day(2023, 3, 31));
}

#[test]
fn test_split_chunk_larger_than_window() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 1, 10)).unwrap();
    let chunks = split_window(&window, ChunkSize::Months(3));
    assert_eq!(chunks, vec![window]);
}

// ============================================================================
// Parsing Tests
// ============================================================================

#[test]
fn test_parse_chunk_size() {
    assert_eq!(parse_chunk_size("100d").unwrap(), ChunkSize::Days(100));
    assert_eq!(parse_chunk_size("2w").unwrap(), ChunkSize::Days(14));
    assert_eq!(parse_chunk_size("1mo").unwrap(), ChunkSize::Months(1));
    assert_eq!(parse_chunk_size("30").unwrap(), ChunkSize::Days(30));
    assert!(parse_chunk_size("0d").is_err());
    assert!(parse_chunk_size("soon").is_err());
}

#[test]
fn test_chunk_size_serde() {
    let chunk: ChunkSize = serde_yaml::from_str("\"3mo\"").unwrap();
    assert_eq!(chunk, ChunkSize::Months(3));
    assert_eq!(serde_json::to_string(&ChunkSize::Days(100)).unwrap(), "\"100d\"");
}

#[test]
fn test_parse_datetime_formats() {
    assert_eq!(parse_datetime("2023-01-01").unwrap(), day(2023, 1, 1));
    assert_eq!(parse_datetime("2023/01/01").unwrap(), day(2023, 1, 1));
    assert_eq!(
        parse_datetime("2023-01-01T06:30:00Z").unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 1, 6, 30, 0).unwrap()
    );
    assert_eq!(
        parse_datetime("2023-01-01 06:30:00").unwrap(),
        Utc.with_ymd_and_hms(2023, 1, 1, 6, 30, 0).unwrap()
    );
    assert!(parse_datetime("yesterday").is_err());
}

#[test]
fn test_last_second_of_window() {
    let window = TimeWindow::new(day(2023, 1, 1), day(2023, 2, 1)).unwrap();
    assert_eq!(window.last(), day(2023, 2, 1) - Duration::seconds(1));

    let tiny = TimeWindow::new(
        parse_datetime("2023-01-01T00:00:00Z").unwrap(),
        parse_datetime("2023-01-01T00:00:00.500Z").unwrap(),
    )
    .unwrap();
    assert_eq!(tiny.last(), tiny.start);
}
