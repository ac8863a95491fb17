//! Window splitting and parsing helpers

use super::types::{ChunkSize, TimeWindow};
use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Months, NaiveDate, NaiveDateTime, Utc};

/// Partition a window into contiguous chunks of the given size
///
/// Boundaries are computed from the window start (`start + i * chunk`) rather
/// than by repeated addition, so calendar-month chunks never drift when the
/// start falls on a day that some months lack. The final chunk is clipped to
/// the window end.
pub fn split_window(window: &TimeWindow, chunk: ChunkSize) -> Vec<TimeWindow> {
    let mut chunks = Vec::new();
    let mut current = window.start;
    let mut index: u32 = 1;

    while current < window.end {
        let boundary = chunk_boundary(window.start, chunk, index)
            .filter(|b| *b > current)
            .map_or(window.end, |b| b.min(window.end));

        chunks.push(TimeWindow {
            start: current,
            end: boundary,
        });

        current = boundary;
        index = index.saturating_add(1);
    }

    chunks
}

fn chunk_boundary(anchor: DateTime<Utc>, chunk: ChunkSize, index: u32) -> Option<DateTime<Utc>> {
    match chunk {
        ChunkSize::Days(n) => {
            let days = i64::from(n).checked_mul(i64::from(index))?;
            anchor.checked_add_signed(Duration::try_days(days)?)
        }
        ChunkSize::Months(n) => anchor.checked_add_months(Months::new(n.checked_mul(index)?)),
    }
}

/// Parse a chunk size like "100d", "2w" or "1mo"
pub fn parse_chunk_size(s: &str) -> Result<ChunkSize> {
    let s = s.trim();

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("mo") {
        (stripped, "mo")
    } else if let Some(stripped) = s.strip_suffix('d') {
        (stripped, "d")
    } else if let Some(stripped) = s.strip_suffix('w') {
        (stripped, "w")
    } else {
        // Assume days if no suffix
        (s, "d")
    };

    let num: u32 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid chunk size: {s}")))?;

    if num == 0 {
        return Err(Error::config(format!("Chunk size must be positive: {s}")));
    }

    match unit {
        "mo" => Ok(ChunkSize::Months(num)),
        "w" => num
            .checked_mul(7)
            .map(ChunkSize::Days)
            .ok_or_else(|| Error::config(format!("Chunk size too large: {s}"))),
        _ => Ok(ChunkSize::Days(num)),
    }
}

/// Parse a datetime string into UTC DateTime
pub fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
    // Try RFC 3339 first
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let datetime_formats = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];
    for fmt in datetime_formats {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(ndt, Utc));
        }
    }

    let date_formats = ["%Y-%m-%d", "%Y/%m/%d"];
    for fmt in date_formats {
        if let Ok(nd) = NaiveDate::parse_from_str(s, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(
                nd.and_time(chrono::NaiveTime::MIN),
                Utc,
            ));
        }
    }

    Err(Error::config(format!("Invalid datetime format: {s}")))
}
