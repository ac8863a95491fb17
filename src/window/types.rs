//! Time window types

use crate::error::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A half-open time interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeWindow {
    /// Inclusive start
    pub start: DateTime<Utc>,
    /// Exclusive end
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window, rejecting empty or inverted ranges
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self> {
        if start >= end {
            return Err(Error::config(format!(
                "Invalid time window: start {} is not before end {}",
                start.to_rfc3339(),
                end.to_rfc3339()
            )));
        }
        Ok(Self { start, end })
    }

    /// Length of the window
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Check whether an instant falls inside the window
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start <= at && at < self.end
    }

    /// Last whole second inside the window, for APIs with an inclusive upper bound
    pub fn last(&self) -> DateTime<Utc> {
        (self.end - Duration::seconds(1)).max(self.start)
    }

    /// Split the window in two halves, unless a half would be shorter than `min`
    pub fn bisect(&self, min: Duration) -> Option<(Self, Self)> {
        let half = self.duration() / 2;
        if half < min || half <= Duration::zero() {
            return None;
        }
        let mid = self.start + half;
        Some((
            Self {
                start: self.start,
                end: mid,
            },
            Self {
                start: mid,
                end: self.end,
            },
        ))
    }

    /// Format both bounds with a chrono format string
    pub fn format(&self, fmt: &str) -> (String, String) {
        (
            self.start.format(fmt).to_string(),
            self.end.format(fmt).to_string(),
        )
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%d"),
            self.end.format("%Y-%m-%d")
        )
    }
}

/// Length of a refinement chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChunkSize {
    /// Fixed number of days
    Days(u32),
    /// Calendar months (month boundaries, not 30-day blocks)
    Months(u32),
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self::Months(1)
    }
}

impl TryFrom<String> for ChunkSize {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        super::split::parse_chunk_size(&value)
    }
}

impl From<ChunkSize> for String {
    fn from(value: ChunkSize) -> Self {
        value.to_string()
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Days(n) => write!(f, "{n}d"),
            Self::Months(n) => write!(f, "{n}mo"),
        }
    }
}
