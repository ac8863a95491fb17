//! Time window module
//!
//! Half-open `[start, end)` windows over the time dimension of a query and
//! the chunking used to refine capped queries.
//!
//! # Overview
//!
//! - `TimeWindow` - a half-open UTC interval
//! - `ChunkSize` - fixed-day or calendar-month chunk length
//! - `split_window` - partition a window into contiguous chunks

mod split;
mod types;

pub use split::{parse_chunk_size, parse_datetime, split_window};
pub use types::{ChunkSize, TimeWindow};

#[cfg(test)]
mod tests;
