//! Pagination module
//!
//! Walks a single query page by page until the source runs dry.
//!
//! # Overview
//!
//! - `PaginationPolicy` - page size, per-query item cap, empty-page tolerance
//!   and inter-page delay
//! - `PaginationDriver` - issues each page through the retry controller and
//!   follows the source's own next cursor
//! - `FetchOutcome` / `StopReason` - what was collected and why paging ended

mod driver;
mod types;

pub use driver::PaginationDriver;
pub use types::{FetchOutcome, PaginationPolicy, StopReason};

#[cfg(test)]
mod tests;
