//! Search source module
//!
//! The boundary between the harvesting engine and an external search API.
//!
//! # Overview
//!
//! - `Query` - one outbound request descriptor (unit, window, cursor, page size)
//! - `Page` - one page of results with its next cursor and total estimate
//! - `SearchSource` - trait implemented per external service
//! - `JsonSearchSource` - declarative implementation over HTTP/JSON

mod json;
mod types;

pub use json::JsonSearchSource;
pub use types::{Cursor, Page, Query, SearchSource};

#[cfg(test)]
pub(crate) mod fake;
