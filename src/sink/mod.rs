//! Deduplicating append-merge sink
//!
//! Merges each unit's records into the durable output table without ever
//! writing an identity key twice.
//!
//! # Overview
//!
//! - `TableSchema` / `Column` / `ColumnSource` - output columns, drawn from
//!   record fields, unit attributes or roster parameters
//! - `RecordSink` - trait the harvester writes through
//! - `CsvSink` - CSV table with cached identity keys, flushed per merge
//! - `MergeStats` - rows written and duplicates dropped per merge

mod csv_sink;
mod schema;

pub use csv_sink::{CsvSink, MergeStats, RecordSink};
pub use schema::{Column, ColumnSource, TableSchema, PLACEHOLDER_PREFIX};

#[cfg(test)]
mod tests;
