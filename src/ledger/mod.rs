//! Checkpoint/resume ledger
//!
//! Records which units of work are finished so a restarted run skips them.
//!
//! # Overview
//!
//! - `Ledger` - trait over the storage of completed unit keys
//! - `CsvLedger` - append-only CSV file (`unit_key,completed_at`), flushed on
//!   every entry
//! - `MemoryLedger` - in-process ledger for dry runs and tests
//!
//! Loading never fails: a missing, unreadable or corrupt ledger yields an
//! empty set, and malformed rows are skipped.

mod csv_ledger;
mod types;

pub use csv_ledger::CsvLedger;
pub use types::{Ledger, LedgerEntry, MemoryLedger};
