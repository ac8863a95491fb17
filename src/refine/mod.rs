//! Volume cap detection and query refinement
//!
//! Recovers results a platform's single-query cap would otherwise hide by
//! splitting the query's time window into smaller sub-queries.
//!
//! # Overview
//!
//! - `CapRule` - decides whether a capped fetch is worth re-querying
//! - `RefineTrigger` / `RefinePolicy` - when and how to split
//! - `RefineState` / `RefineEvent` / `transition` - the refinement state
//!   machine, free of I/O
//! - `Refiner` - drives the state machine over a search source

mod policy;
mod refiner;
mod state;

pub use policy::{CapRule, RefinePolicy, RefineTrigger};
pub use refiner::{RefineOutcome, Refiner};
pub use state::{transition, RefineEvent, RefineState};
