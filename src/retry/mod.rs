//! Retry/backoff controller
//!
//! Wraps one outbound call in bounded-retry semantics.
//!
//! # Overview
//!
//! - `RetryPolicy` - attempt budget, backoff curve and quota handling
//! - `RetryController` - runs a zero-argument async call under a policy
//! - `CallOutcome` - success, exhaustion sentinel, or quota signal
//!
//! Exhaustion is reported as a value rather than an error so that the caller
//! can skip the current unit of work and keep the batch going.

mod controller;

pub use controller::{CallOutcome, QuotaAction, RetryController, RetryPolicy};
