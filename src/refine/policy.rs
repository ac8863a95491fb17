//! Refinement policy

use crate::window::ChunkSize;
use chrono::Duration;

/// Decides whether a capped fetch should be re-queried in smaller windows
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CapRule {
    /// The platform's single-query result cap
    pub cap: u64,
    /// Estimates at or below this are never refined
    pub small_estimate_threshold: u64,
    /// Fraction of the estimate considered good enough coverage
    pub coverage_threshold: f64,
    /// The estimate must exceed `cap * margin`
    pub margin: f64,
}

impl CapRule {
    /// Create a rule for a cap with default thresholds
    pub fn new(cap: u64) -> Self {
        Self {
            cap,
            small_estimate_threshold: cap,
            coverage_threshold: 0.7,
            margin: 1.5,
        }
    }

    /// Set the small-estimate threshold
    #[must_use]
    pub fn with_small_estimate_threshold(mut self, threshold: u64) -> Self {
        self.small_estimate_threshold = threshold;
        self
    }

    /// Set the coverage threshold
    #[must_use]
    pub fn with_coverage_threshold(mut self, coverage: f64) -> Self {
        self.coverage_threshold = coverage;
        self
    }

    /// Set the margin over the cap
    #[must_use]
    pub fn with_margin(mut self, margin: f64) -> Self {
        self.margin = margin;
        self
    }

    /// Whether `fetched` results out of an `estimate` call for refinement
    pub fn should_requery(&self, fetched: u64, estimate: u64) -> bool {
        if estimate <= self.small_estimate_threshold {
            return false;
        }
        if fetched >= estimate {
            return false;
        }
        if fetched as f64 >= self.coverage_threshold * estimate as f64 {
            return false;
        }
        fetched >= self.cap && estimate as f64 > self.cap as f64 * self.margin
    }
}

/// What triggers refinement
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub enum RefineTrigger {
    /// Never refine
    #[default]
    Never,
    /// Fetch the full range first, refine when the cap rule says so
    CapHit(CapRule),
    /// Refine up front when the pre-flight estimate exceeds `threshold`
    Estimate {
        /// Largest estimate fetched as a single query
        threshold: u64,
    },
}

/// How refinement splits a query
#[derive(Debug, Clone)]
pub struct RefinePolicy {
    /// When to refine
    pub trigger: RefineTrigger,
    /// Chunk size for the first split
    pub chunk: ChunkSize,
    /// Bisect sub-windows that are still capped
    pub recursive: bool,
    /// Smallest window bisection may produce
    pub min_window: Duration,
}

impl Default for RefinePolicy {
    fn default() -> Self {
        Self {
            trigger: RefineTrigger::default(),
            chunk: ChunkSize::default(),
            recursive: false,
            min_window: Duration::days(1),
        }
    }
}

impl RefinePolicy {
    /// Create a policy for a trigger with default chunking
    pub fn new(trigger: RefineTrigger) -> Self {
        Self {
            trigger,
            ..Self::default()
        }
    }

    /// Set the chunk size
    #[must_use]
    pub fn with_chunk(mut self, chunk: ChunkSize) -> Self {
        self.chunk = chunk;
        self
    }

    /// Enable recursive bisection down to `min_window`
    #[must_use]
    pub fn with_recursion(mut self, min_window: Duration) -> Self {
        self.recursive = true;
        self.min_window = min_window;
        self
    }
}
