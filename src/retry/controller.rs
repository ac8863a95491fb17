//! Retry controller implementation

use crate::error::{Error, Result};
use crate::types::BackoffType;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// How many times a single call may sleep through a quota reset
const MAX_QUOTA_WAITS: u32 = 3;

/// What to do when the API signals quota/permission exhaustion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotaAction {
    /// Stop the whole run; the ledger lets the next invocation resume
    #[default]
    Halt,
    /// Sleep until the reported reset time, then try again
    SleepUntilReset,
}

/// Retry policy for one outbound call
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Backoff curve between attempts
    pub backoff_type: BackoffType,
    /// Delay after the first failure
    pub initial_backoff: Duration,
    /// Upper bound for any single backoff delay
    pub max_backoff: Duration,
    /// Quota handling
    pub quota_action: QuotaAction,
    /// Longest reset we are willing to sleep through
    pub max_quota_wait: Duration,
    /// Extra time added after a reported reset instant
    pub reset_grace: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_type: BackoffType::Exponential,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(60),
            quota_action: QuotaAction::Halt,
            max_quota_wait: Duration::from_secs(15 * 60),
            reset_grace: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Create the default policy
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the attempt budget
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set backoff configuration
    #[must_use]
    pub fn with_backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.backoff_type = backoff_type;
        self.initial_backoff = initial;
        self.max_backoff = max;
        self
    }

    /// Set quota handling
    #[must_use]
    pub fn with_quota_action(mut self, action: QuotaAction, max_wait: Duration) -> Self {
        self.quota_action = action;
        self.max_quota_wait = max_wait;
        self
    }

    /// Set the grace period after a reset instant
    #[must_use]
    pub fn with_reset_grace(mut self, grace: Duration) -> Self {
        self.reset_grace = grace;
        self
    }

    /// Calculate backoff delay after the given (zero-based) failed attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.backoff_type {
            BackoffType::Constant => self.initial_backoff,
            BackoffType::Linear => self.initial_backoff.saturating_mul(attempt.saturating_add(1)),
            BackoffType::Exponential => {
                let factor = 2u32.saturating_pow(attempt);
                self.initial_backoff.saturating_mul(factor)
            }
        };

        std::cmp::min(delay, self.max_backoff)
    }
}

/// Result of running a call under the retry controller
#[derive(Debug)]
pub enum CallOutcome<T> {
    /// The call succeeded
    Success(T),
    /// Every attempt failed with a transient error
    Exhausted {
        /// Attempts made
        attempts: u32,
        /// Display form of the last error
        last_error: String,
    },
    /// The API signalled quota/permission exhaustion
    Quota {
        /// Display form of the quota error
        reason: String,
        /// When the quota resets, if reported
        reset_at: Option<DateTime<Utc>>,
    },
}

impl<T> CallOutcome<T> {
    /// Check if the call succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Check if this is a quota signal
    pub fn is_quota(&self) -> bool {
        matches!(self, Self::Quota { .. })
    }

    /// Take the success value, if any
    pub fn success(self) -> Option<T> {
        match self {
            Self::Success(value) => Some(value),
            _ => None,
        }
    }
}

/// Runs calls under a [`RetryPolicy`]
#[derive(Debug, Default)]
pub struct RetryController {
    policy: RetryPolicy,
    retries: AtomicU64,
}

impl RetryController {
    /// Create a controller for a policy
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            retries: AtomicU64::new(0),
        }
    }

    /// Get the policy
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Number of retries (attempts beyond the first) performed so far
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Run `call` until it succeeds, the attempt budget is spent, or a quota
    /// signal ends it
    pub async fn run<T, F, Fut>(&self, label: &str, mut call: F) -> CallOutcome<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt: u32 = 0;
        let mut quota_waits: u32 = 0;

        loop {
            attempt += 1;

            let err = match call().await {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{label}: succeeded on attempt {attempt}/{max_attempts}");
                    }
                    return CallOutcome::Success(value);
                }
                Err(err) => err,
            };

            if err.is_quota() {
                match self.quota_wait(&err, quota_waits) {
                    Some(wait) => {
                        warn!("{label}: {err}; sleeping {wait:?} until quota resets");
                        tokio::time::sleep(wait).await;
                        quota_waits += 1;
                        // Waiting out a reset does not spend the attempt budget.
                        attempt -= 1;
                        continue;
                    }
                    None => {
                        warn!("{label}: {err}; halting");
                        return CallOutcome::Quota {
                            reason: err.to_string(),
                            reset_at: err.quota_reset(),
                        };
                    }
                }
            }

            if !err.is_retryable() {
                warn!("{label}: non-retryable error: {err}");
                return CallOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                };
            }

            if attempt >= max_attempts {
                warn!("{label}: giving up after {attempt} attempts: {err}");
                return CallOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                };
            }

            let delay = self.retry_delay(&err, attempt - 1);
            warn!(
                "{label}: attempt {attempt}/{max_attempts} failed ({err}), retrying in {delay:?}"
            );
            self.retries.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before the next attempt, honouring a server-provided retry-after
    fn retry_delay(&self, err: &Error, attempt: u32) -> Duration {
        let backoff = self.policy.calculate_backoff(attempt);
        match err {
            Error::RateLimited {
                retry_after_seconds,
            } => Duration::from_secs(*retry_after_seconds)
                .min(self.policy.max_backoff)
                .max(backoff),
            _ => backoff,
        }
    }

    /// How long to sleep for a quota signal, or `None` to halt
    fn quota_wait(&self, err: &Error, waits_so_far: u32) -> Option<Duration> {
        if self.policy.quota_action != QuotaAction::SleepUntilReset
            || waits_so_far >= MAX_QUOTA_WAITS
        {
            return None;
        }
        let reset_at = err.quota_reset()?;
        let until_reset = (reset_at - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        if until_reset > self.policy.max_quota_wait {
            return None;
        }
        Some(until_reset + self.policy.reset_grace)
    }
}
