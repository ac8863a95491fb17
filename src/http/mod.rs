//! HTTP client module
//!
//! Provides the outbound HTTP client used by JSON search sources.
//!
//! # Features
//!
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Response Classification**: 404 as empty, 403/exhausted 429 as quota
//!   signals, everything else as retryable failures
//! - **Rate-limit headers**: remaining/reset values surfaced on every response
//!
//! Retries are not performed here; see [`crate::retry`].

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, JsonResponse, RateLimitStatus};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;
