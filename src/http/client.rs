//! HTTP client with rate limiting and response classification
//!
//! Each call is a single attempt. The client turns the raw response into
//! one of:
//! - a parsed JSON body (2xx), together with the rate-limit headers
//! - an empty "not found" response (404), which sources treat as zero results
//! - `Error::QuotaExhausted` for 403 and for 429 with no requests remaining
//! - a retryable error for everything else

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// Body fragments that mark a 403 as a quota (rather than credential) failure
const QUOTA_MARKERS: &[&str] = &[
    "quota",
    "ratelimitexceeded",
    "dailylimitexceeded",
    "usagelimits",
];

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers: BTreeMap::new(),
            user_agent: format!("species-harvest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Rate-limit information reported by the API on a response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitStatus {
    /// Requests left in the current window
    pub remaining: Option<u64>,
    /// When the window resets
    pub reset_at: Option<DateTime<Utc>>,
}

impl RateLimitStatus {
    /// Read `x-ratelimit-remaining` / `x-ratelimit-reset` (and the
    /// `x-rate-limit-*` spelling)
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let remaining = header_u64(headers, &["x-ratelimit-remaining", "x-rate-limit-remaining"]);
        let reset_at = header_u64(headers, &["x-ratelimit-reset", "x-rate-limit-reset"])
            .and_then(|secs| i64::try_from(secs).ok())
            .and_then(|secs| DateTime::from_timestamp(secs, 0));
        Self {
            remaining,
            reset_at,
        }
    }

    /// True when the API reported no requests left
    pub fn is_exhausted(&self) -> bool {
        self.remaining == Some(0)
    }
}

fn header_u64(headers: &HeaderMap, names: &[&str]) -> Option<u64> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse().ok())
    })
}

/// A classified JSON response
#[derive(Debug, Clone)]
pub struct JsonResponse {
    /// HTTP status code
    pub status: u16,
    /// Parsed body (`Null` for 404)
    pub body: Value,
    /// Rate-limit headers
    pub rate_limit: RateLimitStatus,
}

impl JsonResponse {
    /// Check whether the endpoint reported "not found"
    pub fn is_not_found(&self) -> bool {
        self.status == StatusCode::NOT_FOUND.as_u16()
    }
}

/// HTTP client with rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            rate_limiter,
        })
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Issue one GET request and classify the response
    pub async fn get_json(
        &self,
        url: &str,
        query: &[(String, String)],
        headers: &BTreeMap<String, String>,
    ) -> Result<JsonResponse> {
        if let Some(ref limiter) = self.rate_limiter {
            limiter.wait().await;
        }

        let mut req = self.client.get(url);
        for (key, value) in self.config.default_headers.iter().chain(headers) {
            req = req.header(key.as_str(), value.as_str());
        }
        if !query.is_empty() {
            req = req.query(query);
        }

        let response = req.send().await?;
        let status = response.status();
        let rate_limit = RateLimitStatus::from_headers(response.headers());
        let retry_after = extract_retry_after(response.headers());

        if status == StatusCode::NOT_FOUND {
            debug!("GET {url} -> 404, treating as empty");
            return Ok(JsonResponse {
                status: status.as_u16(),
                body: Value::Null,
                rate_limit,
            });
        }

        let text = response.text().await?;

        if let Some(err) = classify_failure(status, &text, rate_limit, retry_after) {
            return Err(err);
        }

        let body: Value = serde_json::from_str(&text).map_err(|e| {
            Error::decode(format!("Response from {url} is not valid JSON: {e}"))
        })?;

        debug!("GET {url} -> {}", status.as_u16());
        Ok(JsonResponse {
            status: status.as_u16(),
            body,
            rate_limit,
        })
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Map a non-success status to the error taxonomy
fn classify_failure(
    status: StatusCode,
    body: &str,
    rate_limit: RateLimitStatus,
    retry_after: Option<u64>,
) -> Option<Error> {
    if status.is_success() {
        return None;
    }

    if status == StatusCode::FORBIDDEN {
        let lowered = body.to_lowercase();
        let reason = if QUOTA_MARKERS.iter().any(|m| lowered.contains(m)) {
            "quota exceeded (HTTP 403)"
        } else {
            "permission denied (HTTP 403)"
        };
        return Some(Error::quota(reason, rate_limit.reset_at));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        if rate_limit.is_exhausted() {
            return Some(Error::quota("rate limit exhausted (HTTP 429)", rate_limit.reset_at));
        }
        return Some(Error::RateLimited {
            retry_after_seconds: retry_after.unwrap_or(60),
        });
    }

    Some(Error::http_status(status.as_u16(), truncate(body, 512)))
}

fn truncate(body: &str, max: usize) -> String {
    match body.char_indices().nth(max) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}

/// Extract retry-after header value
fn extract_retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse().ok())
}
