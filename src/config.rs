//! Configuration types for source definitions
//!
//! This module contains the structures used to describe one harvested source
//! in YAML: how to call it, how to page through it, when to refine, how to
//! retry, and what the output table looks like.

use crate::error::{Error, Result};
use crate::http::{HttpClientConfig, RateLimiterConfig};
use crate::pagination::PaginationPolicy;
use crate::refine::{CapRule, RefinePolicy, RefineTrigger};
use crate::retry::{QuotaAction, RetryPolicy};
use crate::sink::{Column, ColumnSource, TableSchema};
use crate::types::BackoffType;
use crate::window::{parse_datetime, ChunkSize, TimeWindow};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

// ============================================================================
// Top-Level Source Definition
// ============================================================================

/// Complete source definition loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceDefinition {
    /// Unique source name (e.g., "inaturalist")
    pub name: String,

    /// Base URL for API requests
    pub base_url: String,

    /// Request shape
    pub request: RequestDefinition,

    /// Where records, ids and totals live in the response
    pub response: ResponseDefinition,

    /// How the next page is addressed
    #[serde(default)]
    pub cursor: CursorDefinition,

    /// Page-walking limits
    #[serde(default)]
    pub pagination: PaginationDefinition,

    /// Cap detection and time-window refinement
    #[serde(default)]
    pub refine: RefineDefinition,

    /// Retry and quota handling
    #[serde(default)]
    pub retry: RetryDefinition,

    /// HTTP client settings
    #[serde(default)]
    pub http: HttpDefinition,

    /// Default date range and pacing
    #[serde(default)]
    pub harvest: HarvestDefinition,

    /// Roster column mapping
    #[serde(default)]
    pub roster: RosterDefinition,

    /// Output table schema
    pub output: OutputDefinition,
}

// ============================================================================
// Request / Response
// ============================================================================

/// Request definition
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestDefinition {
    /// Path appended to the base URL (may contain templates)
    #[serde(default)]
    pub path: String,

    /// Query parameters; values are templates
    #[serde(default)]
    pub params: BTreeMap<String, String>,

    /// Extra headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Query parameter carrying the page size
    #[serde(default)]
    pub page_size_param: Option<String>,

    /// chrono format for `{{ window.start }}`, `{{ window.end }}` and `{{ window.last }}`
    #[serde(default = "default_window_format")]
    pub window_format: String,
}

fn default_window_format() -> String {
    "%Y-%m-%d".to_string()
}

/// Response definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseDefinition {
    /// Path to the record array (empty = body is the array)
    #[serde(default)]
    pub records_path: String,

    /// Path to the identity key inside a record
    #[serde(default = "default_id_path")]
    pub id_path: String,

    /// Path to the total/estimate count
    #[serde(default)]
    pub total_path: Option<String>,

    /// Path to a boolean "no more results" flag
    #[serde(default)]
    pub end_path: Option<String>,
}

fn default_id_path() -> String {
    "id".to_string()
}

/// Cursor definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CursorDefinition {
    /// Single request, no pagination
    #[default]
    None,
    /// Continuation token read from the response
    Token {
        /// Query parameter carrying the token
        param: String,
        /// Path to the next token in the response
        path: String,
    },
    /// Numeric offset advanced by the page length
    Offset {
        /// Query parameter carrying the offset
        param: String,
    },
    /// Page number
    Page {
        /// Query parameter carrying the page number
        param: String,
        /// First page number
        #[serde(default = "default_start_page")]
        start: u32,
    },
}

fn default_start_page() -> u32 {
    1
}

// ============================================================================
// Pagination
// ============================================================================

/// Pagination limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationDefinition {
    /// Items requested per page
    #[serde(default = "default_page_size")]
    pub page_size: u32,

    /// Hard per-query item cap
    #[serde(default)]
    pub max_items: Option<u64>,

    /// Consecutive empty/duplicate-only pages before stopping
    #[serde(default = "default_max_consecutive_empty")]
    pub max_consecutive_empty: u32,

    /// Delay between pages
    #[serde(default = "default_inter_page_delay", with = "humane")]
    pub inter_page_delay: Duration,
}

impl Default for PaginationDefinition {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            max_items: None,
            max_consecutive_empty: default_max_consecutive_empty(),
            inter_page_delay: default_inter_page_delay(),
        }
    }
}

fn default_page_size() -> u32 {
    100
}

fn default_max_consecutive_empty() -> u32 {
    1
}

fn default_inter_page_delay() -> Duration {
    Duration::from_millis(500)
}

impl PaginationDefinition {
    /// Build the runtime pagination policy
    pub fn to_policy(&self) -> PaginationPolicy {
        PaginationPolicy {
            page_size: self.page_size,
            max_items: self.max_items,
            max_consecutive_empty: self.max_consecutive_empty,
            inter_page_delay: self.inter_page_delay,
        }
    }
}

// ============================================================================
// Refinement
// ============================================================================

/// Which signal triggers refinement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// Never refine
    Never,
    /// Refine after a full-range fetch hits the cap
    #[default]
    CapHit,
    /// Refine when the pre-flight estimate is too large
    Estimate,
}

/// Refinement definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineDefinition {
    /// Trigger kind
    #[serde(default)]
    pub trigger: TriggerKind,

    /// Platform's single-query cap (defaults to `pagination.max_items`)
    #[serde(default)]
    pub cap: Option<u64>,

    /// Estimates at or below this never refine (defaults to the cap)
    #[serde(default)]
    pub small_estimate: Option<u64>,

    /// Coverage fraction at which refinement is not worth it
    #[serde(default = "default_coverage")]
    pub coverage: f64,

    /// Estimate must exceed `cap * margin` to refine
    #[serde(default = "default_margin")]
    pub margin: f64,

    /// Pre-flight estimate threshold for the `estimate` trigger
    #[serde(default = "default_estimate_threshold")]
    pub estimate_threshold: u64,

    /// Chunk size for sub-windows
    #[serde(default)]
    pub chunk: ChunkSize,

    /// Bisect capped sub-windows further
    #[serde(default)]
    pub recursive: bool,

    /// Smallest window recursive refinement may produce
    #[serde(default = "default_min_window", with = "humane")]
    pub min_window: Duration,
}

impl Default for RefineDefinition {
    fn default() -> Self {
        Self {
            trigger: TriggerKind::default(),
            cap: None,
            small_estimate: None,
            coverage: default_coverage(),
            margin: default_margin(),
            estimate_threshold: default_estimate_threshold(),
            chunk: ChunkSize::default(),
            recursive: false,
            min_window: default_min_window(),
        }
    }
}

fn default_coverage() -> f64 {
    0.7
}

fn default_margin() -> f64 {
    1.5
}

fn default_estimate_threshold() -> u64 {
    10_000
}

fn default_min_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

impl RefineDefinition {
    /// Build the runtime refinement policy
    pub fn to_policy(&self, pagination: &PaginationDefinition) -> Result<RefinePolicy> {
        let trigger = match self.trigger {
            TriggerKind::Never => RefineTrigger::Never,
            TriggerKind::CapHit => {
                let cap = self.cap.or(pagination.max_items).ok_or_else(|| {
                    Error::config("refine.cap or pagination.max_items is required for cap_hit")
                })?;
                RefineTrigger::CapHit(
                    CapRule::new(cap)
                        .with_small_estimate_threshold(self.small_estimate.unwrap_or(cap))
                        .with_coverage_threshold(self.coverage)
                        .with_margin(self.margin),
                )
            }
            TriggerKind::Estimate => RefineTrigger::Estimate {
                threshold: self.estimate_threshold,
            },
        };

        let min_window = chrono::Duration::from_std(self.min_window)
            .map_err(|e| Error::config(format!("refine.min_window out of range: {e}")))?;

        Ok(RefinePolicy {
            trigger,
            chunk: self.chunk,
            recursive: self.recursive,
            min_window,
        })
    }
}

// ============================================================================
// Retry / HTTP
// ============================================================================

/// Retry definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryDefinition {
    /// Total attempts per call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff curve
    #[serde(default)]
    pub backoff: BackoffType,

    /// First backoff delay
    #[serde(default = "default_initial_backoff", with = "humane")]
    pub initial_backoff: Duration,

    /// Longest backoff delay
    #[serde(default = "default_max_backoff", with = "humane")]
    pub max_backoff: Duration,

    /// What to do on a quota signal
    #[serde(default)]
    pub on_quota: QuotaAction,

    /// Longest quota reset to sleep through
    #[serde(default = "default_max_quota_wait", with = "humane")]
    pub max_quota_wait: Duration,

    /// Extra wait past a reported quota reset
    #[serde(default = "default_reset_grace", with = "humane")]
    pub reset_grace: Duration,
}

impl Default for RetryDefinition {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff: BackoffType::default(),
            initial_backoff: default_initial_backoff(),
            max_backoff: default_max_backoff(),
            on_quota: QuotaAction::default(),
            max_quota_wait: default_max_quota_wait(),
            reset_grace: default_reset_grace(),
        }
    }
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> Duration {
    Duration::from_secs(2)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_max_quota_wait() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_reset_grace() -> Duration {
    Duration::from_secs(1)
}

impl RetryDefinition {
    /// Build the runtime retry policy
    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy::new()
            .with_max_attempts(self.max_attempts)
            .with_backoff(self.backoff, self.initial_backoff, self.max_backoff)
            .with_quota_action(self.on_quota, self.max_quota_wait)
            .with_reset_grace(self.reset_grace)
    }
}

/// HTTP client definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpDefinition {
    /// Request timeout
    #[serde(default = "default_timeout", with = "humane")]
    pub timeout: Duration,

    /// Rate limiting (omit for the default, `null` to disable)
    #[serde(default = "default_rate_limit")]
    pub rate_limit: Option<RateLimiterConfig>,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout: default_timeout(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_timeout() -> Duration {
    Duration::from_secs(30)
}

#[allow(clippy::unnecessary_wraps)]
fn default_rate_limit() -> Option<RateLimiterConfig> {
    Some(RateLimiterConfig::default())
}

impl HttpDefinition {
    /// Build the HTTP client config
    pub fn to_client_config(&self) -> HttpClientConfig {
        let mut builder = HttpClientConfig::builder().timeout(self.timeout);
        builder = match &self.rate_limit {
            Some(limit) => builder.rate_limit(limit.clone()),
            None => builder.no_rate_limit(),
        };
        builder.build()
    }
}

// ============================================================================
// Harvest / Roster / Output
// ============================================================================

/// Default date range and pacing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestDefinition {
    /// Range start (date or datetime)
    #[serde(default)]
    pub start: Option<String>,

    /// Range end, exclusive (date, datetime or "now")
    #[serde(default)]
    pub end: Option<String>,

    /// Delay after each completed unit
    #[serde(default = "default_inter_unit_delay", with = "humane")]
    pub inter_unit_delay: Duration,
}

impl Default for HarvestDefinition {
    fn default() -> Self {
        Self {
            start: None,
            end: None,
            inter_unit_delay: default_inter_unit_delay(),
        }
    }
}

fn default_inter_unit_delay() -> Duration {
    Duration::from_secs(1)
}

impl HarvestDefinition {
    /// Resolve the configured range, letting explicit values override it
    ///
    /// Returns `None` when neither bound is known, i.e. the source is not
    /// time-bounded.
    pub fn window(&self, start: Option<&str>, end: Option<&str>) -> Result<Option<TimeWindow>> {
        let start = start.or(self.start.as_deref());
        let end = end.or(self.end.as_deref());

        match (start, end) {
            (None, None) => Ok(None),
            (Some(start), end) => {
                let start = parse_datetime(start)?;
                let end = match end {
                    None | Some("now") => chrono::Utc::now(),
                    Some(end) => parse_datetime(end)?,
                };
                TimeWindow::new(start, end).map(Some)
            }
            (None, Some(_)) => Err(Error::config("harvest.end given without harvest.start")),
        }
    }
}

/// Roster column mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RosterDefinition {
    /// Column holding the search term
    #[serde(default = "default_term_column")]
    pub term_column: String,

    /// Column holding the region, for multi-region sources
    #[serde(default)]
    pub region_column: Option<String>,
}

impl Default for RosterDefinition {
    fn default() -> Self {
        Self {
            term_column: default_term_column(),
            region_column: None,
        }
    }
}

fn default_term_column() -> String {
    "name".to_string()
}

/// Unit attribute usable as an output column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitAttr {
    /// Composite unit key
    Key,
    /// Search term
    Term,
    /// Region
    Region,
}

/// One output column
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnDefinition {
    /// Column header
    pub name: String,

    /// Record field path
    #[serde(default)]
    pub field: Option<String>,

    /// Unit attribute
    #[serde(default)]
    pub unit: Option<UnitAttr>,

    /// Roster parameter
    #[serde(default)]
    pub param: Option<String>,
}

/// Output table definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputDefinition {
    /// Column holding the identity key
    #[serde(default = "default_id_path")]
    pub identity_column: String,

    /// Write a placeholder row for units with no results
    #[serde(default)]
    pub placeholder: bool,

    /// Columns in order
    pub columns: Vec<ColumnDefinition>,
}

impl OutputDefinition {
    /// Build the sink schema
    pub fn to_schema(&self) -> Result<TableSchema> {
        let columns = self
            .columns
            .iter()
            .map(|col| {
                let source = match (&col.field, col.unit, &col.param) {
                    (Some(path), None, None) => ColumnSource::Field(path.clone()),
                    (None, Some(UnitAttr::Key), None) => ColumnSource::UnitKey,
                    (None, Some(UnitAttr::Term), None) => ColumnSource::Term,
                    (None, Some(UnitAttr::Region), None) => ColumnSource::Region,
                    (None, None, Some(name)) => ColumnSource::Param(name.clone()),
                    // The identity column needs no source of its own
                    (None, None, None) if col.name == self.identity_column => {
                        ColumnSource::Field(String::new())
                    }
                    _ => {
                        return Err(Error::config(format!(
                            "Output column '{}' must set exactly one of field, unit, param",
                            col.name
                        )))
                    }
                };
                Ok(Column::new(col.name.clone(), source))
            })
            .collect::<Result<Vec<_>>>()?;

        TableSchema::new(columns, self.identity_column.clone(), self.placeholder)
    }
}

// ============================================================================
// Humane durations
// ============================================================================

/// Parse a delay like "500ms", "2s", "15m", "1h" or "1d"
///
/// A bare number is taken as seconds.
pub fn parse_delay(s: &str) -> Result<Duration> {
    let s = s.trim();

    let (num_str, unit) = if let Some(stripped) = s.strip_suffix("ms") {
        (stripped, "ms")
    } else if let Some(stripped) = s.strip_suffix('s') {
        (stripped, "s")
    } else if let Some(stripped) = s.strip_suffix('m') {
        (stripped, "m")
    } else if let Some(stripped) = s.strip_suffix('h') {
        (stripped, "h")
    } else if let Some(stripped) = s.strip_suffix('d') {
        (stripped, "d")
    } else {
        (s, "s")
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .map_err(|_| Error::config(format!("Invalid duration: {s}")))?;

    if !num.is_finite() || num < 0.0 {
        return Err(Error::config(format!("Invalid duration: {s}")));
    }

    let secs = match unit {
        "ms" => num / 1000.0,
        "m" => num * 60.0,
        "h" => num * 3600.0,
        "d" => num * 86_400.0,
        _ => num,
    };

    Ok(Duration::from_secs_f64(secs))
}

/// Serde adapter for humane durations
mod humane {
    use super::parse_delay;
    use serde::{de, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{}ms", value.as_millis()))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Seconds(secs) if secs.is_finite() && secs >= 0.0 => {
                Ok(Duration::from_secs_f64(secs))
            }
            Raw::Seconds(secs) => Err(de::Error::custom(format!("invalid duration: {secs}"))),
            Raw::Text(text) => parse_delay(&text).map_err(de::Error::custom),
        }
    }
}
