//! Error types for species-harvest
//!
//! This module defines the error hierarchy for the whole harvester.
//! All public APIs return `Result<T, Error>` where Error is defined here.
//!
//! Errors are classified in two ways that drive the retry controller:
//! [`Error::is_quota`] marks quota/permission failures that must not be
//! retried blindly, and [`Error::is_retryable`] marks everything else that a
//! later attempt might fix.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// The main error type for species-harvest
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Quota exhausted ({reason}){}", reset_suffix(.reset_at))]
    QuotaExhausted {
        reason: String,
        reset_at: Option<DateTime<Utc>>,
    },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Failed to decode response: {message}")]
    Decode { message: String },

    #[error("Failed to extract records from path '{path}': {message}")]
    RecordExtraction { path: String, message: String },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // ============================================================================
    // Persistence Errors
    // ============================================================================
    #[error("Ledger error: {message}")]
    Ledger { message: String },

    #[error("Output error: {message}")]
    Output { message: String },

    #[error("Roster error: {message}")]
    Roster { message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Template error: {message}")]
    Template { message: String },

    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

fn reset_suffix(reset_at: &Option<DateTime<Utc>>) -> String {
    match reset_at {
        Some(at) => format!(", resets at {}", at.to_rfc3339()),
        None => String::new(),
    }
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a quota error
    pub fn quota(reason: impl Into<String>, reset_at: Option<DateTime<Utc>>) -> Self {
        Self::QuotaExhausted {
            reason: reason.into(),
            reset_at,
        }
    }

    /// Create a decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    /// Create a template error
    pub fn template(message: impl Into<String>) -> Self {
        Self::Template {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a ledger error
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Create a roster error
    pub fn roster(message: impl Into<String>) -> Self {
        Self::Roster {
            message: message.into(),
        }
    }

    /// Check if this error is a quota/permission signal
    pub fn is_quota(&self) -> bool {
        matches!(self, Error::QuotaExhausted { .. })
    }

    /// Reset time carried by a quota signal, if any
    pub fn quota_reset(&self) -> Option<DateTime<Utc>> {
        match self {
            Error::QuotaExhausted { reset_at, .. } => *reset_at,
            _ => None,
        }
    }

    /// Check if this error is retryable
    ///
    /// Anything that is not a quota signal or a local configuration/persistence
    /// problem is worth another attempt: connection failures, 5xx, throttling
    /// and malformed bodies alike.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::QuotaExhausted { .. } => false,
            Error::Config { .. }
            | Error::MissingConfigField { .. }
            | Error::YamlParse(_)
            | Error::Template { .. }
            | Error::UndefinedVariable { .. }
            | Error::InvalidUrl(_)
            | Error::Ledger { .. }
            | Error::Output { .. }
            | Error::Roster { .. } => false,
            _ => true,
        }
    }
}

/// Result type alias for species-harvest
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}
