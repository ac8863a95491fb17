//! Common types used throughout species-harvest
//!
//! This module contains shared type definitions, type aliases,
//! and the unit-of-work and record types every component passes around.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

// ============================================================================
// Backoff Type
// ============================================================================

/// Backoff strategy between retry attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Unit of Work
// ============================================================================

/// Stable composite key of a unit of work
///
/// Rendered as `term|region`, or just `term` for single-region sources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitKey(String);

impl UnitKey {
    /// Separator between key components
    pub const SEPARATOR: char = '|';

    /// Build a key from a term and an optional region
    pub fn new(term: &str, region: Option<&str>) -> Self {
        match region {
            Some(region) if !region.is_empty() => {
                Self(format!("{}{}{}", term.trim(), Self::SEPARATOR, region.trim()))
            }
            _ => Self(term.trim().to_string()),
        }
    }

    /// Wrap an already-rendered key (e.g. read back from a ledger)
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the key as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Smallest independently-resumable harvesting task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitOfWork {
    /// Stable composite key
    pub key: UnitKey,
    /// Search term (species name, registry id, ...)
    pub term: String,
    /// Region/country, for multi-region sources
    pub region: Option<String>,
    /// Remaining roster columns, available to request templates
    pub params: BTreeMap<String, String>,
}

impl UnitOfWork {
    /// Create a unit for a term without a region
    pub fn new(term: impl Into<String>) -> Self {
        let term = term.into();
        Self {
            key: UnitKey::new(&term, None),
            term,
            region: None,
            params: BTreeMap::new(),
        }
    }

    /// Create a unit for a term in a region
    pub fn with_region(term: impl Into<String>, region: impl Into<String>) -> Self {
        let term = term.into();
        let region = region.into();
        Self {
            key: UnitKey::new(&term, Some(&region)),
            term,
            region: Some(region),
            params: BTreeMap::new(),
        }
    }

    /// Attach an extra roster parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

// ============================================================================
// Record
// ============================================================================

/// One harvested item
///
/// The field layout belongs to the source; the harvester only relies on the
/// identity key.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identity key (platform-assigned item id)
    pub id: String,
    /// Raw item fields
    pub fields: JsonObject,
}

impl Record {
    /// Create a record
    pub fn new(id: impl Into<String>, fields: JsonObject) -> Self {
        Self {
            id: id.into(),
            fields,
        }
    }

    /// Create a record with no fields besides its identity
    pub fn bare(id: impl Into<String>) -> Self {
        Self::new(id, JsonObject::new())
    }

    /// Look up a field by dotted path (e.g. `user.name`)
    pub fn field(&self, path: &str) -> Option<&JsonValue> {
        let path = path.strip_prefix("$.").unwrap_or(path);
        let (head, rest) = path.split_once('.').unwrap_or((path, ""));
        value_at(self.fields.get(head)?, rest)
    }
}

/// Look up a value by dotted path (`a.b.0.c`); an empty path is the value itself
pub(crate) fn value_at<'a>(value: &'a JsonValue, path: &str) -> Option<&'a JsonValue> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    if path.is_empty() {
        return Some(value);
    }
    path.split('.').try_fold(value, |current, part| match current {
        JsonValue::Object(map) => map.get(part),
        JsonValue::Array(items) => items.get(part.parse::<usize>().ok()?),
        _ => None,
    })
}
