//! YAML parser for source definitions
//!
//! Parses and validates source YAML files.

use crate::config::{CursorDefinition, SourceDefinition};
use crate::error::{Error, Result};
use crate::template;
use chrono::format::{Item, StrftimeItems};
use std::fs;
use std::path::Path;

/// Template variables a request may reference
const TEMPLATE_ROOTS: [&str; 6] = [
    "unit.term",
    "unit.region",
    "unit.key",
    "window.start",
    "window.end",
    "window.last",
];

/// Load a source definition from a file path
pub fn load_source(path: impl AsRef<Path>) -> Result<SourceDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        Error::config(format!(
            "Failed to read source file '{}': {e}",
            path.display()
        ))
    })?;
    load_source_from_str(&content)
}

/// Load a source definition from a YAML string
pub fn load_source_from_str(yaml: &str) -> Result<SourceDefinition> {
    let def: SourceDefinition = serde_yaml::from_str(yaml)
        .map_err(|e| Error::config(format!("Failed to parse source YAML: {e}")))?;

    validate_source(&def)?;
    Ok(def)
}

/// Validate a source definition
pub fn validate_source(def: &SourceDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Source name cannot be empty"));
    }

    let url = url::Url::parse(&def.base_url)
        .map_err(|e| Error::config(format!("Invalid base_url '{}': {e}", def.base_url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::config(format!(
            "base_url must be http or https, got '{}'",
            url.scheme()
        )));
    }

    validate_request(def)?;
    validate_cursor(&def.cursor)?;

    if def.pagination.page_size == 0 {
        return Err(Error::config("pagination.page_size must be at least 1"));
    }
    if def.retry.max_attempts == 0 {
        return Err(Error::config("retry.max_attempts must be at least 1"));
    }
    if def.retry.initial_backoff > def.retry.max_backoff {
        return Err(Error::config(
            "retry.initial_backoff cannot exceed retry.max_backoff",
        ));
    }

    if !(def.refine.coverage > 0.0 && def.refine.coverage <= 1.0) {
        return Err(Error::config("refine.coverage must be in (0, 1]"));
    }
    if def.refine.margin <= 0.0 {
        return Err(Error::config("refine.margin must be positive"));
    }
    def.refine.to_policy(&def.pagination)?;

    if def.roster.term_column.trim().is_empty() {
        return Err(Error::config("roster.term_column cannot be empty"));
    }

    def.output.to_schema()?;
    def.harvest.window(None, None)?;

    Ok(())
}

/// Validate request templates and the window format
fn validate_request(def: &SourceDefinition) -> Result<()> {
    let templates = std::iter::once(("path", def.request.path.as_str()))
        .chain(def.request.params.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    for (name, value) in templates {
        for var in template::extract_variables(value) {
            let known =
                TEMPLATE_ROOTS.contains(&var.as_str()) || var.starts_with("unit.params.");
            if !known {
                return Err(Error::config(format!(
                    "Request '{name}' references unknown variable '{var}'"
                )));
            }
        }
    }

    if StrftimeItems::new(&def.request.window_format).any(|item| matches!(item, Item::Error)) {
        return Err(Error::config(format!(
            "Invalid window_format '{}'",
            def.request.window_format
        )));
    }

    Ok(())
}

/// Validate the cursor definition
fn validate_cursor(cursor: &CursorDefinition) -> Result<()> {
    let (param, path) = match cursor {
        CursorDefinition::None => return Ok(()),
        CursorDefinition::Token { param, path } => (param, Some(path)),
        CursorDefinition::Offset { param } | CursorDefinition::Page { param, .. } => (param, None),
    };

    if param.trim().is_empty() {
        return Err(Error::config("cursor.param cannot be empty"));
    }
    if path.is_some_and(|p| p.trim().is_empty()) {
        return Err(Error::config("cursor.path cannot be empty"));
    }
    Ok(())
}
