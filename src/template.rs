//! Template interpolation for request definitions
//!
//! Handles `{{ variable }}` interpolation in source definitions.
//! Supports nested access like `{{ unit.term }}`, `{{ unit.params.taxon_key }}`
//! and `{{ window.start }}`. `{{ window.last }}` is the last second before
//! `{{ window.end }}`, for APIs whose upper bound is inclusive.

use crate::error::{Error, Result};
use crate::source::Query;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::sync::LazyLock;

/// Regex for matching template variables: {{ variable.path }}
static TEMPLATE_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([a-zA-Z_][a-zA-Z0-9_]*(?:\.[a-zA-Z_][a-zA-Z0-9_]*)*)\s*\}\}")
        .expect("template regex is valid")
});

/// Context for template interpolation
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    /// Current unit of work (key, term, region, params)
    pub unit: Value,
    /// Current time window, formatted
    pub window: Value,
    /// Additional context variables
    pub vars: Value,
}

impl TemplateContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the context for one query
    pub fn for_query(query: &Query, window_format: &str) -> Self {
        let unit = &query.unit;
        let params: Map<String, Value> = unit
            .params
            .iter()
            .map(|(k, v)| (k.clone(), Value::String(v.clone())))
            .collect();

        let window = match &query.window {
            Some(w) => {
                let (start, end) = w.format(window_format);
                let last = w.last().format(window_format).to_string();
                json!({ "start": start, "end": end, "last": last })
            }
            None => Value::Null,
        };

        Self {
            unit: json!({
                "key": unit.key.as_str(),
                "term": unit.term,
                "region": unit.region,
                "params": params,
            }),
            window,
            vars: Value::Null,
        }
    }

    /// Set additional variables
    pub fn set_vars(&mut self, vars: Value) -> &mut Self {
        self.vars = vars;
        self
    }

    /// Get a value by path (e.g., "unit.term")
    pub fn get(&self, path: &str) -> Option<&Value> {
        let parts: Vec<&str> = path.split('.').collect();

        let root = match parts[0] {
            "unit" => &self.unit,
            "window" => &self.window,
            "vars" => &self.vars,
            // Bare names resolve against vars
            _ => return get_nested_value(&self.vars, &parts),
        };

        if parts.len() == 1 {
            Some(root)
        } else {
            get_nested_value(root, &parts[1..])
        }
    }
}

/// Get a nested value from a JSON value by path
fn get_nested_value<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    let mut current = value;
    for part in path {
        match current {
            Value::Object(map) => {
                current = map.get(*part)?;
            }
            _ => return None,
        }
    }
    Some(current)
}

/// Render a template string with the given context
pub fn render(template: &str, ctx: &TemplateContext) -> Result<String> {
    let mut result = template.to_string();
    let mut errors = Vec::new();

    for cap in TEMPLATE_REGEX.captures_iter(template) {
        let (Some(full_match), Some(var_path)) = (cap.get(0), cap.get(1)) else {
            continue;
        };

        match ctx.get(var_path.as_str()) {
            Some(value) => {
                let replacement = value_to_string(value);
                result = result.replace(full_match.as_str(), &replacement);
            }
            None => {
                errors.push(var_path.as_str().to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(result)
    } else {
        Err(Error::undefined_var(errors.join(", ")))
    }
}

/// Check if a string contains template variables
pub fn has_templates(s: &str) -> bool {
    TEMPLATE_REGEX.is_match(s)
}

/// Extract all variable names from a template
pub fn extract_variables(template: &str) -> Vec<String> {
    TEMPLATE_REGEX
        .captures_iter(template)
        .filter_map(|cap| cap.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

/// Convert a JSON value to a string for template substitution
fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => String::new(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UnitOfWork;
    use crate::window::{parse_datetime, TimeWindow};

    fn query() -> Query {
        let unit = UnitOfWork::with_region("Vespa velutina", "FR").with_param("taxon_key", "1311477");
        let window = TimeWindow::new(
            parse_datetime("2023-01-01").unwrap(),
            parse_datetime("2023-02-01").unwrap(),
        )
        .unwrap();
        Query::new(unit, Some(window), 100)
    }

    #[test]
    fn test_unit_substitution() {
        let ctx = TemplateContext::for_query(&query(), "%Y-%m-%d");

        assert_eq!(render("{{ unit.term }}", &ctx).unwrap(), "Vespa velutina");
        assert_eq!(render("{{unit.region}}", &ctx).unwrap(), "FR");
        assert_eq!(
            render("{{ unit.params.taxon_key }}", &ctx).unwrap(),
            "1311477"
        );
        assert_eq!(render("{{ unit.key }}", &ctx).unwrap(), "Vespa velutina|FR");
    }

    #[test]
    fn test_window_substitution() {
        let ctx = TemplateContext::for_query(&query(), "%Y-%m-%dT%H:%M:%SZ");
        let rendered = render("{{ window.start }},{{ window.end }}", &ctx).unwrap();
        assert_eq!(rendered, "2023-01-01T00:00:00Z,2023-02-01T00:00:00Z");
    }

    #[test]
    fn test_window_last_is_inclusive_end() {
        let ctx = TemplateContext::for_query(&query(), "%Y-%m-%d");
        let rendered = render("{{ window.start }}..{{ window.last }}", &ctx).unwrap();
        assert_eq!(rendered, "2023-01-01..2023-01-31");

        let ctx = TemplateContext::for_query(&query(), "%Y-%m-%dT%H:%M:%SZ");
        assert_eq!(
            render("{{ window.last }}", &ctx).unwrap(),
            "2023-01-31T23:59:59Z"
        );
    }

    #[test]
    fn test_missing_region_renders_empty() {
        let q = Query::new(UnitOfWork::new("Pueraria montana"), None, 50);
        let ctx = TemplateContext::for_query(&q, "%Y-%m-%d");
        assert_eq!(render("{{ unit.region }}", &ctx).unwrap(), "");
        assert!(render("{{ window.start }}", &ctx).is_err());
    }

    #[test]
    fn test_undefined_variable() {
        let ctx = TemplateContext::new();
        let result = render("{{ unit.missing }}", &ctx);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("unit.missing"));
    }

    #[test]
    fn test_vars_and_numbers() {
        let mut ctx = TemplateContext::new();
        ctx.set_vars(json!({"limit": 300, "verbose": true}));
        assert_eq!(
            render("limit={{ limit }}&v={{ vars.verbose }}", &ctx).unwrap(),
            "limit=300&v=true"
        );
    }

    #[test]
    fn test_has_and_extract() {
        assert!(has_templates("prefix {{ unit.term }} suffix"));
        assert!(!has_templates("{ not a template }"));
        assert_eq!(
            extract_variables("{{ unit.term }} in {{ window.start }}"),
            vec!["unit.term", "window.start"]
        );
    }
}
