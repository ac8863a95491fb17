//! Output table schema

use crate::error::{Error, Result};
use crate::types::{JsonValue, Record, UnitOfWork};
use std::collections::HashSet;

/// Identity prefix of rows standing in for units with no results
pub const PLACEHOLDER_PREFIX: &str = "placeholder:";

/// Where a column's value comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnSource {
    /// Record field by dotted path
    Field(String),
    /// Composite unit key
    UnitKey,
    /// Unit search term
    Term,
    /// Unit region
    Region,
    /// Roster parameter
    Param(String),
}

impl ColumnSource {
    /// Whether the value comes from the unit rather than the record
    pub fn is_unit_attribute(&self) -> bool {
        !matches!(self, Self::Field(_))
    }
}

/// One output column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    /// Header name
    pub name: String,
    /// Value source
    pub source: ColumnSource,
}

impl Column {
    /// Create a column
    pub fn new(name: impl Into<String>, source: ColumnSource) -> Self {
        Self {
            name: name.into(),
            source,
        }
    }

    /// Column fed by a record field
    pub fn field(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self::new(name, ColumnSource::Field(path.into()))
    }
}

/// Ordered output columns with a fixed identity column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    columns: Vec<Column>,
    identity: usize,
    placeholders: bool,
}

impl TableSchema {
    /// Create a schema
    ///
    /// The identity column must be one of `columns`; its value is always the
    /// record's identity key.
    pub fn new(
        columns: Vec<Column>,
        identity_column: impl AsRef<str>,
        placeholders: bool,
    ) -> Result<Self> {
        let identity_column = identity_column.as_ref();

        let mut names = HashSet::new();
        for col in &columns {
            if col.name.is_empty() {
                return Err(Error::config("Output column names must not be empty"));
            }
            if !names.insert(col.name.as_str()) {
                return Err(Error::config(format!(
                    "Duplicate output column '{}'",
                    col.name
                )));
            }
        }

        let identity = columns
            .iter()
            .position(|c| c.name == identity_column)
            .ok_or_else(|| {
                Error::config(format!(
                    "Identity column '{identity_column}' is not among the output columns"
                ))
            })?;

        Ok(Self {
            columns,
            identity,
            placeholders,
        })
    }

    /// Column header names in order
    pub fn headers(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Columns in order
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Name of the identity column
    pub fn identity_column(&self) -> &str {
        &self.columns[self.identity].name
    }

    /// Whether empty units get a placeholder row
    pub fn placeholders(&self) -> bool {
        self.placeholders
    }

    /// Render one record as a row
    pub fn row(&self, unit: &UnitOfWork, record: &Record) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                if i == self.identity {
                    return record.id.clone();
                }
                match &col.source {
                    ColumnSource::Field(path) => {
                        record.field(path).map(cell).unwrap_or_default()
                    }
                    source => unit_cell(unit, source),
                }
            })
            .collect()
    }

    /// Identity key of a unit's placeholder row
    pub fn placeholder_id(unit: &UnitOfWork) -> String {
        format!("{PLACEHOLDER_PREFIX}{}", unit.key)
    }

    /// Render the placeholder row for a unit with no results
    pub fn placeholder_row(&self, unit: &UnitOfWork) -> Vec<String> {
        self.columns
            .iter()
            .enumerate()
            .map(|(i, col)| {
                if i == self.identity {
                    Self::placeholder_id(unit)
                } else if col.source.is_unit_attribute() {
                    unit_cell(unit, &col.source)
                } else {
                    String::new()
                }
            })
            .collect()
    }
}

fn unit_cell(unit: &UnitOfWork, source: &ColumnSource) -> String {
    match source {
        ColumnSource::UnitKey => unit.key.to_string(),
        ColumnSource::Term => unit.term.clone(),
        ColumnSource::Region => unit.region.clone().unwrap_or_default(),
        ColumnSource::Param(name) => unit.params.get(name).cloned().unwrap_or_default(),
        ColumnSource::Field(_) => String::new(),
    }
}

/// Flatten a JSON value into a CSV cell
fn cell(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => String::new(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::Array(_) | JsonValue::Object(_) => value.to_string(),
    }
}
