//! Unit roster loading
//!
//! A roster is a CSV listing the units of work: one search term per row,
//! optionally a region, and any number of extra columns that become template
//! parameters (`{{ unit.params.<column> }}`).

use crate::config::RosterDefinition;
use crate::error::{Error, Result};
use crate::types::{UnitKey, UnitOfWork};
use std::collections::HashSet;
use std::io::Read;
use std::path::Path;
use tracing::{debug, warn};

/// Load a roster file
pub fn load_roster(path: impl AsRef<Path>, def: &RosterDefinition) -> Result<Vec<UnitOfWork>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|e| {
        Error::roster(format!("Failed to open roster '{}': {e}", path.display()))
    })?;
    parse_roster(file, def)
}

/// Parse a roster from any reader
///
/// Blank terms are skipped and repeated unit keys keep their first row.
pub fn parse_roster<R: Read>(reader: R, def: &RosterDefinition) -> Result<Vec<UnitOfWork>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader.headers()?.clone();
    let term_idx = headers
        .iter()
        .position(|h| h == def.term_column)
        .ok_or_else(|| {
            Error::roster(format!(
                "Roster has no '{}' column (found: {})",
                def.term_column,
                headers.iter().collect::<Vec<_>>().join(", ")
            ))
        })?;
    let region_idx = match &def.region_column {
        Some(col) => Some(headers.iter().position(|h| h == col).ok_or_else(|| {
            Error::roster(format!("Roster has no '{col}' region column"))
        })?),
        None => None,
    };

    let mut units = Vec::new();
    let mut seen: HashSet<UnitKey> = HashSet::new();

    for (line, row) in reader.records().enumerate() {
        let row = row?;
        let term = row.get(term_idx).unwrap_or_default();
        if term.is_empty() {
            debug!("Roster row {} has no term, skipping", line + 2);
            continue;
        }

        let mut unit = match region_idx.and_then(|i| row.get(i)).filter(|r| !r.is_empty()) {
            Some(region) => UnitOfWork::with_region(term, region),
            None => UnitOfWork::new(term),
        };

        for (i, (name, value)) in headers.iter().zip(row.iter()).enumerate() {
            if i != term_idx && Some(i) != region_idx {
                unit = unit.with_param(name, value);
            }
        }

        if !seen.insert(unit.key.clone()) {
            warn!("Roster row {} repeats unit '{}', skipping", line + 2, unit.key);
            continue;
        }
        units.push(unit);
    }

    Ok(units)
}
