//! CSV append-merge sink

use super::schema::TableSchema;
use crate::error::{Error, Result};
use crate::io::{existing_header, open_append, set_aside};
use crate::types::{Record, UnitOfWork};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// What one merge did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeStats {
    /// Rows appended
    pub written: u64,
    /// Incoming records dropped because their key already existed
    pub duplicates: u64,
    /// A placeholder row was appended
    pub placeholder: bool,
}

/// Durable output the harvester merges records into
pub trait RecordSink: Send {
    /// Append the unit's records whose identity keys are new
    ///
    /// Returns only after the rows are flushed to durable storage.
    fn merge(&mut self, unit: &UnitOfWork, records: &[Record]) -> Result<MergeStats>;
}

/// CSV output table keyed by the schema's identity column
#[derive(Debug)]
pub struct CsvSink {
    path: PathBuf,
    schema: TableSchema,
    known: Option<HashSet<String>>,
}

impl CsvSink {
    /// Create a sink writing to `path`
    pub fn new(path: impl AsRef<Path>, schema: TableSchema) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            schema,
            known: None,
        }
    }

    /// Get the output path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get the schema
    pub fn schema(&self) -> &TableSchema {
        &self.schema
    }
}

impl RecordSink for CsvSink {
    fn merge(&mut self, unit: &UnitOfWork, records: &[Record]) -> Result<MergeStats> {
        let Self {
            path,
            schema,
            known,
        } = self;
        // Existing keys are read once, then kept current in memory
        if known.is_none() {
            *known = Some(load_existing_keys(path, schema)?);
        }
        let known = known.get_or_insert_with(HashSet::new);

        let mut stats = MergeStats::default();
        let mut rows = Vec::new();
        let mut batch = HashSet::new();

        for record in records {
            if known.contains(&record.id) || !batch.insert(record.id.clone()) {
                stats.duplicates += 1;
                continue;
            }
            rows.push(schema.row(unit, record));
        }

        if records.is_empty() && schema.placeholders() {
            let id = TableSchema::placeholder_id(unit);
            if !known.contains(&id) {
                rows.push(schema.placeholder_row(unit));
                batch.insert(id);
                stats.placeholder = true;
            }
        }

        if rows.is_empty() && path.exists() {
            debug!("{}: nothing new to write", unit.key);
            return Ok(stats);
        }

        let (file, is_new) = open_append(path)
            .map_err(|e| Error::output(format!("Failed to open {}: {e}", path.display())))?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if is_new {
            writer.write_record(schema.headers())?;
        }
        for row in &rows {
            writer.write_record(row)?;
        }
        writer
            .flush()
            .map_err(|e| Error::output(format!("Failed to flush output: {e}")))?;
        let file = writer
            .into_inner()
            .map_err(|e| Error::output(format!("Failed to finish output: {e}")))?;
        file.sync_data()?;

        stats.written = rows.len() as u64;
        known.extend(batch);

        debug!(
            "{}: wrote {} rows, dropped {} duplicates",
            unit.key, stats.written, stats.duplicates
        );
        Ok(stats)
    }
}

/// Keys already present in the output table
///
/// A table whose header is unreadable or differs from the schema cannot be
/// appended to or keyed; it is moved aside and a new table starts empty.
fn load_existing_keys(path: &Path, schema: &TableSchema) -> Result<HashSet<String>> {
    let usable = match existing_header(path) {
        None => return Ok(HashSet::new()),
        Some(header) => header.is_some_and(|h| h.iter().eq(schema.headers())),
    };
    if usable {
        return Ok(read_identity_keys(path, schema.identity_column()));
    }

    let moved = set_aside(path)
        .map_err(|e| Error::output(format!("Failed to move aside {}: {e}", path.display())))?;
    warn!(
        "Output {} does not match the configured columns, moved to {} and starting a new one",
        path.display(),
        moved.display()
    );
    Ok(HashSet::new())
}

/// Read the identity column of an existing table
///
/// Unreadable rows are skipped.
fn read_identity_keys(path: &Path, identity: &str) -> HashSet<String> {

    let mut reader = match csv::ReaderBuilder::new().flexible(true).from_path(path) {
        Ok(reader) => reader,
        Err(e) => {
            warn!("Cannot read {} ({e}), assuming no existing keys", path.display());
            return HashSet::new();
        }
    };

    let index = match reader.headers() {
        Ok(headers) => headers.iter().position(|h| h == identity),
        Err(e) => {
            warn!("Cannot read header of {} ({e}), assuming no existing keys", path.display());
            return HashSet::new();
        }
    };
    let Some(index) = index else {
        warn!(
            "{} has no '{identity}' column, assuming no existing keys",
            path.display()
        );
        return HashSet::new();
    };

    let mut keys = HashSet::new();
    for row in reader.records() {
        match row {
            Ok(row) => {
                if let Some(key) = row.get(index).filter(|k| !k.is_empty()) {
                    keys.insert(key.to_string());
                }
            }
            Err(e) => warn!("Skipping unreadable row in {}: {e}", path.display()),
        }
    }
    debug!("{} existing keys in {}", keys.len(), path.display());
    keys
}
