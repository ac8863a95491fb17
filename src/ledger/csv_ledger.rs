//! CSV-backed ledger

use super::types::{Ledger, LedgerEntry};
use crate::error::{Error, Result};
use crate::io::{existing_header, open_append, set_aside};
use crate::types::UnitKey;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Header row of a ledger file
const HEADER: [&str; 2] = ["unit_key", "completed_at"];

/// Append-only CSV ledger
#[derive(Debug, Clone)]
pub struct CsvLedger {
    path: PathBuf,
    /// The existing file's header has been checked before appending
    checked: bool,
}

impl CsvLedger {
    /// Create a ledger at the given path (the file is created lazily)
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            checked: false,
        }
    }

    /// Get the ledger path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Move a file whose header is not ours aside before the first append
    ///
    /// Rows appended under a foreign or torn header could never be read
    /// back, so the ledger restarts in a fresh file instead.
    fn discard_unusable(&self) -> Result<()> {
        let usable = match existing_header(&self.path) {
            None => true,
            Some(header) => header.is_some_and(|h| h.iter().eq(HEADER)),
        };
        if usable {
            return Ok(());
        }

        let moved = set_aside(&self.path).map_err(|e| {
            Error::ledger(format!("Failed to move aside {}: {e}", self.path.display()))
        })?;
        warn!(
            "Ledger {} has an unusable header, moved to {} and starting a new one",
            self.path.display(),
            moved.display()
        );
        Ok(())
    }

    fn read_entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut reader = csv::Reader::from_path(&self.path)?;

        let headers = reader.headers()?.clone();
        if headers.iter().ne(HEADER) {
            warn!(
                "Ledger {} has unexpected header {:?}, ignoring it",
                self.path.display(),
                headers
            );
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for (line, row) in reader.deserialize::<LedgerEntry>().enumerate() {
            match row {
                Ok(entry) if !entry.unit_key.as_str().is_empty() => entries.push(entry),
                Ok(_) => warn!("Ledger row {} has an empty key, skipping", line + 2),
                Err(e) => warn!("Ledger row {} is malformed ({e}), skipping", line + 2),
            }
        }
        Ok(entries)
    }
}

impl Ledger for CsvLedger {
    fn entries(&self) -> Vec<LedgerEntry> {
        if !self.path.exists() {
            return Vec::new();
        }
        match self.read_entries() {
            Ok(entries) => {
                debug!("Loaded {} ledger entries from {}", entries.len(), self.path.display());
                entries
            }
            Err(e) => {
                warn!(
                    "Ledger {} is unreadable ({e}), starting from scratch",
                    self.path.display()
                );
                Vec::new()
            }
        }
    }

    fn mark_done(&mut self, key: &UnitKey, at: DateTime<Utc>) -> Result<()> {
        if !self.checked {
            self.discard_unusable()?;
            self.checked = true;
        }

        let (mut file, is_new) = open_append(&self.path).map_err(|e| {
            Error::ledger(format!("Failed to open {}: {e}", self.path.display()))
        })?;

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(&mut file);
        if is_new {
            writer.write_record(HEADER)?;
        }
        writer.serialize(LedgerEntry::new(key.clone(), at))?;
        writer
            .flush()
            .map_err(|e| Error::ledger(format!("Failed to flush ledger: {e}")))?;
        drop(writer);

        file.sync_data()?;
        Ok(())
    }
}
