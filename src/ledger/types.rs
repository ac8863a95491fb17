//! Ledger types

use crate::error::Result;
use crate::types::UnitKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One completed unit of work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Composite unit key
    pub unit_key: UnitKey,
    /// When the unit's records were durably merged
    pub completed_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// Create an entry
    pub fn new(unit_key: UnitKey, completed_at: DateTime<Utc>) -> Self {
        Self {
            unit_key,
            completed_at,
        }
    }
}

/// Storage of completed unit keys
pub trait Ledger: Send {
    /// Every readable entry, in write order
    fn entries(&self) -> Vec<LedgerEntry>;

    /// Keys of completed units
    fn load(&self) -> HashSet<UnitKey> {
        self.entries().into_iter().map(|e| e.unit_key).collect()
    }

    /// Durably record a unit as complete
    fn mark_done(&mut self, key: &UnitKey, at: DateTime<Utc>) -> Result<()>;
}

/// Ledger kept in memory only
#[derive(Debug, Clone, Default)]
pub struct MemoryLedger {
    entries: Vec<LedgerEntry>,
}

impl MemoryLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a ledger with units already complete
    pub fn with_done<'a>(keys: impl IntoIterator<Item = &'a UnitKey>) -> Self {
        let now = Utc::now();
        Self {
            entries: keys
                .into_iter()
                .map(|k| LedgerEntry::new(k.clone(), now))
                .collect(),
        }
    }
}

impl Ledger for MemoryLedger {
    fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.clone()
    }

    fn mark_done(&mut self, key: &UnitKey, at: DateTime<Utc>) -> Result<()> {
        self.entries.push(LedgerEntry::new(key.clone(), at));
        Ok(())
    }
}
