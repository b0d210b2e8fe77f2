// Store abstraction (spec §6) — the physical persistence engine is an
// external collaborator; this module only defines the trait boundary and a
// reference in-memory implementation used by the demo binary and tests.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::error::{ArgonError, Result};
use crate::ids::Lsn;
use crate::wal::entry::WalEntry;

/// Range/scope filter for `LogStore::find`. `None` fields are unconstrained.
#[derive(Debug, Clone, Default)]
pub struct StoreFilter {
    pub project_id: Option<String>,
    pub branch_id: Option<String>,
    pub collection: Option<String>,
    pub document_id: Option<String>,
    pub lo_lsn: Option<Lsn>,
    pub hi_lsn: Option<Lsn>,
    pub max_timestamp: Option<i64>,
}

impl StoreFilter {
    pub fn matches(&self, entry: &WalEntry) -> bool {
        if let Some(p) = &self.project_id {
            if &entry.project_id != p {
                return false;
            }
        }
        if let Some(b) = &self.branch_id {
            if &entry.branch_id != b {
                return false;
            }
        }
        if let Some(c) = &self.collection {
            if entry.collection.as_deref() != Some(c.as_str()) {
                return false;
            }
        }
        if let Some(d) = &self.document_id {
            if entry.document_id.as_deref() != Some(d.as_str()) {
                return false;
            }
        }
        if let Some(lo) = self.lo_lsn {
            if entry.lsn <= lo {
                return false;
            }
        }
        if let Some(hi) = self.hi_lsn {
            if entry.lsn > hi {
                return false;
            }
        }
        if let Some(max_ts) = self.max_timestamp {
            if entry.timestamp > max_ts {
                return false;
            }
        }
        true
    }
}

/// The append-only log's storage contract (C1). Implementations must keep
/// `lsn` unique and serve scans sorted ascending by `lsn`.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, entry: WalEntry) -> Result<Lsn>;

    /// Atomic w.r.t. visibility order: readers never see a partial prefix.
    async fn append_batch(&self, entries: Vec<WalEntry>) -> Result<Vec<Lsn>>;

    async fn find_by_lsn(&self, lsn: Lsn) -> Result<Option<WalEntry>>;

    /// Range scan, always returned sorted ascending by `lsn`.
    async fn find(&self, filter: &StoreFilter) -> Result<Vec<WalEntry>>;

    /// Used to initialize the LSN allocator at startup.
    async fn find_max_lsn(&self) -> Result<Option<Lsn>>;

    /// No-op for the in-memory store; documents the index set from §4.1 for
    /// implementations backed by a real index-bearing store.
    async fn create_indexes(&self) -> Result<()>;
}

/// Reference `LogStore` backed by a `BTreeMap`, keyed by LSN so range scans
/// are naturally ordered. Not durable — entries live only as long as the
/// process.
pub struct MemoryLogStore {
    entries: RwLock<BTreeMap<i64, WalEntry>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, entry: WalEntry) -> Result<Lsn> {
        let lsn = entry.lsn;
        let mut entries = self.entries.write();
        if entries.contains_key(&lsn.0) {
            return Err(ArgonError::Internal(format!(
                "duplicate lsn on append: {lsn}"
            )));
        }
        entries.insert(lsn.0, entry);
        Ok(lsn)
    }

    async fn append_batch(&self, entries: Vec<WalEntry>) -> Result<Vec<Lsn>> {
        let mut store = self.entries.write();
        for entry in &entries {
            if store.contains_key(&entry.lsn.0) {
                return Err(ArgonError::Internal(format!(
                    "duplicate lsn on batch append: {}",
                    entry.lsn
                )));
            }
        }
        let lsns = entries.iter().map(|e| e.lsn).collect();
        for entry in entries {
            store.insert(entry.lsn.0, entry);
        }
        Ok(lsns)
    }

    async fn find_by_lsn(&self, lsn: Lsn) -> Result<Option<WalEntry>> {
        Ok(self.entries.read().get(&lsn.0).cloned())
    }

    async fn find(&self, filter: &StoreFilter) -> Result<Vec<WalEntry>> {
        Ok(self
            .entries
            .read()
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect())
    }

    async fn find_max_lsn(&self) -> Result<Option<Lsn>> {
        Ok(self.entries.read().keys().next_back().copied().map(Lsn))
    }

    async fn create_indexes(&self) -> Result<()> {
        Ok(())
    }
}
