// WAL Service (C3): atomic LSN allocation, single/batch append, read helpers.

pub mod entry;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::compression::{compress_entry, decompress_entry};
use crate::config::CompressionConfig;
use crate::error::Result;
use crate::ids::Lsn;
use crate::store::{LogStore, StoreFilter};

pub use entry::{Operation, WalEntry};

/// Wait-free LSN allocator. A single atomic counter gives the whole system
/// its total order; rollback on append failure is a plain decrement, per
/// spec §5 ("Allocation is wait-free under contention; rollback on failure
/// is a decrement").
pub struct LsnAllocator {
    counter: AtomicI64,
}

impl LsnAllocator {
    /// Initializes from the store's maximum existing LSN (0 if empty).
    pub async fn init(store: &dyn LogStore) -> Result<Self> {
        let max = store.find_max_lsn().await?.map(|l| l.0).unwrap_or(0);
        Ok(Self {
            counter: AtomicI64::new(max),
        })
    }

    /// Allocates one LSN, strictly greater than every value returned before it.
    pub fn next(&self) -> Lsn {
        Lsn(self.counter.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Allocates `n` contiguous LSNs, returned in ascending order.
    pub fn next_batch(&self, n: usize) -> Vec<Lsn> {
        if n == 0 {
            return Vec::new();
        }
        let start = self.counter.fetch_add(n as i64, Ordering::SeqCst) + 1;
        (0..n as i64).map(|i| Lsn(start + i)).collect()
    }

    /// Rolls back `n` allocations after a failed append.
    pub fn rollback(&self, n: usize) {
        self.counter.fetch_sub(n as i64, Ordering::SeqCst);
    }

    pub fn current(&self) -> Lsn {
        Lsn(self.counter.load(Ordering::SeqCst))
    }
}

/// Appends entries and serves the read patterns C7/C8/C9 need, compressing
/// and decompressing payloads transparently (C2).
pub struct WalService {
    store: Arc<dyn LogStore>,
    allocator: LsnAllocator,
    compression: CompressionConfig,
}

impl WalService {
    pub async fn new(store: Arc<dyn LogStore>, compression: CompressionConfig) -> Result<Self> {
        let allocator = LsnAllocator::init(store.as_ref()).await?;
        Ok(Self {
            store,
            allocator,
            compression,
        })
    }

    fn compress_entry(&self, mut entry: WalEntry) -> Result<WalEntry> {
        if let Some(doc) = entry.document.take() {
            let bytes = serde_json::to_vec(&doc)?;
            entry.compressed_document = Some(compress_entry(&bytes, &self.compression)?);
        }
        if let Some(doc) = entry.old_document.take() {
            let bytes = serde_json::to_vec(&doc)?;
            entry.compressed_old_document = Some(compress_entry(&bytes, &self.compression)?);
        }
        Ok(entry)
    }

    fn decompress_entry(&self, mut entry: WalEntry) -> Result<WalEntry> {
        if let Some(bytes) = entry.compressed_document.take() {
            let raw = decompress_entry(&bytes)?;
            entry.document = Some(serde_json::from_slice(&raw)?);
        }
        if let Some(bytes) = entry.compressed_old_document.take() {
            let raw = decompress_entry(&bytes)?;
            entry.old_document = Some(serde_json::from_slice(&raw)?);
        }
        Ok(entry)
    }

    /// Allocates one LSN, stamps the timestamp, compresses, and inserts.
    pub async fn append(&self, mut entry: WalEntry) -> Result<Lsn> {
        let lsn = self.allocator.next();
        entry.lsn = lsn;
        entry.timestamp = Utc::now().timestamp_millis();

        let entry = match self.compress_entry(entry) {
            Ok(e) => e,
            Err(e) => {
                self.allocator.rollback(1);
                return Err(e);
            }
        };

        match self.store.append(entry).await {
            Ok(lsn) => Ok(lsn),
            Err(e) => {
                self.allocator.rollback(1);
                Err(e)
            }
        }
    }

    /// Allocates `N` LSNs contiguously, stamps all with the same timestamp,
    /// compresses each, and performs one ordered bulk insert.
    pub async fn append_batch(&self, entries: Vec<WalEntry>) -> Result<Vec<Lsn>> {
        let n = entries.len();
        if n == 0 {
            return Ok(Vec::new());
        }
        let lsns = self.allocator.next_batch(n);
        let timestamp = Utc::now().timestamp_millis();

        let mut stamped = Vec::with_capacity(n);
        for (entry, lsn) in entries.into_iter().zip(&lsns) {
            let mut entry = entry;
            entry.lsn = *lsn;
            entry.timestamp = timestamp;
            match self.compress_entry(entry) {
                Ok(e) => stamped.push(e),
                Err(e) => {
                    self.allocator.rollback(n);
                    return Err(e);
                }
            }
        }

        match self.store.append_batch(stamped).await {
            Ok(lsns) => Ok(lsns),
            Err(e) => {
                self.allocator.rollback(n);
                Err(e)
            }
        }
    }

    async fn read_decompressed(&self, filter: StoreFilter) -> Result<Vec<WalEntry>> {
        let mut entries = self.store.find(&filter).await?;
        entries.sort_by_key(|e| e.lsn);
        entries
            .into_iter()
            .map(|e| self.decompress_entry(e))
            .collect()
    }

    pub async fn get_branch_entries(
        &self,
        branch_id: &str,
        collection: Option<&str>,
        lo_lsn: Lsn,
        hi_lsn: Lsn,
    ) -> Result<Vec<WalEntry>> {
        self.read_decompressed(StoreFilter {
            branch_id: Some(branch_id.to_string()),
            collection: collection.map(str::to_string),
            lo_lsn: Some(lo_lsn),
            hi_lsn: Some(hi_lsn),
            ..Default::default()
        })
        .await
    }

    pub async fn get_project_entries(
        &self,
        project_id: &str,
        collection: Option<&str>,
        lo_lsn: Lsn,
        hi_lsn: Lsn,
    ) -> Result<Vec<WalEntry>> {
        self.read_decompressed(StoreFilter {
            project_id: Some(project_id.to_string()),
            collection: collection.map(str::to_string),
            lo_lsn: Some(lo_lsn),
            hi_lsn: Some(hi_lsn),
            ..Default::default()
        })
        .await
    }

    pub async fn get_document_history(
        &self,
        branch_id: &str,
        collection: &str,
        document_id: &str,
        lo_lsn: Lsn,
        hi_lsn: Lsn,
    ) -> Result<Vec<WalEntry>> {
        self.read_decompressed(StoreFilter {
            branch_id: Some(branch_id.to_string()),
            collection: Some(collection.to_string()),
            document_id: Some(document_id.to_string()),
            lo_lsn: Some(lo_lsn),
            hi_lsn: Some(hi_lsn),
            ..Default::default()
        })
        .await
    }

    /// `get_document_history`, scoped by project rather than branch — needed
    /// for a forked branch's ancestor range, whose entries carry the parent's
    /// `branch_id` rather than the current branch's.
    pub async fn get_document_history_in_project(
        &self,
        project_id: &str,
        collection: &str,
        document_id: &str,
        lo_lsn: Lsn,
        hi_lsn: Lsn,
    ) -> Result<Vec<WalEntry>> {
        self.read_decompressed(StoreFilter {
            project_id: Some(project_id.to_string()),
            collection: Some(collection.to_string()),
            document_id: Some(document_id.to_string()),
            lo_lsn: Some(lo_lsn),
            hi_lsn: Some(hi_lsn),
            ..Default::default()
        })
        .await
    }

    /// Entries with `timestamp ≤ max_timestamp`, used to locate an LSN by
    /// wall-clock time.
    pub async fn get_entries_by_timestamp(
        &self,
        project_id: &str,
        max_timestamp: i64,
    ) -> Result<Vec<WalEntry>> {
        self.read_decompressed(StoreFilter {
            project_id: Some(project_id.to_string()),
            max_timestamp: Some(max_timestamp),
            ..Default::default()
        })
        .await
    }

    pub async fn find_by_lsn(&self, lsn: Lsn) -> Result<Option<WalEntry>> {
        match self.store.find_by_lsn(lsn).await? {
            Some(e) => Ok(Some(self.decompress_entry(e)?)),
            None => Ok(None),
        }
    }

    pub fn current_lsn(&self) -> Lsn {
        self.allocator.current()
    }

    pub async fn create_indexes(&self) -> Result<()> {
        self.store.create_indexes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryLogStore;
    use serde_json::json;

    async fn make_service() -> (Arc<dyn LogStore>, WalService) {
        let store: Arc<dyn LogStore> = Arc::new(MemoryLogStore::new());
        let service = WalService::new(store.clone(), CompressionConfig::default())
            .await
            .unwrap();
        (store, service)
    }

    #[test]
    fn lsn_allocator_is_strictly_increasing() {
        let alloc = LsnAllocator {
            counter: AtomicI64::new(0),
        };
        let a = alloc.next();
        let b = alloc.next();
        assert!(b > a);
    }

    #[test]
    fn batch_allocation_is_contiguous() {
        let alloc = LsnAllocator {
            counter: AtomicI64::new(0),
        };
        let batch = alloc.next_batch(3);
        assert_eq!(batch, vec![Lsn(1), Lsn(2), Lsn(3)]);
    }

    #[tokio::test]
    async fn append_then_read_round_trips_document() {
        let (_, service) = make_service().await;
        let entry = WalEntry::new("proj", "main", Operation::Insert)
            .with_collection("users")
            .with_document_id("doc1")
            .with_document(json!({"_id": "doc1", "name": "A"}));
        let lsn = service.append(entry).await.unwrap();

        let found = service.find_by_lsn(lsn).await.unwrap().unwrap();
        assert_eq!(found.document.unwrap()["name"], "A");
    }

    #[tokio::test]
    async fn append_failure_rolls_back_allocator() {
        let (store, service) = make_service().await;

        // Seed the store at the LSN the allocator is about to hand out, so
        // the service's own append collides with it.
        let mut pre_seeded = WalEntry::new("proj", "main", Operation::Insert);
        pre_seeded.lsn = service.current_lsn().next();
        store.append(pre_seeded).await.unwrap();

        let before = service.current_lsn();
        let entry = WalEntry::new("proj", "main", Operation::Insert)
            .with_document(json!({"_id": "doc1"}));
        let result = service.append(entry).await;

        assert!(result.is_err());
        assert_eq!(service.current_lsn(), before);
    }

    #[tokio::test]
    async fn batch_append_rolls_back_on_failure() {
        let (store, service) = make_service().await;

        let mut pre_seeded = WalEntry::new("proj", "main", Operation::Insert);
        pre_seeded.lsn = service.current_lsn().next().next();
        store.append(pre_seeded).await.unwrap();

        let before = service.current_lsn();
        let entries = vec![
            WalEntry::new("proj", "main", Operation::Insert).with_document(json!({"_id": "a"})),
            WalEntry::new("proj", "main", Operation::Insert).with_document(json!({"_id": "b"})),
        ];
        let result = service.append_batch(entries).await;

        assert!(result.is_err());
        assert_eq!(service.current_lsn(), before);
    }
}
