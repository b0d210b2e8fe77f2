// Interceptor (C6): translates insert/update/delete into WAL entries and
// advances the branch head.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Instant;

use crate::branch::{Branch, BranchService};
use crate::cancellation::CancellationToken;
use crate::error::{ArgonError, Result};
use crate::ids::DocumentId;
use crate::monitoring::EngineMetrics;
use crate::wal::{Operation, WalEntry, WalService};

/// Mimics the document-store contract's result shapes (spec §4.6).
#[derive(Debug, Clone, PartialEq)]
pub struct InsertResult {
    pub inserted_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    pub matched_count: u64,
    pub modified_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeleteResult {
    pub deleted_count: u64,
}

pub struct Interceptor {
    wal: Arc<WalService>,
    branches: Arc<BranchService>,
    metrics: Arc<EngineMetrics>,
}

impl Interceptor {
    pub fn new(wal: Arc<WalService>, branches: Arc<BranchService>, metrics: Arc<EngineMetrics>) -> Self {
        Self { wal, branches, metrics }
    }

    fn document_id_of(document: &Value) -> Option<String> {
        document.get("_id").map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
    }

    /// Step 1 of update/delete (spec §4.6): pulls a document ID out of the
    /// filter when it pins exactly one document by a literal `_id` equality,
    /// e.g. `{"_id": "..."}`. An operator-shaped `_id` (`{"_id": {"$in":
    /// [...]}}`) doesn't name a single document, so it's left unextracted —
    /// that write still lands, it's simply invisible to `get_document_history`.
    fn document_id_from_filter(filter: &Value) -> Option<String> {
        match filter.get("_id")? {
            Value::Object(_) => None,
            other => Some(Self::document_id_of(&json!({ "_id": other }))?),
        }
    }

    async fn append_and_advance(
        &self,
        branch: &Branch,
        entry: WalEntry,
        token: &CancellationToken,
    ) -> Result<crate::ids::Lsn> {
        // Store boundary: the next suspension point before the write lands.
        token.check()?;
        let started = Instant::now();
        let result = self.wal.append(entry).await;
        let lsn = match result {
            Ok(lsn) => lsn,
            Err(e) => {
                self.metrics.record_failure(started.elapsed());
                return Err(e);
            }
        };
        // Append failure surfaces unchanged above and head is never reached;
        // only a successful append advances the branch.
        match self.branches.update_branch_head(&branch.id, lsn) {
            Ok(()) => {
                self.metrics.record_success(started.elapsed());
                Ok(lsn)
            }
            Err(e) => {
                self.metrics.record_failure(started.elapsed());
                Err(e)
            }
        }
    }

    pub async fn insert_one(&self, branch: &Branch, collection: &str, document: Value) -> Result<InsertResult> {
        self.insert_one_cancellable(branch, collection, document, &CancellationToken::none())
            .await
    }

    pub async fn insert_one_cancellable(
        &self,
        branch: &Branch,
        collection: &str,
        mut document: Value,
        token: &CancellationToken,
    ) -> Result<InsertResult> {
        token.check()?;
        let doc_obj = document
            .as_object_mut()
            .ok_or_else(|| ArgonError::InvalidInput("document must be an object".into()))?;
        if !doc_obj.contains_key("_id") {
            doc_obj.insert(
                "_id".to_string(),
                Value::String(DocumentId::new_uuid().to_string()),
            );
        }
        let document_id = Self::document_id_of(&document)
            .ok_or_else(|| ArgonError::MissingDocumentId(collection.to_string()))?;

        let entry = WalEntry::new(branch.project_id.as_str(), branch.id.as_str(), Operation::Insert)
            .with_collection(collection)
            .with_document_id(document_id.clone())
            .with_document(document);

        self.append_and_advance(branch, entry, token).await?;
        self.metrics.inserts.inc();
        Ok(InsertResult {
            inserted_id: document_id,
        })
    }

    /// Calls `insert_one` for each document in turn and collects the IDs.
    pub async fn insert_many(
        &self,
        branch: &Branch,
        collection: &str,
        documents: Vec<Value>,
    ) -> Result<Vec<String>> {
        let mut ids = Vec::with_capacity(documents.len());
        for document in documents {
            ids.push(self.insert_one(branch, collection, document).await?.inserted_id);
        }
        Ok(ids)
    }

    pub async fn update_one(&self, branch: &Branch, collection: &str, filter: Value, update: Value) -> Result<UpdateResult> {
        self.update_one_cancellable(branch, collection, filter, update, &CancellationToken::none())
            .await
    }

    pub async fn update_one_cancellable(
        &self,
        branch: &Branch,
        collection: &str,
        filter: Value,
        update: Value,
        token: &CancellationToken,
    ) -> Result<UpdateResult> {
        token.check()?;
        let document_id = Self::document_id_from_filter(&filter);
        let payload = json!({ "filter": filter, "update": update });
        let mut entry = WalEntry::new(branch.project_id.as_str(), branch.id.as_str(), Operation::Update)
            .with_collection(collection)
            .with_document(payload);
        if let Some(id) = document_id {
            entry = entry.with_document_id(id);
        }

        self.append_and_advance(branch, entry, token).await?;
        self.metrics.updates.inc();
        Ok(UpdateResult {
            matched_count: 1,
            modified_count: 1,
        })
    }

    pub async fn delete_one(&self, branch: &Branch, collection: &str, filter: Value) -> Result<DeleteResult> {
        self.delete_one_cancellable(branch, collection, filter, &CancellationToken::none())
            .await
    }

    pub async fn delete_one_cancellable(
        &self,
        branch: &Branch,
        collection: &str,
        filter: Value,
        token: &CancellationToken,
    ) -> Result<DeleteResult> {
        token.check()?;
        let document_id = Self::document_id_from_filter(&filter);
        let mut entry = WalEntry::new(branch.project_id.as_str(), branch.id.as_str(), Operation::Delete)
            .with_collection(collection)
            .with_document(filter);
        if let Some(id) = document_id {
            entry = entry.with_document_id(id);
        }

        self.append_and_advance(branch, entry, token).await?;
        self.metrics.deletes.inc();
        Ok(DeleteResult { deleted_count: 1 })
    }
}
