// Materializer (C7): replays the WAL stream that logically belongs to a
// branch into current collection state, applying filter/update operators.

pub mod filter;
pub mod update;

use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::branch::Branch;
use crate::cancellation::CancellationToken;
use crate::error::{ArgonError, Result};
use crate::ids::Lsn;
use crate::monitoring::EngineMetrics;
use crate::wal::{Operation, WalEntry, WalService};
use std::time::Instant;

/// Decodes the `{filter, update}` pair stored by the interceptor for an
/// update entry. Per spec §9 the pair must be decodable whether its
/// sub-fields arrived as typed values or as a raw JSON-encoded string —
/// the second shape only shows up when an entry was round-tripped through
/// an external encoding, so this falls back to re-parsing the whole
/// payload as a string before giving up.
fn decode_filter_update(document: &Value, lsn: Lsn) -> Result<(Value, Value)> {
    if let (Some(filter), Some(update)) = (document.get("filter"), document.get("update")) {
        return Ok((filter.clone(), update.clone()));
    }
    if let Some(s) = document.as_str() {
        if let Ok(reparsed) = serde_json::from_str::<Value>(s) {
            if let (Some(filter), Some(update)) = (reparsed.get("filter"), reparsed.get("update")) {
                return Ok((filter.clone(), update.clone()));
            }
        }
    }
    Err(ArgonError::InvalidFilterUpdateFormat(lsn.0))
}

fn document_id_of(document: &Value) -> Option<String> {
    document.get("_id").map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// Folds an LSN-ordered entry stream into a document-ID → document map.
fn fold_entries(entries: Vec<WalEntry>) -> Result<HashMap<String, Value>> {
    let mut state: HashMap<String, Value> = HashMap::new();

    for entry in entries {
        match entry.operation {
            Operation::Insert => {
                let document = entry
                    .document
                    .ok_or_else(|| ArgonError::InvalidFilterUpdateFormat(entry.lsn.0))?;
                let id = document_id_of(&document)
                    .ok_or_else(|| ArgonError::MissingDocumentId(entry.lsn.to_string()))?;
                state.insert(id, document);
            }
            Operation::Update => {
                let payload = entry
                    .document
                    .ok_or_else(|| ArgonError::InvalidFilterUpdateFormat(entry.lsn.0))?;
                let (filter, update) = decode_filter_update(&payload, entry.lsn)?;
                if let Some((_, document)) = state.iter_mut().find(|(_, doc)| filter::matches(doc, &filter)) {
                    update::apply(document, &update);
                }
            }
            Operation::Delete => {
                let filter = entry
                    .document
                    .ok_or_else(|| ArgonError::InvalidFilterUpdateFormat(entry.lsn.0))?;
                if let Some(id) = state
                    .iter()
                    .find(|(_, doc)| filter::matches(doc, &filter))
                    .map(|(id, _)| id.clone())
                {
                    state.remove(&id);
                }
            }
            Operation::CreateProject
            | Operation::DeleteProject
            | Operation::CreateBranch
            | Operation::DeleteBranch => {
                // Administrative entries carry no collection/document state.
            }
        }
    }

    Ok(state)
}

/// Assembles the entry stream a branch logically owns for `collection`,
/// bounded above by `hi_lsn` (spec §4.7, reused by C8/C9 with a smaller
/// bound than `head_lsn`).
async fn assemble_stream(
    wal: &WalService,
    branch: &Branch,
    collection: &str,
    hi_lsn: Lsn,
) -> Result<Vec<WalEntry>> {
    let mut entries = Vec::new();

    if branch.base_lsn > Lsn::ZERO {
        let ancestor_hi = branch.base_lsn.min(hi_lsn);
        entries.extend(
            wal.get_project_entries(branch.project_id.as_str(), Some(collection), Lsn::ZERO, ancestor_hi)
                .await?,
        );
    }

    if hi_lsn > branch.base_lsn {
        entries.extend(
            wal.get_branch_entries(branch.id.as_str(), Some(collection), branch.base_lsn, hi_lsn)
                .await?,
        );
    }

    entries.sort_by_key(|e| e.lsn);
    Ok(entries)
}

/// Same ancestor+branch assembly as `assemble_stream`, narrowed to entries
/// tagged with `document_id` (spec §4.7.3's `MaterializeDocument`). The
/// ancestor half reads via `get_document_history_in_project` since those
/// entries carry the ancestor's own `branch_id`, not this branch's.
async fn assemble_document_stream(
    wal: &WalService,
    branch: &Branch,
    collection: &str,
    document_id: &str,
    hi_lsn: Lsn,
) -> Result<Vec<WalEntry>> {
    let mut entries = Vec::new();

    if branch.base_lsn > Lsn::ZERO {
        let ancestor_hi = branch.base_lsn.min(hi_lsn);
        entries.extend(
            wal.get_document_history_in_project(
                branch.project_id.as_str(),
                collection,
                document_id,
                Lsn::ZERO,
                ancestor_hi,
            )
            .await?,
        );
    }

    if hi_lsn > branch.base_lsn {
        entries.extend(
            wal.get_document_history(branch.id.as_str(), collection, document_id, branch.base_lsn, hi_lsn)
                .await?,
        );
    }

    entries.sort_by_key(|e| e.lsn);
    Ok(entries)
}

pub struct Materializer {
    wal: Arc<WalService>,
    metrics: Arc<EngineMetrics>,
}

impl Materializer {
    pub fn new(wal: Arc<WalService>, metrics: Arc<EngineMetrics>) -> Self {
        Self { wal, metrics }
    }

    /// `MaterializeCollection` — current state of `collection` on `branch`.
    pub async fn materialize_collection(
        &self,
        branch: &Branch,
        collection: &str,
    ) -> Result<HashMap<String, Value>> {
        self.materialize_at(branch, collection, branch.head_lsn).await
    }

    /// Same pipeline bounded by an arbitrary `hi_lsn` — the hook C8/C9 reuse.
    pub async fn materialize_at(
        &self,
        branch: &Branch,
        collection: &str,
        hi_lsn: Lsn,
    ) -> Result<HashMap<String, Value>> {
        self.materialize_at_cancellable(branch, collection, hi_lsn, &CancellationToken::none())
            .await
    }

    /// `materialize_at`, but checked for cancellation at the store boundary
    /// before the entry stream is assembled.
    pub async fn materialize_at_cancellable(
        &self,
        branch: &Branch,
        collection: &str,
        hi_lsn: Lsn,
        token: &CancellationToken,
    ) -> Result<HashMap<String, Value>> {
        token.check()?;
        let started = Instant::now();
        let result = assemble_stream(&self.wal, branch, collection, hi_lsn)
            .await
            .and_then(fold_entries);
        match &result {
            Ok(_) => {
                self.metrics.materializations.inc();
                self.metrics.record_success(started.elapsed());
            }
            Err(_) => self.metrics.record_failure(started.elapsed()),
        }
        result
    }

    /// `MaterializeDocument` — replays only the entries tagged with
    /// `document_id` (spec §4.7.3), rather than the full collection. This
    /// mirrors an update/delete whose filter pinned this exact document via
    /// a literal `{"_id": ...}` equality; one whose filter matched this
    /// document some other way (e.g. `{"name": "A"}`) was never tagged with
    /// its ID and so is invisible here, even though `materialize_collection`
    /// would reflect it. That's the tradeoff of a document-scoped stream
    /// over a collection-wide one — narrower I/O, at the cost of filters
    /// that don't name the ID directly.
    pub async fn materialize_document(
        &self,
        branch: &Branch,
        collection: &str,
        document_id: &str,
    ) -> Result<Option<Value>> {
        let started = Instant::now();
        let result = assemble_document_stream(&self.wal, branch, collection, document_id, branch.head_lsn)
            .await
            .and_then(fold_entries);
        match &result {
            Ok(_) => {
                self.metrics.materializations.inc();
                self.metrics.record_success(started.elapsed());
            }
            Err(_) => self.metrics.record_failure(started.elapsed()),
        }
        Ok(result?.get(document_id).cloned())
    }

    /// `MaterializeBranch` — the assembled stream for every collection,
    /// keyed by `(collection, document_id)`.
    pub async fn materialize_branch(
        &self,
        branch: &Branch,
        collections: &[String],
    ) -> Result<HashMap<(String, String), Value>> {
        let mut result = HashMap::new();
        for collection in collections {
            let state = self.materialize_collection(branch, collection).await?;
            for (id, doc) in state {
                result.insert((collection.clone(), id), doc);
            }
        }
        Ok(result)
    }
}
