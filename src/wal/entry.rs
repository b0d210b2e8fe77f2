// WAL entry data model (spec §3).

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::ids::Lsn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Insert,
    Update,
    Delete,
    CreateProject,
    DeleteProject,
    CreateBranch,
    DeleteBranch,
}

/// The only durable unit of mutation. `document`/`old_document` hold the
/// plain-encoded payload; `compressed_document`/`compressed_old_document`
/// hold the on-disk framed form and are mutually exclusive with their plain
/// counterparts once the entry has gone through the compressor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WalEntry {
    pub lsn: Lsn,
    pub timestamp: i64,
    pub project_id: String,
    pub branch_id: String,
    pub operation: Operation,
    pub collection: Option<String>,
    pub document_id: Option<String>,
    pub document: Option<Value>,
    pub old_document: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_document: Option<Vec<u8>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compressed_old_document: Option<Vec<u8>>,
    pub metadata: HashMap<String, Value>,
}

impl WalEntry {
    /// Builds an entry with `lsn` left at `Lsn::ZERO` — callers append through
    /// the WAL service, which stamps the real LSN and timestamp.
    pub fn new(
        project_id: impl Into<String>,
        branch_id: impl Into<String>,
        operation: Operation,
    ) -> Self {
        Self {
            lsn: Lsn::ZERO,
            timestamp: 0,
            project_id: project_id.into(),
            branch_id: branch_id.into(),
            operation,
            collection: None,
            document_id: None,
            document: None,
            old_document: None,
            compressed_document: None,
            compressed_old_document: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn with_document_id(mut self, document_id: impl Into<String>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    pub fn with_document(mut self, document: Value) -> Self {
        self.document = Some(document);
        self
    }

    pub fn with_old_document(mut self, old_document: Value) -> Self {
        self.old_document = Some(old_document);
        self
    }
}
