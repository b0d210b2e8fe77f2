// Error taxonomy for Argon.
//
// Every variant maps onto one of the error kinds from the design's error
// taxonomy (validation, database, timeout, not_found, conflict, internal,
// rate_limit, permission) via `ArgonError::kind`. Variants carry their own
// structured fields rather than a generic details map — `thiserror` already
// gives each variant a concrete shape, so a second stringly-typed layer on
// top of it would just be duplicated bookkeeping.

use thiserror::Error;

/// Stable, user-facing classification of an error. Callers (CLI/dashboard
/// collaborators) that need to decide "retry or surface to the user" switch
/// on this rather than matching every `ArgonError` variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Database,
    Timeout,
    NotFound,
    Conflict,
    Internal,
    RateLimit,
    Permission,
}

#[derive(Error, Debug)]
pub enum ArgonError {
    #[error("project not found: {0}")]
    ProjectNotFound(String),

    #[error("project already exists: {0}")]
    ProjectExists(String),

    #[error("branch not found: {0}")]
    BranchNotFound(String),

    #[error("branch already exists: {name} in project {project_id}")]
    BranchExists { project_id: String, name: String },

    #[error("cannot delete branch 'main'")]
    CannotDeleteMain,

    #[error("branch {0} has non-deleted child branches")]
    BranchHasChildren(String),

    #[error("lsn {lsn} is out of range: branch head is {head_lsn}")]
    LsnOutOfRange { lsn: i64, head_lsn: i64 },

    #[error("lsn {lsn} is negative")]
    NegativeLsn { lsn: i64 },

    #[error("restore target {target} is below branch base_lsn {base_lsn}")]
    RestoreBelowBase { target: i64, base_lsn: i64 },

    #[error("destructive restore requires explicit confirmation (preview: {discarded} operations would be discarded)")]
    RestoreNotConfirmed { discarded: usize },

    #[error("timestamp {0} is in the future")]
    FutureTimestamp(i64),

    #[error("document {0} has no _id field")]
    MissingDocumentId(String),

    #[error("invalid filter/update format at lsn {0}")]
    InvalidFilterUpdateFormat(i64),

    #[error("unknown compression algorithm byte: {0}")]
    UnknownCompressionAlgorithm(u8),

    #[error("compressed payload is truncated or corrupt")]
    CorruptCompressedPayload,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("operation cancelled")]
    Cancelled,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal invariant violation: {0}")]
    Internal(String),
}

impl ArgonError {
    pub fn kind(&self) -> ErrorKind {
        use ArgonError::*;
        match self {
            ProjectNotFound(_) | BranchNotFound(_) => ErrorKind::NotFound,
            ProjectExists(_)
            | BranchExists { .. }
            | CannotDeleteMain
            | BranchHasChildren(_)
            | RestoreBelowBase { .. }
            | RestoreNotConfirmed { .. } => ErrorKind::Conflict,
            LsnOutOfRange { .. }
            | NegativeLsn { .. }
            | FutureTimestamp(_)
            | MissingDocumentId(_)
            | InvalidFilterUpdateFormat(_)
            | UnknownCompressionAlgorithm(_)
            | CorruptCompressedPayload
            | InvalidInput(_) => ErrorKind::Validation,
            Serialization(_) => ErrorKind::Internal,
            Store(_) => ErrorKind::Database,
            Timeout(_) => ErrorKind::Timeout,
            Cancelled => ErrorKind::Internal,
            Internal(_) => ErrorKind::Internal,
        }
    }

    /// Whether a caller may reasonably retry the operation unchanged.
    pub fn retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Database | ErrorKind::Timeout)
    }
}

impl From<serde_json::Error> for ArgonError {
    fn from(e: serde_json::Error) -> Self {
        ArgonError::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ArgonError>;
