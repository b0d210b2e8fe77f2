// Domain identifiers shared across Argon's services.
//
// `DocumentId` mirrors the teacher's `document_store::document::DocumentId`
// enum (Uuid/AutoIncrement/Custom) — documents arriving from a MongoDB-like
// caller may already carry a string, numeric, or ObjectId-shaped `_id`, and
// the materializer needs to round-trip whichever shape it was given.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! newtype_string_id {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn generate() -> Self {
                Self(format!("{}_{}", $prefix, Uuid::new_v4()))
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

newtype_string_id!(ProjectId, "proj");
newtype_string_id!(BranchId, "branch");

/// A document's `_id`, in whichever shape the caller supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum DocumentId {
    Uuid(Uuid),
    AutoIncrement(u64),
    Custom(String),
}

impl DocumentId {
    pub fn new_uuid() -> Self {
        DocumentId::Uuid(Uuid::new_v4())
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Uuid(u) => write!(f, "{u}"),
            DocumentId::AutoIncrement(n) => write!(f, "{n}"),
            DocumentId::Custom(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId::Custom(s.to_string())
    }
}

/// Log Sequence Number — the engine's total order. A bare `i64` alias would
/// type-check against any other integer; the newtype keeps LSN arithmetic
/// from accidentally mixing with document counts or timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Lsn(pub i64);

impl Lsn {
    pub const ZERO: Lsn = Lsn(0);

    pub fn next(self) -> Lsn {
        Lsn(self.0 + 1)
    }
}

impl fmt::Display for Lsn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Lsn {
    fn from(v: i64) -> Self {
        Lsn(v)
    }
}

impl From<Lsn> for i64 {
    fn from(v: Lsn) -> Self {
        v.0
    }
}
