pub mod firestore;

pub use firestore::FirestoreStore;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{FileRecord, NewFileRecord, SortField, SortOrder};

/// Highest-codepoint sentinel used to close the prefix range. Firestore only
/// offers ordered range queries, so "starts with p" is emulated as
/// `p <= originalName <= p + U+F8FF`. This is the prefix-range approximation:
/// it is not a substring search.
pub const PREFIX_SENTINEL: char = '\u{f8ff}';

/// Sort clause: exactly one field and direction at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub order: SortOrder,
}

/// Query specification for file listings.
///
/// The owner predicate is always present and non-overridable. The optional
/// predicates are conjunctive. `file_type` is an exact MIME equality match;
/// grouped client categories such as "image" will not match stored strings
/// like "image/png" (known limitation, kept as the source behaves).
#[derive(Debug, Clone)]
pub struct RecordQuery {
    pub owner_id: String,
    pub name_prefix: Option<String>,
    pub file_type: Option<String>,
    pub sort: SortSpec,
}

/// Outcome of a delete, so callers can normalize a concurrent double delete
/// into a no-op instead of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    Missing,
}

/// Persists and queries file-record documents in the external document
/// database. No transactions, no pagination (unbounded result sequence).
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record; the store assigns the id exactly once.
    async fn insert(&self, record: &NewFileRecord) -> Result<FileRecord>;

    async fn get_by_id(&self, id: &str) -> Result<Option<FileRecord>>;

    async fn query(&self, query: &RecordQuery) -> Result<Vec<FileRecord>>;

    async fn delete_by_id(&self, id: &str) -> Result<DeleteOutcome>;
}
