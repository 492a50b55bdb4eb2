//! Content Store
//!
//! Durable home of harvested text. The sync engine only needs a handful of
//! primitives from the store:
//!
//! - fetch a record by key
//! - create a record
//! - delete a record by key
//! - list the item records stored for one source
//!
//! On top of these, [`upsert_record`] implements the idempotent write: a
//! record whose text is byte-identical is left alone, otherwise the old
//! record is deleted before the new one is created. The store never holds
//! two records for the same key.
//!
//! Backends:
//! - [`MemoryStore`]: process-local map, for dry runs and tests
//! - [`SqliteStore`]: single-table SQLite database

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use crate::source::ItemId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What a record holds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Profile,
    Item,
    State,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Profile => "profile",
            RecordKind::Item => "item",
            RecordKind::State => "state",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "profile" => Some(RecordKind::Profile),
            "item" => Some(RecordKind::Item),
            "state" => Some(RecordKind::State),
            _ => None,
        }
    }
}

/// Metadata stored alongside record text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    /// Source account the record came from (empty for engine state)
    pub source: String,
    pub kind: RecordKind,
    /// Set for item records
    pub item_id: Option<ItemId>,
    pub stored_at: DateTime<Utc>,
}

impl RecordMetadata {
    pub fn profile(source: &str) -> Self {
        Self {
            source: source.to_string(),
            kind: RecordKind::Profile,
            item_id: None,
            stored_at: Utc::now(),
        }
    }

    pub fn item(source: &str, item_id: ItemId) -> Self {
        Self {
            source: source.to_string(),
            kind: RecordKind::Item,
            item_id: Some(item_id),
            stored_at: Utc::now(),
        }
    }

    pub fn state() -> Self {
        Self {
            source: String::new(),
            kind: RecordKind::State,
            item_id: None,
            stored_at: Utc::now(),
        }
    }
}

/// One stored unit of canonical text
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRecord {
    pub key: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

/// Key of a source's profile record
pub fn profile_key(source: &str) -> String {
    format!("{}-profile", source)
}

/// Key of an item record, built from the canonical id
pub fn item_key(id: &ItemId) -> String {
    format!("item-{}", id.canonical())
}

/// Persistent content repository
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Fetch the record stored under `key`, if any
    async fn get_by_key(&self, key: &str) -> StoreResult<Option<ContentRecord>>;

    /// Create a record. Fails with `Duplicate` if `key` is taken.
    async fn create(&self, key: &str, text: &str, metadata: RecordMetadata) -> StoreResult<()>;

    /// Delete the record stored under `key`. Deleting a missing key is not an error.
    async fn delete_by_key(&self, key: &str) -> StoreResult<()>;

    /// All item records stored for `source`, in no particular order
    async fn list_items(&self, source: &str) -> StoreResult<Vec<ContentRecord>>;
}

/// Result of an idempotent upsert
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// No previous record existed
    Created,
    /// Previous record had different text and was replaced
    Replaced,
    /// Previous record had identical text; nothing written
    Unchanged,
}

impl UpsertOutcome {
    /// Whether the store was modified
    pub fn wrote(&self) -> bool {
        !matches!(self, UpsertOutcome::Unchanged)
    }
}

/// Write `text` under `key` unless an identical record already exists
pub async fn upsert_record(
    store: &dyn ContentStore,
    key: &str,
    text: &str,
    metadata: RecordMetadata,
) -> StoreResult<UpsertOutcome> {
    match store.get_by_key(key).await? {
        Some(existing) if existing.text == text => Ok(UpsertOutcome::Unchanged),
        Some(_) => {
            store.delete_by_key(key).await?;
            store.create(key, text, metadata).await?;
            Ok(UpsertOutcome::Replaced)
        }
        None => {
            store.create(key, text, metadata).await?;
            Ok(UpsertOutcome::Created)
        }
    }
}

/// Errors that can occur in a content store
#[derive(Error, Debug)]
pub enum StoreError {
    /// Record already exists under this key
    #[error("Record already exists: {0}")]
    Duplicate(String),

    /// Database operation failed
    #[error("Database error: {0}")]
    Sqlite(String),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Lock acquisition failed
    #[error("Lock error: {0}")]
    Lock(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Sqlite(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
