//! SQLite Content Store
//!
//! One table, one row per record key. The primary key on `key` enforces the
//! single-record-per-key invariant at the database level.

use super::*;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// SQLite-backed content store
pub struct SqliteStore {
    /// std::sync::Mutex because rusqlite connections are !Sync
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteStore {
    /// Create or open a store at `path`
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> StoreResult<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS content_records (
                key TEXT PRIMARY KEY NOT NULL,
                text TEXT NOT NULL,
                source TEXT NOT NULL,
                kind TEXT NOT NULL,
                item_id TEXT,
                stored_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_source_kind ON content_records(source, kind)",
            [],
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
            path,
        })
    }

    /// Path of the database file, `None` when in memory
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored records
    pub fn count(&self) -> StoreResult<usize> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM content_records", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn lock(&self) -> StoreResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StoreError::Lock(e.to_string()))
    }
}

/// Raw row, converted to a `ContentRecord` outside the rusqlite closure
struct Row {
    key: String,
    text: String,
    source: String,
    kind: String,
    item_id: Option<String>,
    stored_at: String,
}

impl Row {
    fn from_sql(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            key: row.get(0)?,
            text: row.get(1)?,
            source: row.get(2)?,
            kind: row.get(3)?,
            item_id: row.get(4)?,
            stored_at: row.get(5)?,
        })
    }

    fn into_record(self) -> StoreResult<ContentRecord> {
        let kind = RecordKind::parse(&self.kind).ok_or_else(|| {
            StoreError::Serialization(format!("unknown record kind '{}'", self.kind))
        })?;
        let stored_at = DateTime::parse_from_rfc3339(&self.stored_at)
            .map_err(|e| StoreError::Serialization(e.to_string()))?
            .with_timezone(&Utc);

        Ok(ContentRecord {
            key: self.key,
            text: self.text,
            metadata: RecordMetadata {
                source: self.source,
                kind,
                item_id: self.item_id.map(ItemId::new),
                stored_at,
            },
        })
    }
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn get_by_key(&self, key: &str) -> StoreResult<Option<ContentRecord>> {
        let row = {
            let conn = self.lock()?;
            conn.query_row(
                "SELECT key, text, source, kind, item_id, stored_at
                 FROM content_records WHERE key = ?1",
                params![key],
                Row::from_sql,
            )
            .optional()?
        };

        row.map(Row::into_record).transpose()
    }

    async fn create(&self, key: &str, text: &str, metadata: RecordMetadata) -> StoreResult<()> {
        let conn = self.lock()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO content_records (key, text, source, kind, item_id, stored_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key,
                text,
                metadata.source,
                metadata.kind.as_str(),
                metadata.item_id.as_ref().map(|id| id.as_str()),
                metadata.stored_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Err(StoreError::Duplicate(key.to_string()));
        }
        Ok(())
    }

    async fn delete_by_key(&self, key: &str) -> StoreResult<()> {
        let conn = self.lock()?;
        conn.execute("DELETE FROM content_records WHERE key = ?1", params![key])?;
        Ok(())
    }

    async fn list_items(&self, source: &str) -> StoreResult<Vec<ContentRecord>> {
        let rows = {
            let conn = self.lock()?;
            let mut stmt = conn.prepare_cached(
                "SELECT key, text, source, kind, item_id, stored_at
                 FROM content_records WHERE source = ?1 AND kind = ?2",
            )?;
            let rows = stmt
                .query_map(params![source, RecordKind::Item.as_str()], Row::from_sql)?
                .collect::<rusqlite::Result<Vec<Row>>>()?;
            rows
        };

        rows.into_iter().map(Row::into_record).collect()
    }
}
