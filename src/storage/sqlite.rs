//! `SQLite`-backed [`VectorStore`](super::VectorStore).

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{Connection, OptionalExtension, params};

use crate::error::{ConfigError, Result, StorageError};

use super::schema::{GET_VERSION_SQL, SCHEMA_SQL, SET_VERSION_SQL, CURRENT_SCHEMA_VERSION};
use super::{Distance, QueryResult, VectorRow, VectorStore};

/// A single fixed-dimension collection, backed by one `SQLite` database
/// file (or an in-memory connection for tests).
pub struct SqliteVectorStore {
    conn: Connection,
    path: Option<PathBuf>,
    collection: String,
    dimension: usize,
}

impl SqliteVectorStore {
    /// Opens (creating if absent) the database at `path`, and opens or
    /// creates `collection` within it at `dimension`.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the database cannot be opened or the
    /// schema cannot be applied, or a `Configuration::DimensionMismatch` if
    /// `collection` already exists at a different dimension.
    pub fn open(path: impl AsRef<Path>, collection: &str, dimension: usize) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let conn = Connection::open(&path).map_err(StorageError::from)?;

        // Use WAL mode for better concurrent access (returns a result, use query_row).
        let _: String = conn
            .query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))
            .map_err(StorageError::from)?;

        let mut store = Self {
            conn,
            path: Some(path),
            collection: collection.to_string(),
            dimension,
        };
        store.init(collection, dimension)?;
        Ok(store)
    }

    /// Opens an in-memory store, for tests.
    ///
    /// # Errors
    ///
    /// Returns a `Storage` error if the schema cannot be applied.
    pub fn in_memory(collection: &str, dimension: usize) -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(StorageError::from)?;
        let mut store = Self {
            conn,
            path: None,
            collection: collection.to_string(),
            dimension,
        };
        store.init(collection, dimension)?;
        Ok(store)
    }

    /// Path to the backing database file, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init(&mut self, collection: &str, dimension: usize) -> Result<()> {
        // Enable foreign keys so `drop_collection`'s `ON DELETE CASCADE` actually fires.
        self.conn
            .execute("PRAGMA foreign_keys = ON;", [])
            .map_err(StorageError::from)?;
        self.conn.execute_batch(SCHEMA_SQL).map_err(StorageError::from)?;
        let version: Option<u32> = self
            .conn
            .query_row(GET_VERSION_SQL, [], |row| row.get(0))
            .optional()
            .map_err(StorageError::from)?;
        if version.is_none() {
            self.conn
                .execute(SET_VERSION_SQL, params![CURRENT_SCHEMA_VERSION])
                .map_err(StorageError::from)?;
        }

        let existing: Option<i64> = self
            .conn
            .query_row(
                "SELECT dimension FROM collections WHERE name = ?1",
                params![collection],
                |row| row.get(0),
            )
            .optional()
            .map_err(StorageError::from)?;

        match existing {
            Some(existing_dim) => {
                #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
                let existing_dim = existing_dim as usize;
                if existing_dim != dimension {
                    return Err(ConfigError::DimensionMismatch {
                        expected: existing_dim,
                        actual: dimension,
                    }
                    .into());
                }
            }
            None => {
                self.conn
                    .execute(
                        "INSERT INTO collections (name, dimension, created_at) VALUES (?1, ?2, ?3)",
                        params![collection, dimension as i64, now()],
                    )
                    .map_err(StorageError::from)?;
            }
        }

        Ok(())
    }

    fn check_dimension(&self, embedding: &[f32]) -> Result<()> {
        if embedding.len() != self.dimension {
            return Err(ConfigError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.len(),
            }
            .into());
        }
        Ok(())
    }

    fn insert_row(conn: &Connection, collection: &str, row: &VectorRow) -> Result<i64> {
        let metadata = serde_json::to_string(&row.metadata).map_err(StorageError::from)?;
        let updated_at = row.updated_at.unwrap_or_else(now);
        conn.execute(
            "INSERT INTO vectors (collection_name, embedding, file_name, file_position, content, metadata, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                collection,
                serialize_embedding(&row.embedding),
                row.file_name,
                row.file_position,
                row.content,
                metadata,
                updated_at,
            ],
        )
        .map_err(StorageError::from)?;
        Ok(conn.last_insert_rowid())
    }

    fn row_from_sqlite(sql_row: &rusqlite::Row<'_>) -> rusqlite::Result<VectorRow> {
        let id: i64 = sql_row.get("id")?;
        let embedding_bytes: Vec<u8> = sql_row.get("embedding")?;
        let metadata_json: String = sql_row.get("metadata")?;
        let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
        Ok(VectorRow {
            id: Some(id),
            embedding: deserialize_embedding(&embedding_bytes),
            file_name: sql_row.get("file_name")?,
            file_position: sql_row.get("file_position")?,
            content: sql_row.get("content")?,
            metadata,
            updated_at: sql_row.get("updated_at")?,
        })
    }
}

impl VectorStore for SqliteVectorStore {
    fn insert(&mut self, row: VectorRow) -> Result<i64> {
        self.check_dimension(&row.embedding)?;
        Self::insert_row(&self.conn, &self.collection, &row)
    }

    fn batch_insert(&mut self, rows: &[VectorRow], batch_size: usize) -> Result<()> {
        for row in rows {
            self.check_dimension(&row.embedding)?;
        }
        let batch_size = batch_size.max(1);
        for page in rows.chunks(batch_size) {
            let tx = self.conn.transaction().map_err(StorageError::from)?;
            for row in page {
                Self::insert_row(&tx, &self.collection, row)?;
            }
            tx.commit().map_err(StorageError::from)?;
        }
        Ok(())
    }

    fn query(&self, embedding: &[f32], k: usize, distance: Distance) -> Result<Vec<QueryResult>> {
        self.check_dimension(embedding)?;

        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, embedding, file_name, file_position, content, metadata, updated_at
                 FROM vectors WHERE collection_name = ?1",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![self.collection], Self::row_from_sqlite)
            .map_err(StorageError::from)?;

        let mut scored = Vec::new();
        for row in rows {
            let row = row.map_err(StorageError::from)?;
            let d = distance.compute(embedding, &row.embedding);
            scored.push(QueryResult { row, distance: d });
        }

        scored.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.row.id.cmp(&b.row.id))
        });
        scored.truncate(k);
        Ok(scored)
    }

    fn get_file(&self, file_name: &str) -> Result<Vec<VectorRow>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, embedding, file_name, file_position, content, metadata, updated_at
                 FROM vectors WHERE collection_name = ?1 AND file_name = ?2
                 ORDER BY file_position ASC",
            )
            .map_err(StorageError::from)?;
        let rows = stmt
            .query_map(params![self.collection, file_name], Self::row_from_sqlite)
            .map_err(StorageError::from)?;
        rows.map(|r| r.map_err(|e| StorageError::from(e).into()))
            .collect()
    }

    fn delete_file(&mut self, file_name: &str) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM vectors WHERE collection_name = ?1 AND file_name = ?2",
                params![self.collection, file_name],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM vectors WHERE collection_name = ?1",
                params![self.collection],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }

    fn drop_collection(&mut self) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM collections WHERE name = ?1",
                params![self.collection],
            )
            .map_err(StorageError::from)?;
        Ok(())
    }
}

fn serialize_embedding(embedding: &[f32]) -> Vec<u8> {
    embedding.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn deserialize_embedding(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

#[allow(clippy::cast_possible_wrap, clippy::cast_possible_truncation)]
fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

// SAFETY: `SqliteVectorStore` is only accessed from a single thread at a
// time (callers serialize access with their own locking, e.g. a `Mutex` in
// the orchestrator); `rusqlite::Connection` is `!Sync` only because it
// isn't internally synchronized, not because concurrent use is unsound
// when externally serialized.
unsafe impl Send for SqliteVectorStore {}
unsafe impl Sync for SqliteVectorStore {}
