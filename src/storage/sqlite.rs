//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{Document, RunRecord, RunStatus, WriteOutcome};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens (or creates) the database at `path` and applies the schema
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Locks a shared storage handle, mapping a poisoned lock to a storage error
pub fn lock_storage<S>(storage: &Mutex<S>) -> StorageResult<MutexGuard<'_, S>> {
    storage
        .lock()
        .map_err(|_| StorageError::Database("storage lock poisoned".to_string()))
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Failed),
        categories_processed: row.get::<_, i64>(5)? as u64,
        products_processed: row.get::<_, i64>(6)? as u64,
    })
}

impl Storage for SqliteStorage {
    // ===== Documents =====

    fn get_document(&self, collection: &str, key: &str) -> StorageResult<Option<Document>> {
        let row = self
            .conn
            .query_row(
                "SELECT body, created_at, updated_at FROM documents
                 WHERE collection = ?1 AND key = ?2",
                params![collection, key],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                    ))
                },
            )
            .optional()?;

        match row {
            Some((body, created_at, updated_at)) => Ok(Some(Document {
                collection: collection.to_string(),
                key: key.to_string(),
                body: serde_json::from_str(&body)?,
                created_at,
                updated_at,
            })),
            None => Ok(None),
        }
    }

    fn put_document(
        &mut self,
        collection: &str,
        key: &str,
        body: &serde_json::Value,
    ) -> StorageResult<WriteOutcome> {
        let now = Utc::now().to_rfc3339();
        let body = serde_json::to_string(body)?;

        let updated = self.conn.execute(
            "UPDATE documents SET body = ?1, updated_at = ?2 WHERE collection = ?3 AND key = ?4",
            params![body, now, collection, key],
        )?;

        if updated > 0 {
            return Ok(WriteOutcome::Updated);
        }

        self.conn.execute(
            "INSERT INTO documents (collection, key, body, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            params![collection, key, body, now],
        )?;

        Ok(WriteOutcome::Inserted)
    }

    fn delete_document(&mut self, collection: &str, key: &str) -> StorageResult<bool> {
        let deleted = self.conn.execute(
            "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
            params![collection, key],
        )?;
        Ok(deleted > 0)
    }

    fn count_documents(&self, collection: &str) -> StorageResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            params![collection],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status,
                 categories_processed, products_processed FROM runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        categories_processed: u64,
        products_processed: u64,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, categories_processed = ?3,
             products_processed = ?4 WHERE id = ?5",
            params![
                status.to_db_string(),
                now,
                categories_processed as i64,
                products_processed as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, started_at, finished_at, config_hash, status,
             categories_processed, products_processed FROM runs ORDER BY id DESC LIMIT ?1",
        )?;

        let runs = stmt
            .query_map(params![limit as i64], run_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(runs)
    }
}
