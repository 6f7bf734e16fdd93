//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{Document, RunRecord, RunStatus, WriteOutcome};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The crawler treats its database as a key-value document store: every
/// document lives in a named collection under a unique key. Run bookkeeping
/// sits next to it so `--stats` can show crawl history.
pub trait Storage {
    // ===== Documents =====

    /// Gets a document by collection and key
    fn get_document(&self, collection: &str, key: &str) -> StorageResult<Option<Document>>;

    /// Inserts the document or replaces the body of the existing one
    ///
    /// The creation timestamp of an existing document is preserved.
    fn put_document(
        &mut self,
        collection: &str,
        key: &str,
        body: &serde_json::Value,
    ) -> StorageResult<WriteOutcome>;

    /// Deletes a document, returning whether it existed
    fn delete_document(&mut self, collection: &str, key: &str) -> StorageResult<bool>;

    /// Counts the documents of a collection
    fn count_documents(&self, collection: &str) -> StorageResult<u64>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Records the final status and counters of a run
    fn finish_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        categories_processed: u64,
        products_processed: u64,
    ) -> StorageResult<()>;

    /// Gets the most recent runs, newest first
    fn recent_runs(&self, limit: usize) -> StorageResult<Vec<RunRecord>>;
}
