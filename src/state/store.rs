//! Crawl state persistence
//!
//! A [`StateStore`] keeps exactly one snapshot of [`CrawlState`]. The
//! production setup is a [`FallbackStateStore`] with the SQLite document
//! store as primary and a JSON file as secondary.

use crate::state::CrawlState;
use crate::storage::{lock_storage, Storage, StorageError};
use chrono::Utc;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::{debug, warn};

/// Collection holding crawl state snapshots
pub const STATE_COLLECTION: &str = "crawl_state";

/// Errors raised by a state store
#[derive(Debug, Error)]
pub enum StateStoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Snapshot is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Primary store failed ({primary}); secondary store failed ({secondary})")]
    AllStoresFailed { primary: String, secondary: String },
}

pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// Single-snapshot storage for crawl progress
pub trait StateStore: Send + Sync {
    /// Overwrites the snapshot, stamping `last_updated` on the given state
    fn save(&self, state: &mut CrawlState) -> StateStoreResult<()>;

    /// Loads the snapshot if one exists
    fn load(&self) -> StateStoreResult<Option<CrawlState>>;

    /// Removes the snapshot
    fn clear(&self) -> StateStoreResult<()>;
}

/// Stores the snapshot as a document keyed by session id
pub struct DocumentStateStore<S> {
    storage: Arc<Mutex<S>>,
    session_id: String,
}

impl<S: Storage> DocumentStateStore<S> {
    pub fn new(storage: Arc<Mutex<S>>, session_id: impl Into<String>) -> Self {
        Self {
            storage,
            session_id: session_id.into(),
        }
    }
}

impl<S: Storage + Send> StateStore for DocumentStateStore<S> {
    fn save(&self, state: &mut CrawlState) -> StateStoreResult<()> {
        state.last_updated = Some(Utc::now());
        let body = serde_json::to_value(&*state)?;
        lock_storage(&self.storage)?.put_document(STATE_COLLECTION, &self.session_id, &body)?;
        Ok(())
    }

    fn load(&self) -> StateStoreResult<Option<CrawlState>> {
        let doc = lock_storage(&self.storage)?.get_document(STATE_COLLECTION, &self.session_id)?;
        match doc {
            Some(doc) => Ok(Some(serde_json::from_value(doc.body)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> StateStoreResult<()> {
        lock_storage(&self.storage)?.delete_document(STATE_COLLECTION, &self.session_id)?;
        Ok(())
    }
}

/// Stores the snapshot as a JSON file
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write leaves the previous snapshot intact.
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl StateStore for FileStateStore {
    fn save(&self, state: &mut CrawlState) -> StateStoreResult<()> {
        state.last_updated = Some(Utc::now());
        let json = serde_json::to_string_pretty(&*state)?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp = self.temp_path();
        fs::write(&temp, json)?;
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn load(&self) -> StateStoreResult<Option<CrawlState>> {
        match fs::read_to_string(&self.path) {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> StateStoreResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Keeps the snapshot in memory only
#[derive(Default)]
pub struct MemoryStateStore {
    snapshot: Mutex<Option<CrawlState>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: CrawlState) -> Self {
        Self {
            snapshot: Mutex::new(Some(state)),
        }
    }

    fn slot(&self) -> StateStoreResult<std::sync::MutexGuard<'_, Option<CrawlState>>> {
        self.snapshot
            .lock()
            .map_err(|_| StorageError::Database("state lock poisoned".to_string()).into())
    }
}

impl StateStore for MemoryStateStore {
    fn save(&self, state: &mut CrawlState) -> StateStoreResult<()> {
        state.last_updated = Some(Utc::now());
        *self.slot()? = Some(state.clone());
        Ok(())
    }

    fn load(&self) -> StateStoreResult<Option<CrawlState>> {
        Ok(self.slot()?.clone())
    }

    fn clear(&self) -> StateStoreResult<()> {
        *self.slot()? = None;
        Ok(())
    }
}

/// Saves to a primary store and falls back to a secondary one
pub struct FallbackStateStore {
    primary: Box<dyn StateStore>,
    secondary: Box<dyn StateStore>,
}

impl FallbackStateStore {
    pub fn new(primary: Box<dyn StateStore>, secondary: Box<dyn StateStore>) -> Self {
        Self { primary, secondary }
    }
}

impl StateStore for FallbackStateStore {
    fn save(&self, state: &mut CrawlState) -> StateStoreResult<()> {
        match self.primary.save(state) {
            Ok(()) => {
                debug!("Saved crawl state to primary store");
                Ok(())
            }
            Err(primary) => {
                warn!("Primary state store failed, using fallback: {}", primary);
                self.secondary
                    .save(state)
                    .map_err(|secondary| StateStoreError::AllStoresFailed {
                        primary: primary.to_string(),
                        secondary: secondary.to_string(),
                    })
            }
        }
    }

    /// Returns whichever snapshot was saved most recently
    fn load(&self) -> StateStoreResult<Option<CrawlState>> {
        let primary = self.primary.load().unwrap_or_else(|e| {
            warn!("Could not load state from primary store: {}", e);
            None
        });
        let secondary = self.secondary.load().unwrap_or_else(|e| {
            warn!("Could not load state from fallback store: {}", e);
            None
        });

        Ok(match (primary, secondary) {
            (Some(a), Some(b)) => {
                if b.last_updated > a.last_updated {
                    Some(b)
                } else {
                    Some(a)
                }
            }
            (a, b) => a.or(b),
        })
    }

    fn clear(&self) -> StateStoreResult<()> {
        let primary = self.primary.clear();
        let secondary = self.secondary.clear();
        primary?;
        secondary
    }
}
