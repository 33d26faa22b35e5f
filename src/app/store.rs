//! Queue state persistence
//!
//! The queue persists its full state after every mutation. Persistence is
//! abstracted behind the narrow [`StateStore`] trait so the same queue logic
//! runs against a JSON file on disk, an in-memory slot for tests, or any
//! embedded medium an embedding application provides.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::app::queue::QueueItem;
use crate::constants::cache::TEMP_FILE_SUFFIX;
use crate::errors::{StoreError, StoreResult};

/// Wire format of the persisted queue state
///
/// Round-trippable: loading a saved record reproduces the queue listing and
/// the capacity setting exactly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedQueue {
    /// All queue items, keyed implicitly by their `id`
    pub items: Vec<QueueItem>,
    /// FIFO processing order over item ids
    pub order: Vec<String>,
    /// Configured cache capacity in bytes
    pub cap_bytes: u64,
}

/// Narrow persistence seam for queue state
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Load the persisted state, if any
    async fn load(&self) -> StoreResult<Option<PersistedQueue>>;

    /// Replace the persisted state
    async fn save(&self, state: &PersistedQueue) -> StoreResult<()>;
}

/// Queue state persisted as a JSON file
///
/// Writes are atomic: the payload lands in a temp file next to the target and
/// is renamed over it, so a crash mid-write never leaves a torn state file.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    /// Create a store backed by the given file path
    ///
    /// The file does not need to exist yet; parent directories are created on
    /// first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the backing file
    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

#[async_trait]
impl StateStore for JsonFileStore {
    async fn load(&self) -> StoreResult<Option<PersistedQueue>> {
        match fs::read(&self.path).await {
            Ok(raw) => {
                let state: PersistedQueue = serde_json::from_slice(&raw)?;
                debug!(
                    "Loaded queue state from {} ({} items)",
                    self.path.display(),
                    state.items.len()
                );
                Ok(Some(state))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn save(&self, state: &PersistedQueue) -> StoreResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let payload = serde_json::to_vec_pretty(state)?;

        // Write to temporary file first, then rename into place
        let temp_path = self.path.with_extension(format!(
            "{}{}",
            self.path.extension().unwrap_or_default().to_string_lossy(),
            TEMP_FILE_SUFFIX
        ));
        fs::write(&temp_path, &payload).await?;
        if let Err(e) = fs::rename(&temp_path, &self.path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(StoreError::Io(e));
        }

        debug!(
            "Persisted queue state to {} ({} items)",
            self.path.display(),
            state.items.len()
        );
        Ok(())
    }
}

/// Ephemeral in-memory store
///
/// Used by tests and by embedders that want a queue without durability, the
/// same degradation mode the queue falls into when disk persistence fails.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Mutex<Option<PersistedQueue>>,
}

impl MemoryStore {
    /// Create an empty in-memory store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn load(&self) -> StoreResult<Option<PersistedQueue>> {
        Ok(self.slot.lock().await.clone())
    }

    async fn save(&self, state: &PersistedQueue) -> StoreResult<()> {
        *self.slot.lock().await = Some(state.clone());
        Ok(())
    }
}

/// Log a persistence failure without surfacing it
///
/// Persistence failures must not throw out of the queue's public API; the
/// queue continues operating in memory.
pub(crate) fn log_persistence_failure(err: &StoreError) {
    warn!("Failed to persist queue state, continuing in memory: {}", err);
}
