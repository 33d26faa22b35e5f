//! Persistent FIFO download queue
//!
//! This module owns the queue of downloadable assets: one item per distinct
//! asset id, processed in enqueue order. The queue is the single writer of
//! its state; the scheduler and the CLI go through its methods. Every
//! mutation persists the full state through the injected [`StateStore`]
//! before returning, so an interruption at any point leaves a consistent,
//! resumable queue on the next start.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::app::hash::ExpectedDigest;
use crate::app::models::AssetDescriptor;
use crate::app::store::{log_persistence_failure, PersistedQueue, StateStore};
use crate::constants::cache::DEFAULT_CAP_BYTES;

/// Status of a queue item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    /// Not scheduled; previously downloaded content may have been evicted
    Idle,
    /// Waiting for the next scheduler pass
    Queued,
    /// Fetch in flight
    Downloading,
    /// Held back until resumed
    Paused,
    /// Downloaded, verified, and cached
    Done,
    /// Fetch or verification failed; retryable via resume
    Error,
    /// Canceled by the caller; best-effort while a fetch is in flight
    Canceled,
}

impl QueueStatus {
    /// Check whether a resume call re-queues an item in this status
    pub fn is_resumable(&self) -> bool {
        matches!(
            self,
            QueueStatus::Paused | QueueStatus::Error | QueueStatus::Canceled
        )
    }
}

/// One asset in the download queue
///
/// Extends the manifest descriptor with scheduling state. `progress` is 1.0
/// exactly when the item is `Done`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueItem {
    /// Asset id, unique within the queue
    pub id: String,
    /// Asset category from the manifest
    #[serde(rename = "type")]
    pub kind: String,
    /// Fetch path and cache key
    pub path: String,
    /// Published size in bytes
    pub bytes: u64,
    /// Expected content digest
    pub digest: ExpectedDigest,
    /// Current scheduling status
    pub status: QueueStatus,
    /// Download progress in 0..=1
    pub progress: f32,
    /// When the item was first enqueued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Last status transition; eviction orders completed items by this
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    /// Failure message, present only in `Error` status
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl QueueItem {
    /// Create a freshly queued item from a manifest descriptor
    fn from_descriptor(descriptor: AssetDescriptor, now: DateTime<Utc>) -> Self {
        Self {
            id: descriptor.id,
            kind: descriptor.kind,
            path: descriptor.path,
            bytes: descriptor.bytes,
            digest: descriptor.digest,
            status: QueueStatus::Queued,
            progress: 0.0,
            started_at: Some(now),
            updated_at: Some(now),
            error: None,
        }
    }

    /// Rebuild the manifest descriptor for this item
    pub fn descriptor(&self) -> AssetDescriptor {
        AssetDescriptor {
            id: self.id.clone(),
            kind: self.kind.clone(),
            path: self.path.clone(),
            bytes: self.bytes,
            digest: self.digest,
        }
    }
}

/// In-memory queue state: items, FIFO order, and the capacity setting
///
/// `order` is always a duplicate-free permutation of the item ids.
#[derive(Debug)]
struct QueueState {
    items: HashMap<String, QueueItem>,
    order: Vec<String>,
    cap_bytes: u64,
}

impl QueueState {
    fn empty(cap_bytes: u64) -> Self {
        Self {
            items: HashMap::new(),
            order: Vec::new(),
            cap_bytes,
        }
    }

    /// Rebuild state from a persisted record, normalizing the order list
    ///
    /// Unknown ids are dropped and known ids missing from the order are
    /// appended, so the permutation invariant holds even if the persisted
    /// record was produced by an older build.
    fn from_persisted(persisted: PersistedQueue) -> Self {
        let items: HashMap<String, QueueItem> = persisted
            .items
            .into_iter()
            .map(|item| (item.id.clone(), item))
            .collect();

        let mut seen = HashSet::new();
        let mut order: Vec<String> = persisted
            .order
            .into_iter()
            .filter(|id| items.contains_key(id) && seen.insert(id.clone()))
            .collect();
        for id in items.keys() {
            if !seen.contains(id) {
                order.push(id.clone());
            }
        }

        Self {
            items,
            order,
            cap_bytes: persisted.cap_bytes,
        }
    }

    /// Snapshot the state into its wire format, items in queue order
    fn to_persisted(&self) -> PersistedQueue {
        PersistedQueue {
            items: self
                .order
                .iter()
                .filter_map(|id| self.items.get(id))
                .cloned()
                .collect(),
            order: self.order.clone(),
            cap_bytes: self.cap_bytes,
        }
    }

    /// Items in FIFO order, skipping any id whose item is missing
    fn listing(&self) -> Vec<QueueItem> {
        self.order
            .iter()
            .filter_map(|id| self.items.get(id))
            .cloned()
            .collect()
    }
}

/// Persistent FIFO queue of asset downloads
///
/// All methods take `&self`; state lives behind an async mutex so the queue
/// can be shared between the scheduler and command handlers. Persistence
/// failures are logged and never surfaced: the queue degrades to operating
/// in memory.
pub struct DownloadQueue {
    state: Mutex<QueueState>,
    store: Arc<dyn StateStore>,
}

impl std::fmt::Debug for DownloadQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadQueue").finish_non_exhaustive()
    }
}

impl DownloadQueue {
    /// Open the queue, rehydrating any persisted state
    ///
    /// Missing state starts an empty queue; corrupted state is logged and
    /// discarded rather than aborting startup.
    pub async fn open(store: Arc<dyn StateStore>) -> Self {
        Self::open_with_cap(store, DEFAULT_CAP_BYTES).await
    }

    /// Open the queue with a configured capacity for fresh state
    ///
    /// The capacity applies only when nothing was persisted yet; a
    /// rehydrated queue keeps its persisted capacity.
    pub async fn open_with_cap(store: Arc<dyn StateStore>, default_cap_bytes: u64) -> Self {
        let state = match store.load().await {
            Ok(Some(persisted)) => QueueState::from_persisted(persisted),
            Ok(None) => QueueState::empty(default_cap_bytes),
            Err(e) => {
                warn!("Failed to load queue state, starting empty: {}", e);
                QueueState::empty(default_cap_bytes)
            }
        };

        debug!(
            "Opened download queue with {} items, cap {} bytes",
            state.items.len(),
            state.cap_bytes
        );

        Self {
            state: Mutex::new(state),
            store,
        }
    }

    /// Add manifest descriptors to the queue
    ///
    /// Descriptors whose id is already present are left untouched, so
    /// enqueueing the same manifest twice is a no-op. Returns the number of
    /// newly queued items.
    pub async fn enqueue(&self, descriptors: Vec<AssetDescriptor>) -> usize {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut added = 0;

        for descriptor in descriptors {
            if state.items.contains_key(&descriptor.id) {
                debug!("Skipping duplicate enqueue: {}", descriptor.id);
                continue;
            }
            let item = QueueItem::from_descriptor(descriptor, now);
            state.order.push(item.id.clone());
            state.items.insert(item.id.clone(), item);
            added += 1;
        }

        if added > 0 {
            debug!("Enqueued {} new items", added);
        }
        self.persist(&state).await;
        added
    }

    /// Remove an item and its order entry unconditionally
    ///
    /// Cached bytes for the item, if any, are not touched. No error if the
    /// id is absent.
    pub async fn remove(&self, id: &str) {
        let mut state = self.state.lock().await;
        state.items.remove(id);
        state.order.retain(|entry| entry != id);
        self.persist(&state).await;
    }

    /// Pause a queued item
    ///
    /// Only `Queued` items can be paused; anything else is a no-op. Returns
    /// whether the item was paused.
    pub async fn pause(&self, id: &str) -> bool {
        self.transition(id, |item| {
            if item.status != QueueStatus::Queued {
                return false;
            }
            item.status = QueueStatus::Paused;
            true
        })
        .await
    }

    /// Re-queue a paused, failed, or canceled item
    ///
    /// Clears any recorded error. Returns whether the item was re-queued;
    /// the caller is expected to trigger a scheduler pass when it was.
    pub async fn resume(&self, id: &str) -> bool {
        self.transition(id, |item| {
            if !item.status.is_resumable() {
                return false;
            }
            item.status = QueueStatus::Queued;
            item.error = None;
            true
        })
        .await
    }

    /// Cancel an item
    ///
    /// Best-effort: bytes already in flight are not interrupted, but the
    /// scheduler will not overwrite the canceled status when the fetch
    /// lands. Completed items stay `Done`; eviction is the only way their
    /// content leaves the cache.
    pub async fn cancel(&self, id: &str) -> bool {
        self.transition(id, |item| {
            if matches!(item.status, QueueStatus::Done | QueueStatus::Canceled) {
                return false;
            }
            item.status = QueueStatus::Canceled;
            true
        })
        .await
    }

    /// Mark a queued item as downloading
    ///
    /// Stamps `started_at` if the item has never been attempted. Returns
    /// false if the item is missing or not `Queued` (paused or canceled
    /// since the pass began).
    pub async fn begin_download(&self, id: &str) -> bool {
        self.transition(id, |item| {
            if item.status != QueueStatus::Queued {
                return false;
            }
            item.status = QueueStatus::Downloading;
            item.progress = 0.0;
            if item.started_at.is_none() {
                item.started_at = item.updated_at;
            }
            true
        })
        .await
    }

    /// Mark a downloading item as done
    ///
    /// Refuses unless the item is still `Downloading`: a cancel issued while
    /// the fetch was in flight wins over the completed transfer.
    pub async fn complete_download(&self, id: &str) -> bool {
        self.transition(id, |item| {
            if item.status != QueueStatus::Downloading {
                return false;
            }
            item.status = QueueStatus::Done;
            item.progress = 1.0;
            item.error = None;
            true
        })
        .await
    }

    /// Record a fetch or verification failure on a downloading item
    ///
    /// Same race rule as [`complete_download`](Self::complete_download): a
    /// concurrent cancel is not overwritten.
    pub async fn fail_download(&self, id: &str, message: &str) -> bool {
        self.transition(id, |item| {
            if item.status != QueueStatus::Downloading {
                return false;
            }
            item.status = QueueStatus::Error;
            item.error = Some(message.to_string());
            true
        })
        .await
    }

    /// Reset evicted items to idle, one persist for the whole batch
    ///
    /// Each item drops to `Idle` with progress 0 and no error, ready to be
    /// re-queued later. Returns the number of items reset.
    pub async fn reset_to_idle(&self, ids: &[String]) -> usize {
        let mut state = self.state.lock().await;
        let now = Utc::now();
        let mut reset = 0;

        for id in ids {
            if let Some(item) = state.items.get_mut(id) {
                item.status = QueueStatus::Idle;
                item.progress = 0.0;
                item.error = None;
                item.updated_at = Some(now);
                reset += 1;
            }
        }

        if reset > 0 {
            self.persist(&state).await;
        }
        reset
    }

    /// Items in FIFO order
    pub async fn get_queue(&self) -> Vec<QueueItem> {
        self.state.lock().await.listing()
    }

    /// Look up a single item
    pub async fn get_item(&self, id: &str) -> Option<QueueItem> {
        self.state.lock().await.items.get(id).cloned()
    }

    /// Snapshot of the processing order
    pub async fn order_snapshot(&self) -> Vec<String> {
        self.state.lock().await.order.clone()
    }

    /// Completed items, for eviction accounting
    pub async fn done_items(&self) -> Vec<QueueItem> {
        self.state
            .lock()
            .await
            .listing()
            .into_iter()
            .filter(|item| item.status == QueueStatus::Done)
            .collect()
    }

    /// Configured cache capacity in bytes
    pub async fn cap_bytes(&self) -> u64 {
        self.state.lock().await.cap_bytes
    }

    /// Update the cache capacity
    ///
    /// Only records the setting; the caller is responsible for triggering
    /// eviction enforcement afterwards.
    pub async fn set_cap_bytes(&self, value: u64) {
        let mut state = self.state.lock().await;
        state.cap_bytes = value;
        self.persist(&state).await;
    }

    /// Apply a mutation to one item, stamping `updated_at` and persisting
    ///
    /// The closure returns whether it changed the item. When it declines,
    /// the stamp is rolled back and nothing is persisted.
    async fn transition<F>(&self, id: &str, mutate: F) -> bool
    where
        F: FnOnce(&mut QueueItem) -> bool,
    {
        let mut state = self.state.lock().await;
        let changed = match state.items.get_mut(id) {
            Some(item) => {
                let previous = item.updated_at;
                item.updated_at = Some(Utc::now());
                let changed = mutate(item);
                if !changed {
                    item.updated_at = previous;
                }
                changed
            }
            None => false,
        };

        if changed {
            self.persist(&state).await;
        }
        changed
    }

    /// Persist the current state, logging failures instead of raising them
    async fn persist(&self, state: &QueueState) {
        if let Err(e) = self.store.save(&state.to_persisted()).await {
            log_persistence_failure(&e);
        }
    }
}
