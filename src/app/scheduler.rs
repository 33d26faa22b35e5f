//! Scheduler driving queued items through fetch, verify, and cache
//!
//! One guarded pass over the queue at a time: `run()` holds an atomic
//! in-progress flag, so a second concurrent call returns immediately instead
//! of racing the first over the same order list and capacity accounting.
//! Within a pass items are attempted strictly in FIFO order, each item's
//! status re-read when visited so a pause or cancel issued mid-pass lands
//! before its download starts. Every transition persists, leaving the queue
//! resumable after an interruption at any point.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::app::cache::ContentCache;
use crate::app::eviction::enforce_cap;
use crate::app::fetcher::{self, Fetcher};
use crate::app::models::AssetDescriptor;
use crate::app::queue::{DownloadQueue, QueueItem, QueueStatus};

/// Clears the in-progress flag when a pass exits, error or not
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Coordinates the queue, fetcher, and cache
///
/// Owns none of the underlying state: the queue owns its items, the blob
/// store owns cached bytes. The scheduler is the command surface embedding
/// callers and the CLI talk to.
pub struct Scheduler {
    queue: Arc<DownloadQueue>,
    cache: ContentCache,
    fetcher: Arc<dyn Fetcher>,
    running: AtomicBool,
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("running", &self.running.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Scheduler {
    /// Create a scheduler over the given components
    pub fn new(queue: Arc<DownloadQueue>, cache: ContentCache, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            queue,
            cache,
            fetcher,
            running: AtomicBool::new(false),
        }
    }

    /// Add manifest descriptors to the queue; returns how many were new
    pub async fn enqueue(&self, descriptors: Vec<AssetDescriptor>) -> usize {
        self.queue.enqueue(descriptors).await
    }

    /// Pause a queued item
    pub async fn pause(&self, id: &str) -> bool {
        self.queue.pause(id).await
    }

    /// Re-queue a paused, failed, or canceled item and trigger a pass
    pub async fn resume(&self, id: &str) -> bool {
        let resumed = self.queue.resume(id).await;
        if resumed {
            self.run().await;
        }
        resumed
    }

    /// Cancel an item, best-effort for in-flight downloads
    pub async fn cancel(&self, id: &str) -> bool {
        self.queue.cancel(id).await
    }

    /// Remove an item from the queue entirely
    pub async fn remove(&self, id: &str) {
        self.queue.remove(id).await
    }

    /// Items in FIFO order
    pub async fn get_queue(&self) -> Vec<QueueItem> {
        self.queue.get_queue().await
    }

    /// Configured cache capacity in bytes
    pub async fn cap_bytes(&self) -> u64 {
        self.queue.cap_bytes().await
    }

    /// Update the capacity and enforce it immediately
    pub async fn set_cap_bytes(&self, value: u64) {
        self.queue.set_cap_bytes(value).await;
        self.enforce_cap().await;
    }

    /// Evict completed items down to the cap; returns how many were evicted
    pub async fn enforce_cap(&self) -> usize {
        enforce_cap(&self.queue, &self.cache).await
    }

    /// Check whether an asset path currently has cached bytes
    ///
    /// An unreachable blob store reads as "not cached".
    pub async fn is_cached(&self, path: &str) -> bool {
        match self.cache.has(path).await {
            Ok(present) => present,
            Err(e) => {
                warn!("Cache probe failed for {}: {}", path, e);
                false
            }
        }
    }

    /// Total bytes currently held by the blob store
    pub async fn cache_usage(&self) -> u64 {
        match self.cache.usage().await {
            Ok(usage) => usage,
            Err(e) => {
                warn!("Cache usage accounting failed: {}", e);
                0
            }
        }
    }

    /// Drop all cached content and revert completed items to idle
    ///
    /// If the blob store cannot be cleared the queue is left untouched, so
    /// item status never claims less content than the cache holds.
    pub async fn clear_all(&self) {
        if let Err(e) = self.cache.clear().await {
            warn!("Failed to clear cache: {}", e);
            return;
        }

        let done_ids: Vec<String> = self
            .queue
            .done_items()
            .await
            .into_iter()
            .map(|item| item.id)
            .collect();
        if !done_ids.is_empty() {
            let reset = self.queue.reset_to_idle(&done_ids).await;
            info!("Cleared cache, reverted {} items to idle", reset);
        }
    }

    /// Execute one pass over the queue
    ///
    /// Reentrancy-guarded: while a pass is in progress, further calls return
    /// immediately rather than queueing a second pass. Capacity is enforced
    /// before new work starts and again after the pass, so a completed run
    /// leaves the cache within the cap. Fetch and verification failures are
    /// recorded on the item and never abort the pass.
    pub async fn run(&self) {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Run already in progress, skipping");
            return;
        }
        let _guard = RunGuard {
            flag: &self.running,
        };

        self.enforce_cap().await;

        for id in self.queue.order_snapshot().await {
            // Re-read: a pause or cancel may have landed since the pass began
            let Some(item) = self.queue.get_item(&id).await else {
                continue;
            };
            if item.status != QueueStatus::Queued {
                continue;
            }
            self.process_item(&item).await;
        }

        self.enforce_cap().await;
    }

    /// Download one queued item: fetch, verify, cache, record the outcome
    async fn process_item(&self, item: &QueueItem) {
        if !self.queue.begin_download(&item.id).await {
            return;
        }

        match self.download(item).await {
            Ok(()) => {
                // The cancel race resolves here: a canceled item is not
                // overwritten even though its bytes arrived.
                if self.queue.complete_download(&item.id).await {
                    info!("Downloaded {} ({} bytes)", item.id, item.bytes);
                } else {
                    debug!("Discarding completion for {}, no longer downloading", item.id);
                }
            }
            Err(message) => {
                if self.queue.fail_download(&item.id, &message).await {
                    warn!("Download failed for {}: {}", item.id, message);
                }
            }
        }
    }

    /// Fetch and verify one item, writing verified bytes to the cache
    ///
    /// Returns the failure message to record on the item. Bytes that fail
    /// verification are dropped without touching the cache.
    async fn download(&self, item: &QueueItem) -> Result<(), String> {
        let bytes = self
            .fetcher
            .fetch(&item.path)
            .await
            .map_err(|e| e.to_string())?;

        fetcher::verify(&item.digest, &bytes).map_err(|e| e.to_string())?;

        self.cache
            .put(&item.path, &bytes)
            .await
            .map_err(|e| e.to_string())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tempfile::TempDir;
    use tokio::sync::Notify;

    use super::*;
    use crate::app::cache::FsBlobStore;
    use crate::app::hash::{ExpectedDigest, Sha256Hash};
    use crate::app::store::MemoryStore;
    use crate::errors::{FetchError, FetchResult};

    /// Deterministic fetcher: canned bytes or a canned HTTP status per path
    #[derive(Default)]
    struct StaticFetcher {
        responses: HashMap<String, Result<Vec<u8>, u16>>,
    }

    impl StaticFetcher {
        fn with(mut self, path: &str, response: Result<Vec<u8>, u16>) -> Self {
            self.responses.insert(path.to_string(), response);
            self
        }
    }

    #[async_trait]
    impl Fetcher for StaticFetcher {
        async fn fetch(&self, path: &str) -> FetchResult<Vec<u8>> {
            match self.responses.get(path) {
                Some(Ok(bytes)) => Ok(bytes.clone()),
                Some(Err(status)) => Err(FetchError::Status { status: *status }),
                None => Err(FetchError::Status { status: 404 }),
            }
        }
    }

    /// Fetcher that parks until released, to hold a pass in flight
    struct BlockingFetcher {
        release: Arc<Notify>,
    }

    #[async_trait]
    impl Fetcher for BlockingFetcher {
        async fn fetch(&self, _path: &str) -> FetchResult<Vec<u8>> {
            self.release.notified().await;
            Ok(b"released".to_vec())
        }
    }

    fn descriptor(id: &str, bytes: u64, digest: ExpectedDigest) -> AssetDescriptor {
        AssetDescriptor::new(id, "text", format!("data/{}.json", id), bytes, digest)
    }

    async fn scheduler_with(temp_dir: &TempDir, fetcher: Arc<dyn Fetcher>) -> Scheduler {
        let queue = Arc::new(DownloadQueue::open(Arc::new(MemoryStore::new())).await);
        let store = FsBlobStore::open(temp_dir.path(), "test-cache-v1")
            .await
            .unwrap();
        Scheduler::new(queue, ContentCache::new(Arc::new(store)), fetcher)
    }

    #[tokio::test]
    async fn test_successful_run_reaches_done() {
        let temp_dir = TempDir::new().unwrap();
        let payload = b"payload".to_vec();
        let digest = ExpectedDigest::Sha256(Sha256Hash::of(&payload));
        let fetcher = StaticFetcher::default().with("data/a.json", Ok(payload));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![descriptor("a", 7, digest)])
            .await;
        scheduler.run().await;

        let queue = scheduler.get_queue().await;
        assert_eq!(queue[0].status, QueueStatus::Done);
        assert_eq!(queue[0].progress, 1.0);
        assert!(queue[0].error.is_none());
        assert!(scheduler.is_cached("data/a.json").await);
    }

    #[tokio::test]
    async fn test_network_failure_records_error_and_continues() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default()
            .with("data/a.json", Err(503))
            .with("data/b.json", Ok(b"ok".to_vec()));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![
                descriptor("a", 1, ExpectedDigest::Unverified),
                descriptor("b", 2, ExpectedDigest::Unverified),
            ])
            .await;
        scheduler.run().await;

        let queue = scheduler.get_queue().await;
        assert_eq!(queue[0].status, QueueStatus::Error);
        assert_eq!(queue[0].error.as_deref(), Some("HTTP 503"));
        assert!(!scheduler.is_cached("data/a.json").await);

        // The failure did not abort the pass
        assert_eq!(queue[1].status, QueueStatus::Done);
    }

    /// A digest mismatch leaves status=error and nothing in the cache
    #[tokio::test]
    async fn test_checksum_mismatch_keeps_cache_clean() {
        let temp_dir = TempDir::new().unwrap();
        let wrong_digest = ExpectedDigest::Sha256(Sha256Hash::of(b"expected content"));
        let fetcher =
            StaticFetcher::default().with("data/a.json", Ok(b"actual content".to_vec()));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![descriptor("a", 14, wrong_digest)])
            .await;
        scheduler.run().await;

        let item = &scheduler.get_queue().await[0];
        assert_eq!(item.status, QueueStatus::Error);
        assert!(item.error.as_deref().unwrap().contains("Checksum mismatch"));
        assert!(!scheduler.is_cached("data/a.json").await);
    }

    #[tokio::test]
    async fn test_paused_items_are_skipped_until_resumed() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default().with("data/a.json", Ok(b"ok".to_vec()));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![descriptor("a", 2, ExpectedDigest::Unverified)])
            .await;
        scheduler.pause("a").await;
        scheduler.run().await;

        assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Paused);

        // Resume triggers its own pass
        scheduler.resume("a").await;
        assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Done);
    }

    #[tokio::test]
    async fn test_canceled_items_are_skipped() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default().with("data/a.json", Ok(b"ok".to_vec()));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![descriptor("a", 2, ExpectedDigest::Unverified)])
            .await;
        scheduler.cancel("a").await;
        scheduler.run().await;

        assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Canceled);
        assert!(!scheduler.is_cached("data/a.json").await);
    }

    /// A second run() while one is in flight returns without a second pass
    #[tokio::test]
    async fn test_run_is_reentrancy_guarded() {
        let temp_dir = TempDir::new().unwrap();
        let release = Arc::new(Notify::new());
        let fetcher = BlockingFetcher {
            release: Arc::clone(&release),
        };
        let scheduler = Arc::new(scheduler_with(&temp_dir, Arc::new(fetcher)).await);

        scheduler
            .enqueue(vec![descriptor("a", 8, ExpectedDigest::Unverified)])
            .await;

        let first = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };

        // Wait until the first pass has the item in flight
        loop {
            let status = scheduler.get_queue().await[0].status;
            if status == QueueStatus::Downloading {
                break;
            }
            tokio::task::yield_now().await;
        }

        // The guarded second call returns immediately, leaving the item
        // untouched by any second pass
        scheduler.run().await;
        assert_eq!(
            scheduler.get_queue().await[0].status,
            QueueStatus::Downloading
        );

        release.notify_one();
        first.await.unwrap();
        assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Done);
    }

    /// A cancel during the fetch wins over the completed transfer
    #[tokio::test]
    async fn test_cancel_during_flight_defers_completion() {
        let temp_dir = TempDir::new().unwrap();
        let release = Arc::new(Notify::new());
        let fetcher = BlockingFetcher {
            release: Arc::clone(&release),
        };
        let scheduler = Arc::new(scheduler_with(&temp_dir, Arc::new(fetcher)).await);

        scheduler
            .enqueue(vec![descriptor("a", 8, ExpectedDigest::Unverified)])
            .await;

        let pass = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.run().await })
        };
        loop {
            if scheduler.get_queue().await[0].status == QueueStatus::Downloading {
                break;
            }
            tokio::task::yield_now().await;
        }

        scheduler.cancel("a").await;
        release.notify_one();
        pass.await.unwrap();

        let item = &scheduler.get_queue().await[0];
        assert_eq!(item.status, QueueStatus::Canceled);
        assert_ne!(item.progress, 1.0);
    }

    /// A completed run leaves done-bytes at or under the cap
    #[tokio::test]
    async fn test_run_enforces_cap_after_processing() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default()
            .with("data/a.json", Ok(vec![0u8; 10]))
            .with("data/b.json", Ok(vec![0u8; 5]))
            .with("data/c.json", Ok(vec![0u8; 2]));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![
                descriptor("a", 10, ExpectedDigest::Unverified),
                descriptor("b", 5, ExpectedDigest::Unverified),
                descriptor("c", 2, ExpectedDigest::Unverified),
            ])
            .await;
        scheduler.set_cap_bytes(12).await;
        scheduler.run().await;

        let queue = scheduler.get_queue().await;
        let done_bytes: u64 = queue
            .iter()
            .filter(|item| item.status == QueueStatus::Done)
            .map(|item| item.bytes)
            .sum();
        assert!(done_bytes <= 12);

        // All three completed in FIFO order, so "a" carried the oldest
        // completion stamp and was evicted first
        assert_eq!(queue[0].status, QueueStatus::Idle);
        assert!(!scheduler.is_cached("data/a.json").await);
        assert_eq!(queue[1].status, QueueStatus::Done);
        assert_eq!(queue[2].status, QueueStatus::Done);
    }

    #[tokio::test]
    async fn test_clear_all_resets_done_items() {
        let temp_dir = TempDir::new().unwrap();
        let fetcher = StaticFetcher::default().with("data/a.json", Ok(b"ok".to_vec()));
        let scheduler = scheduler_with(&temp_dir, Arc::new(fetcher)).await;

        scheduler
            .enqueue(vec![descriptor("a", 2, ExpectedDigest::Unverified)])
            .await;
        scheduler.run().await;
        assert!(scheduler.is_cached("data/a.json").await);

        scheduler.clear_all().await;
        assert!(!scheduler.is_cached("data/a.json").await);
        let item = &scheduler.get_queue().await[0];
        assert_eq!(item.status, QueueStatus::Idle);
        assert_eq!(item.progress, 0.0);
        assert_eq!(scheduler.cache_usage().await, 0);
    }
}
