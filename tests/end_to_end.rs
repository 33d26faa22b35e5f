//! End-to-end tests over the full component stack
//!
//! These tests drive the scheduler against real filesystem-backed stores and
//! a deterministic in-memory fetcher: enqueue from a manifest document, run
//! the pass, and observe queue state, cache contents, and capacity
//! enforcement together.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use tempfile::TempDir;

use bundle_fetcher::app::{
    AssetDescriptor, ContentCache, DownloadQueue, ExpectedDigest, Fetcher, FsBlobStore,
    JsonFileStore, Manifest, QueueStatus, Scheduler, Sha256Hash, StateStore,
};
use bundle_fetcher::errors::{FetchError, FetchResult};

const MB: u64 = 1024 * 1024;

/// Deterministic fetcher serving canned payloads per asset path
#[derive(Default)]
struct StaticFetcher {
    responses: HashMap<String, Result<Vec<u8>, u16>>,
}

impl StaticFetcher {
    fn with_payload(mut self, path: &str, payload: Vec<u8>) -> Self {
        self.responses.insert(path.to_string(), Ok(payload));
        self
    }

    fn with_status(mut self, path: &str, status: u16) -> Self {
        self.responses.insert(path.to_string(), Err(status));
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

/// Payload of `size` bytes whose content is unique per id
fn payload(id: &str, size: u64) -> Vec<u8> {
    id.bytes().cycle().take(size as usize).collect()
}

fn verified_descriptor(id: &str, size: u64, content: &[u8]) -> AssetDescriptor {
    AssetDescriptor::new(
        id,
        "text",
        format!("data/{}.bin", id),
        size,
        ExpectedDigest::Sha256(Sha256Hash::of(content)),
    )
}

async fn build_scheduler(temp_dir: &TempDir, fetcher: Arc<dyn Fetcher>) -> Scheduler {
    let store: Arc<dyn StateStore> = Arc::new(JsonFileStore::new(temp_dir.path().join("queue.json")));
    let queue = Arc::new(DownloadQueue::open(store).await);
    let blobs = FsBlobStore::open(&temp_dir.path().join("cache"), "bundle-cache-v2")
        .await
        .unwrap();
    Scheduler::new(queue, ContentCache::new(Arc::new(blobs)), fetcher)
}

/// Three assets of 10/5/2 MiB against a 12 MiB cap: after the run the done
/// set fits the cap and the oldest completion was evicted first
#[tokio::test]
async fn scenario_capacity_enforcement_after_run() {
    let temp_dir = TempDir::new().unwrap();

    let (big, medium, small) = (
        payload("big", 10 * MB),
        payload("medium", 5 * MB),
        payload("small", 2 * MB),
    );
    let fetcher = StaticFetcher::default()
        .with_payload("data/big.bin", big.clone())
        .with_payload("data/medium.bin", medium.clone())
        .with_payload("data/small.bin", small.clone());
    let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;

    scheduler
        .enqueue(vec![
            verified_descriptor("big", 10 * MB, &big),
            verified_descriptor("medium", 5 * MB, &medium),
            verified_descriptor("small", 2 * MB, &small),
        ])
        .await;
    scheduler.set_cap_bytes(12 * MB).await;
    scheduler.run().await;

    let items = scheduler.get_queue().await;
    let done_bytes: u64 = items
        .iter()
        .filter(|item| item.status == QueueStatus::Done)
        .map(|item| item.bytes)
        .sum();
    assert!(done_bytes <= 12 * MB);

    // All three completed in FIFO order, so "big" carried the oldest
    // completion stamp and went first
    assert_eq!(items[0].id, "big");
    assert_eq!(items[0].status, QueueStatus::Idle);
    assert_eq!(items[0].progress, 0.0);
    assert!(!scheduler.is_cached("data/big.bin").await);

    assert_eq!(items[1].status, QueueStatus::Done);
    assert_eq!(items[2].status, QueueStatus::Done);
    assert!(scheduler.is_cached("data/medium.bin").await);
    assert!(scheduler.is_cached("data/small.bin").await);
}

/// A published digest that does not match the content: the item ends in
/// error with a checksum-mismatch message and nothing reaches the cache
#[tokio::test]
async fn scenario_checksum_mismatch() {
    let temp_dir = TempDir::new().unwrap();

    let fetcher =
        StaticFetcher::default().with_payload("data/tampered.bin", b"actual bytes".to_vec());
    let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;

    // Digest of different content than the fetcher serves
    scheduler
        .enqueue(vec![verified_descriptor(
            "tampered",
            12,
            b"published bytes",
        )])
        .await;
    scheduler.run().await;

    let item = &scheduler.get_queue().await[0];
    assert_eq!(item.status, QueueStatus::Error);
    let message = item.error.as_deref().unwrap();
    assert!(
        message.contains("Checksum mismatch"),
        "unexpected error message: {}",
        message
    );
    assert!(!scheduler.is_cached("data/tampered.bin").await);
    assert_eq!(scheduler.cache_usage().await, 0);
}

/// Pause holds an item through a run; resume re-queues it and the triggered
/// pass completes it
#[tokio::test]
async fn scenario_pause_resume() {
    let temp_dir = TempDir::new().unwrap();

    let content = payload("a", 1024);
    let fetcher = StaticFetcher::default().with_payload("data/a.bin", content.clone());
    let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;

    scheduler
        .enqueue(vec![verified_descriptor("a", 1024, &content)])
        .await;

    assert!(scheduler.pause("a").await);
    scheduler.run().await;
    assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Paused);
    assert!(!scheduler.is_cached("data/a.bin").await);

    // Resume triggers its own pass; no explicit run needed
    assert!(scheduler.resume("a").await);
    let item = &scheduler.get_queue().await[0];
    assert_eq!(item.status, QueueStatus::Done);
    assert_eq!(item.progress, 1.0);
    assert!(scheduler.is_cached("data/a.bin").await);
}

/// Setting the cap to zero evicts every completed item
#[tokio::test]
async fn scenario_zero_cap() {
    let temp_dir = TempDir::new().unwrap();

    let content = payload("a", 4096);
    let fetcher = StaticFetcher::default().with_payload("data/a.bin", content.clone());
    let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;

    scheduler
        .enqueue(vec![verified_descriptor("a", 4096, &content)])
        .await;
    scheduler.run().await;
    assert_eq!(scheduler.get_queue().await[0].status, QueueStatus::Done);

    scheduler.set_cap_bytes(0).await;

    let item = &scheduler.get_queue().await[0];
    assert_eq!(item.status, QueueStatus::Idle);
    assert_eq!(item.progress, 0.0);
    assert!(!scheduler.is_cached("data/a.bin").await);
}

/// An item larger than the cap is still ingested, then evicted by the next
/// enforcement pass
#[tokio::test]
async fn oversized_item_is_admitted_then_evicted() {
    let temp_dir = TempDir::new().unwrap();

    let content = payload("huge", 3 * MB);
    let fetcher = StaticFetcher::default().with_payload("data/huge.bin", content.clone());
    let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;

    scheduler
        .enqueue(vec![verified_descriptor("huge", 3 * MB, &content)])
        .await;
    scheduler.set_cap_bytes(MB).await;
    scheduler.run().await;

    // The run's closing enforcement already evicted the oversized item
    let item = &scheduler.get_queue().await[0];
    assert_eq!(item.status, QueueStatus::Idle);
    assert!(!scheduler.is_cached("data/huge.bin").await);
}

/// Queue state survives a process restart: order, items, and cap reload
/// identically through the persisted JSON record
#[tokio::test]
async fn persisted_state_round_trips_across_restart() {
    let temp_dir = TempDir::new().unwrap();

    let content = payload("keep", 2048);
    let fetcher = StaticFetcher::default()
        .with_payload("data/keep.bin", content.clone())
        .with_status("data/broken.bin", 503);

    let before = {
        let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;
        scheduler
            .enqueue(vec![
                verified_descriptor("keep", 2048, &content),
                AssetDescriptor::new(
                    "broken",
                    "audio",
                    "data/broken.bin",
                    512,
                    ExpectedDigest::Unverified,
                ),
                AssetDescriptor::new(
                    "waiting",
                    "text",
                    "data/waiting.bin",
                    256,
                    ExpectedDigest::Unverified,
                ),
            ])
            .await;
        scheduler.pause("waiting").await;
        scheduler.run().await;
        scheduler.get_queue().await
    };

    // One done, one errored, one paused
    assert_eq!(before[0].status, QueueStatus::Done);
    assert_eq!(before[1].status, QueueStatus::Error);
    assert_eq!(before[2].status, QueueStatus::Paused);

    // Fresh process: reopen everything from the same directories
    let reloaded = build_scheduler(&temp_dir, Arc::new(StaticFetcher::default())).await;
    assert_eq!(reloaded.get_queue().await, before);
    assert!(reloaded.is_cached("data/keep.bin").await);
}

/// Enqueueing from a manifest document is idempotent per asset id
#[tokio::test]
async fn manifest_enqueue_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();

    let manifest_path = temp_dir.path().join("manifest.json");
    tokio::fs::write(
        &manifest_path,
        r#"{
            "version": "1",
            "assets": [
                {"id": "a", "type": "text", "path": "data/a.json", "bytes": 10, "digest": "dev"},
                {"id": "b", "type": "text", "path": "data/b.json", "bytes": 20, "digest": "dev"}
            ]
        }"#,
    )
    .await
    .unwrap();

    let scheduler = build_scheduler(&temp_dir, Arc::new(StaticFetcher::default())).await;
    let manifest = Manifest::load(Path::new(&manifest_path)).await.unwrap();

    assert_eq!(scheduler.enqueue(manifest.assets.clone()).await, 2);
    assert_eq!(scheduler.enqueue(manifest.assets).await, 0);

    let items = scheduler.get_queue().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].id, "a");
    assert_eq!(items[1].id, "b");
}

/// A network failure is retryable: resume clears the error and the next
/// pass succeeds once the transport recovers
#[tokio::test]
async fn failed_download_recovers_via_resume() {
    let temp_dir = TempDir::new().unwrap();
    let content = payload("flaky", 1024);

    // First process: the fetch fails with a server error
    {
        let fetcher = StaticFetcher::default().with_status("data/flaky.bin", 503);
        let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;
        scheduler
            .enqueue(vec![verified_descriptor("flaky", 1024, &content)])
            .await;
        scheduler.run().await;

        let item = &scheduler.get_queue().await[0];
        assert_eq!(item.status, QueueStatus::Error);
        assert_eq!(item.error.as_deref(), Some("HTTP 503"));
    }

    // Second process: the transport recovered; resume re-queues and runs
    {
        let fetcher = StaticFetcher::default().with_payload("data/flaky.bin", content.clone());
        let scheduler = build_scheduler(&temp_dir, Arc::new(fetcher)).await;
        assert!(scheduler.resume("flaky").await);

        let item = &scheduler.get_queue().await[0];
        assert_eq!(item.status, QueueStatus::Done);
        assert!(item.error.is_none());
        assert!(scheduler.is_cached("data/flaky.bin").await);
    }
}
