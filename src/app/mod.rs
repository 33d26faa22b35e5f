//! Core application logic for Bundle Fetcher
//!
//! This module contains the download-and-cache subsystem: the persistent
//! queue, the HTTP fetcher with digest verification, the versioned content
//! cache with its eviction policy, and the scheduler that drives items
//! through all of them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use bundle_fetcher::app::{
//!     ContentCache, DownloadQueue, FsBlobStore, HttpFetcher, JsonFileStore, Manifest, Scheduler,
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // Rehydrate the queue and open the cache
//! let queue = Arc::new(DownloadQueue::open(Arc::new(JsonFileStore::new("queue.json"))).await);
//! let blobs = FsBlobStore::open("cache".as_ref(), "bundle-cache-v2").await?;
//! let fetcher = HttpFetcher::new("https://assets.example.org/")?;
//!
//! let scheduler = Scheduler::new(queue, ContentCache::new(Arc::new(blobs)), Arc::new(fetcher));
//!
//! // Enqueue everything the manifest publishes and process it
//! let manifest = Manifest::load("manifest.json".as_ref()).await?;
//! scheduler.enqueue(manifest.assets).await;
//! scheduler.run().await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod eviction;
pub mod fetcher;
pub mod hash;
pub mod manifest;
pub mod models;
pub mod queue;
pub mod scheduler;
pub mod store;

// Re-export main public API
pub use cache::{BlobStore, CachedBlob, ContentCache, FsBlobStore};
pub use eviction::enforce_cap;
pub use fetcher::{Fetcher, HttpFetcher};
pub use hash::{ExpectedDigest, Sha256Hash};
pub use manifest::Manifest;
pub use models::{AssetDescriptor, ContentType};
pub use queue::{DownloadQueue, QueueItem, QueueStatus};
pub use scheduler::Scheduler;
pub use store::{JsonFileStore, MemoryStore, PersistedQueue, StateStore};
