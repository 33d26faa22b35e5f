//! Capacity enforcement over completed downloads
//!
//! Eviction keeps the sum of completed items' bytes at or below the
//! configured cap. Victims are completed items ordered by `updated_at`
//! ascending: the timestamp is stamped on completion and not bumped by
//! reads, so this approximates LRU by recency of refresh. Evicted items
//! revert to idle and can be re-queued later.
//!
//! The policy bounds retention, not ingestion: a single item larger than the
//! cap is still admitted when freshly downloaded and simply becomes the
//! first victim of the next pass.

use tracing::{debug, info, warn};

use crate::app::cache::ContentCache;
use crate::app::queue::DownloadQueue;

/// Evict oldest completed items until their total size fits the cap
///
/// Queue state is persisted once after the pass. A blob-store failure
/// degrades the pass to a no-op for the remaining victims; items whose
/// blobs were already deleted are still reset. Returns the number of items
/// evicted.
pub async fn enforce_cap(queue: &DownloadQueue, cache: &ContentCache) -> usize {
    let cap = queue.cap_bytes().await;
    let mut candidates = queue.done_items().await;
    let mut total: u64 = candidates.iter().map(|item| item.bytes).sum();

    if total <= cap {
        debug!("Cache within cap: {} of {} bytes", total, cap);
        return 0;
    }

    // Oldest completed first; listing order breaks ties
    candidates.sort_by_key(|item| item.updated_at);

    let mut evicted = Vec::new();
    for victim in candidates {
        if total <= cap {
            break;
        }
        match cache.delete(&victim.path).await {
            Ok(()) => {
                total -= victim.bytes;
                debug!("Evicted {} ({} bytes)", victim.id, victim.bytes);
                evicted.push(victim.id);
            }
            Err(e) => {
                warn!("Eviction halted, blob store failed: {}", e);
                break;
            }
        }
    }

    if !evicted.is_empty() {
        queue.reset_to_idle(&evicted).await;
        info!(
            "Evicted {} items, {} bytes retained (cap {})",
            evicted.len(),
            total,
            cap
        );
    }

    evicted.len()
}
