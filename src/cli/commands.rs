//! Command handlers for the Bundle Fetcher CLI
//!
//! Each handler builds the component stack from configuration, executes one
//! scheduler operation, and prints a human-readable result. All state lives
//! in the persisted queue and the blob store, so every invocation is a fresh
//! process working over durable state.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::app::{
    ContentCache, DownloadQueue, FsBlobStore, HttpFetcher, JsonFileStore, Manifest, QueueItem,
    QueueStatus, Scheduler,
};
use crate::cli::args::{CacheAction, CapAction, EnqueueArgs, GlobalArgs};
use crate::config::AppConfig;
use crate::constants::cache::NAMESPACE;
use crate::errors::Result;

/// Build the scheduler stack from configuration and global overrides
async fn build_scheduler(global: &GlobalArgs) -> Result<Scheduler> {
    let config = AppConfig::load(global.config.as_deref()).await?;

    let cache_root = match &global.cache_dir {
        Some(dir) => dir.clone(),
        None => config.resolve_cache_root()?,
    };
    let state_path = config.resolve_state_path()?;

    let store = Arc::new(JsonFileStore::new(state_path));
    let queue = Arc::new(DownloadQueue::open_with_cap(store, config.cap_bytes).await);
    let blobs = FsBlobStore::open(&cache_root, NAMESPACE).await?;
    let fetcher = HttpFetcher::new(&config.base_url)?;

    Ok(Scheduler::new(
        queue,
        ContentCache::new(Arc::new(blobs)),
        Arc::new(fetcher),
    ))
}

/// Handle the enqueue command
pub async fn handle_enqueue(global: &GlobalArgs, args: EnqueueArgs) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    let manifest = Manifest::load(&args.manifest).await?;

    let descriptors = if args.ids.is_empty() {
        manifest.assets
    } else {
        manifest.select(&args.ids)
    };
    let requested = descriptors.len();
    let added = scheduler.enqueue(descriptors).await;

    println!(
        "Enqueued {} of {} requested assets ({} already present)",
        added,
        requested,
        requested - added
    );
    Ok(())
}

/// Handle the run command
pub async fn handle_run(global: &GlobalArgs) -> Result<()> {
    let scheduler = build_scheduler(global).await?;

    let queued = scheduler
        .get_queue()
        .await
        .iter()
        .filter(|item| item.status == QueueStatus::Queued)
        .count();
    if queued == 0 {
        println!("Nothing queued.");
        return Ok(());
    }

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .expect("static template is valid"),
    );
    spinner.set_message(format!("Processing {} queued items", queued));
    spinner.enable_steady_tick(Duration::from_millis(100));

    scheduler.run().await;
    spinner.finish_and_clear();

    let items = scheduler.get_queue().await;
    let done = items
        .iter()
        .filter(|item| item.status == QueueStatus::Done)
        .count();
    let failed: Vec<&QueueItem> = items
        .iter()
        .filter(|item| item.status == QueueStatus::Error)
        .collect();

    println!(
        "Run complete: {} done, {} failed, {} in cache",
        done,
        failed.len(),
        format_bytes(scheduler.cache_usage().await)
    );
    for item in failed {
        println!(
            "  {} failed: {}",
            item.id,
            item.error.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}

/// Handle the queue listing command
pub async fn handle_queue(global: &GlobalArgs) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    let items = scheduler.get_queue().await;

    if items.is_empty() {
        println!("Queue is empty.");
        return Ok(());
    }

    println!(
        "{:<24} {:<12} {:>8} {:>12}  {}",
        "ID", "STATUS", "PROGRESS", "SIZE", "DETAIL"
    );
    for item in &items {
        println!(
            "{:<24} {:<12} {:>7.0}% {:>12}  {}",
            item.id,
            format_status(item.status),
            item.progress * 100.0,
            format_bytes(item.bytes),
            item.error.as_deref().unwrap_or("")
        );
    }
    println!(
        "\nCapacity: {} of {}",
        format_bytes(done_bytes(&items)),
        format_bytes(scheduler.cap_bytes().await)
    );
    Ok(())
}

/// Handle pause
pub async fn handle_pause(global: &GlobalArgs, id: &str) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    if scheduler.pause(id).await {
        println!("Paused {}", id);
    } else {
        println!("{} is not queued; nothing to pause", id);
    }
    Ok(())
}

/// Handle resume, which also processes the queue
pub async fn handle_resume(global: &GlobalArgs, id: &str) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    if scheduler.resume(id).await {
        info!("Resumed and processed {}", id);
        let status = scheduler
            .get_queue()
            .await
            .into_iter()
            .find(|item| item.id == id)
            .map(|item| format_status(item.status));
        match status {
            Some(status) => println!("Resumed {}; status now {}", id, status),
            None => println!("Resumed {}", id),
        }
    } else {
        println!("{} is not paused, failed, or canceled; nothing to resume", id);
    }
    Ok(())
}

/// Handle cancel
pub async fn handle_cancel(global: &GlobalArgs, id: &str) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    if scheduler.cancel(id).await {
        println!("Canceled {}", id);
    } else {
        println!("{} cannot be canceled", id);
    }
    Ok(())
}

/// Handle remove
pub async fn handle_remove(global: &GlobalArgs, id: &str) -> Result<()> {
    let scheduler = build_scheduler(global).await?;
    scheduler.remove(id).await;
    println!("Removed {}", id);
    Ok(())
}

/// Handle capacity subcommands
pub async fn handle_cap(global: &GlobalArgs, action: CapAction) -> Result<()> {
    let scheduler = build_scheduler(global).await?;

    match action {
        CapAction::Get => {
            println!("Capacity: {}", format_bytes(scheduler.cap_bytes().await));
        }
        CapAction::Set { bytes } => {
            scheduler.set_cap_bytes(bytes).await;
            println!("Capacity set to {} and enforced", format_bytes(bytes));
        }
        CapAction::Enforce => {
            let evicted = scheduler.enforce_cap().await;
            println!("Evicted {} items", evicted);
        }
    }
    Ok(())
}

/// Handle cache subcommands
pub async fn handle_cache(global: &GlobalArgs, action: CacheAction) -> Result<()> {
    let scheduler = build_scheduler(global).await?;

    match action {
        CacheAction::Check { path } => {
            if scheduler.is_cached(&path).await {
                println!("{} is cached", path);
            } else {
                println!("{} is not cached", path);
            }
        }
        CacheAction::Usage => {
            let items = scheduler.get_queue().await;
            println!(
                "Cache usage: {} stored, {} accounted by {} completed items (cap {})",
                format_bytes(scheduler.cache_usage().await),
                format_bytes(done_bytes(&items)),
                items
                    .iter()
                    .filter(|item| item.status == QueueStatus::Done)
                    .count(),
                format_bytes(scheduler.cap_bytes().await)
            );
        }
        CacheAction::Clear => {
            scheduler.clear_all().await;
            println!("Cache cleared; completed items reverted to idle");
        }
    }
    Ok(())
}

fn done_bytes(items: &[QueueItem]) -> u64 {
    items
        .iter()
        .filter(|item| item.status == QueueStatus::Done)
        .map(|item| item.bytes)
        .sum()
}

fn format_status(status: QueueStatus) -> &'static str {
    match status {
        QueueStatus::Idle => "idle",
        QueueStatus::Queued => "queued",
        QueueStatus::Downloading => "downloading",
        QueueStatus::Paused => "paused",
        QueueStatus::Done => "done",
        QueueStatus::Error => "error",
        QueueStatus::Canceled => "canceled",
    }
}

/// Render a byte count with a binary unit suffix
fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{} {}", bytes, UNITS[unit])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(0), "0 B");
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KiB");
        assert_eq!(format_bytes(200 * 1024 * 1024), "200.0 MiB");
    }

    #[test]
    fn test_format_status_matches_wire_names() {
        // CLI output uses the same lowercase names as the persisted format
        for (status, expected) in [
            (QueueStatus::Idle, "idle"),
            (QueueStatus::Done, "done"),
            (QueueStatus::Canceled, "canceled"),
        ] {
            assert_eq!(format_status(status), expected);
            assert_eq!(
                serde_json::to_string(&status).unwrap(),
                format!("\"{}\"", expected)
            );
        }
    }
}
