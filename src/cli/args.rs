//! Command-line argument parsing for Bundle Fetcher
//!
//! This module defines the CLI structure using clap derive macros. The
//! subcommands mirror the retrieval command surface the scheduler exposes to
//! embedding callers.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Bundle Fetcher - download and cache offline content bundles
#[derive(Parser, Debug)]
#[command(
    name = "bundle_fetcher",
    version,
    about = "Download, verify, and cache offline content bundles",
    long_about = "A tool for maintaining an offline cache of content bundles.
Assets are enqueued from a published manifest, fetched with checksum verification,
and retained in a capacity-bounded cache with least-recently-updated eviction."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Cache directory path, overrides the configured location
    #[arg(long, global = true, value_name = "DIR")]
    pub cache_dir: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Enqueue assets from a manifest document
    Enqueue(EnqueueArgs),

    /// Process queued downloads
    Run,

    /// Show the queue
    Queue,

    /// Pause a queued item
    Pause {
        /// Asset id to pause
        id: String,
    },

    /// Re-queue a paused, failed, or canceled item and process the queue
    Resume {
        /// Asset id to resume
        id: String,
    },

    /// Cancel an item (best-effort while downloading)
    Cancel {
        /// Asset id to cancel
        id: String,
    },

    /// Remove an item from the queue
    Remove {
        /// Asset id to remove
        id: String,
    },

    /// Inspect or change the cache capacity
    Cap(CapArgs),

    /// Cache inspection and maintenance
    Cache(CacheArgs),
}

/// Arguments for the enqueue command
#[derive(Args, Debug)]
pub struct EnqueueArgs {
    /// Path to the manifest document
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Specific asset ids to enqueue (repeatable); all assets when omitted
    #[arg(short, long = "id", value_name = "ID")]
    pub ids: Vec<String>,
}

/// Arguments for capacity management
#[derive(Args, Debug)]
pub struct CapArgs {
    #[command(subcommand)]
    pub action: CapAction,
}

/// Capacity management actions
#[derive(Subcommand, Debug)]
pub enum CapAction {
    /// Show the configured capacity
    Get,

    /// Set the capacity in bytes and enforce it
    Set {
        /// New capacity in bytes
        bytes: u64,
    },

    /// Evict completed items down to the capacity
    Enforce,
}

/// Arguments for cache management
#[derive(Args, Debug)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub action: CacheAction,
}

/// Cache management actions
#[derive(Subcommand, Debug)]
pub enum CacheAction {
    /// Check whether an asset path is cached
    Check {
        /// Asset path to probe
        path: String,
    },

    /// Show cache size and usage
    Usage,

    /// Drop all cached content, reverting completed items to idle
    Clear,
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level based on global arguments
    pub fn log_level(&self) -> tracing::Level {
        if self.global.quiet {
            tracing::Level::ERROR
        } else if self.global.very_verbose {
            tracing::Level::DEBUG
        } else if self.global.verbose {
            tracing::Level::INFO
        } else {
            tracing::Level::WARN
        }
    }
}
