//! Bundle Fetcher Library
//!
//! A Rust library for maintaining an offline cache of downloadable content
//! bundles. Provides a persistent download queue, integrity-checked fetching,
//! and a capacity-bounded content cache with least-recently-updated eviction.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
