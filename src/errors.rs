//! Error types for Bundle Fetcher
//!
//! This module defines error types for all components of the subsystem.
//! The taxonomy mirrors the failure classes the scheduler has to handle:
//! transport failures and digest mismatches are recorded on the affected
//! queue item, persistence and cache-availability failures are recovered
//! locally, and nothing here is fatal to the host process.

use std::path::PathBuf;
use thiserror::Error;

/// Transport and integrity errors raised while fetching one asset
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request failed at the transport layer
    #[error("HTTP request failed")]
    Http(#[from] reqwest::Error),

    /// Server returned a non-success status
    #[error("HTTP {status}")]
    Status { status: u16 },

    /// Invalid download URL
    #[error("Invalid URL: {url} - {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Fetched bytes do not hash to the published digest
    #[error("Checksum mismatch. Expected: {expected}, got: {actual}")]
    ChecksumMismatch { expected: String, actual: String },
}

impl FetchError {
    /// Check whether this failure is worth retrying via `resume`
    ///
    /// Transport and status failures are transient; a checksum mismatch
    /// recurs until the manifest or the published content changes.
    pub fn is_transient(&self) -> bool {
        !matches!(self, FetchError::ChecksumMismatch { .. })
    }
}

/// Queue state persistence errors
///
/// These are caught inside the queue store, logged, and never surfaced
/// through the public API; the queue keeps operating in memory.
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error reading or writing the persisted state
    #[error("Queue state I/O error")]
    Io(#[from] std::io::Error),

    /// Persisted state could not be encoded or decoded
    #[error("Queue state serialization error")]
    Serialization(#[from] serde_json::Error),
}

/// Content cache errors
#[derive(Error, Debug)]
pub enum CacheError {
    /// Blob store root not found or inaccessible
    #[error("Cache directory not accessible: {path}")]
    DirectoryNotAccessible { path: PathBuf },

    /// Underlying blob storage unreachable
    #[error("Blob store unavailable: {reason}")]
    Unavailable { reason: String },

    /// I/O error during a blob operation
    #[error("Blob I/O error")]
    Io(#[from] std::io::Error),

    /// Blob key escapes the cache namespace
    #[error("Invalid blob key: {key}")]
    InvalidKey { key: String },
}

/// Manifest parsing errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("Manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error reading the manifest
    #[error("I/O error reading manifest")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON parsing error in manifest")]
    JsonParse(#[from] serde_json::Error),

    /// Invalid digest string in a manifest entry
    #[error("Invalid digest: {digest}. Expected SHA-256 hex string")]
    InvalidDigest { digest: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// I/O error reading the configuration
    #[error("I/O error reading configuration")]
    Io(#[from] std::io::Error),

    /// Invalid configuration format
    #[error("Invalid configuration format")]
    InvalidFormat(#[from] toml::de::Error),

    /// No usable state or cache directory could be resolved
    #[error("Could not resolve {kind} directory")]
    DirectoryUnresolved { kind: &'static str },
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Persistence error
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Cache error
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Get error category for logging and metrics
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Store(_) => "store",
            AppError::Cache(_) => "cache",
            AppError::Manifest(_) => "manifest",
            AppError::Config(_) => "config",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Store result type alias
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Cache result type alias
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
