//! Application constants for Bundle Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Default user agent for all HTTP requests
    pub const USER_AGENT: &str = "Bundle-Fetcher/0.1.0 (Offline Content Tool)";

    /// Default HTTP request timeout
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Maximum number of redirects to follow
    pub const MAX_REDIRECTS: usize = 10;

    /// Default base URL for asset downloads
    pub const DEFAULT_BASE_URL: &str = "https://assets.example.org/";
}

/// Content cache constants
pub mod cache {
    /// Versioned cache namespace
    ///
    /// Bumping the version suffix orphans every previously stored blob
    /// without per-key deletion, which is the rollout mechanism for payload
    /// format changes.
    pub const NAMESPACE: &str = "bundle-cache-v2";

    /// Temporary file suffix for atomic blob writes
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Default cache capacity in bytes (200 MiB)
    pub const DEFAULT_CAP_BYTES: u64 = 200 * 1024 * 1024;
}

/// Queue persistence constants
pub mod queue {
    /// File name for the persisted queue state
    pub const STATE_FILE_NAME: &str = "bundle-queue.json";

    /// Digest sentinel that disables verification (development manifests)
    pub const UNVERIFIED_DIGEST_SENTINEL: &str = "dev";
}

/// Logging and debugging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

// Re-export commonly used constants for convenience
pub use cache::{DEFAULT_CAP_BYTES, NAMESPACE as CACHE_NAMESPACE, TEMP_FILE_SUFFIX};
pub use http::{DEFAULT_TIMEOUT as HTTP_TIMEOUT, USER_AGENT};
pub use queue::{STATE_FILE_NAME, UNVERIFIED_DIGEST_SENTINEL};
