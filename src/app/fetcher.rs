//! Asset retrieval over HTTP
//!
//! The fetcher retrieves raw bytes for one asset path and is the only
//! component that touches the network. It is a trait so the scheduler can be
//! driven by a deterministic in-memory fetcher in tests; the production
//! implementation wraps a tuned `reqwest` client. Timeout semantics live
//! entirely in the client configuration, no application-level timeout is
//! layered on top.

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::app::hash::{ExpectedDigest, Sha256Hash};
use crate::constants::http;
use crate::errors::{FetchError, FetchResult};

/// Retrieves raw bytes for one asset path
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch the full content at `path`
    ///
    /// Fails with a transport or status error; never partially succeeds.
    async fn fetch(&self, path: &str) -> FetchResult<Vec<u8>>;
}

/// Check fetched bytes against the published digest
///
/// The unverified sentinel skips comparison. On a mismatch the bytes must be
/// discarded by the caller, never cached.
pub fn verify(expected: &ExpectedDigest, bytes: &[u8]) -> FetchResult<Sha256Hash> {
    expected
        .matches(bytes)
        .map_err(|actual| FetchError::ChecksumMismatch {
            expected: expected.to_string(),
            actual: actual.to_hex(),
        })
}

/// HTTP fetcher over a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
}

impl HttpFetcher {
    /// Create a fetcher resolving asset paths against `base_url`
    ///
    /// # Errors
    ///
    /// Returns `FetchError::InvalidUrl` if the base URL does not parse, and
    /// `FetchError::Http` if client construction fails.
    pub fn new(base_url: &str) -> FetchResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| FetchError::InvalidUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let client = Client::builder()
            .user_agent(http::USER_AGENT)
            .timeout(http::DEFAULT_TIMEOUT)
            .connect_timeout(http::CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(http::MAX_REDIRECTS))
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Resolve an asset path against the base URL
    fn asset_url(&self, path: &str) -> FetchResult<Url> {
        // A leading slash would discard the base path; asset paths are
        // always relative to the base.
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| FetchError::InvalidUrl {
                url: path.to_string(),
                reason: e.to_string(),
            })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, path: &str) -> FetchResult<Vec<u8>> {
        let url = self.asset_url(path)?;
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
            });
        }

        Ok(response.bytes().await?.to_vec())
    }
}
