//! Content manifest input
//!
//! The manifest is the published catalog of downloadable assets. It is
//! produced and served by an external collaborator; this subsystem only
//! parses it and hands selected descriptors to the queue. The manifest
//! document itself is never fetched through the download queue or written to
//! the content cache.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::app::models::AssetDescriptor;
use crate::errors::{ManifestError, ManifestResult};

/// Published catalog of downloadable assets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Catalog version as published
    pub version: String,
    /// All downloadable assets
    pub assets: Vec<AssetDescriptor>,
}

impl Manifest {
    /// Load and parse a manifest document from disk
    ///
    /// # Errors
    ///
    /// `ManifestError::NotFound` for a missing file, `Io`/`JsonParse` for
    /// unreadable or malformed documents.
    pub async fn load(path: &Path) -> ManifestResult<Self> {
        let raw = match fs::read(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(e) => return Err(ManifestError::Io(e)),
        };

        let manifest: Manifest = serde_json::from_slice(&raw)?;
        debug!(
            "Loaded manifest {} with {} assets",
            manifest.version,
            manifest.assets.len()
        );
        Ok(manifest)
    }

    /// Select the descriptors for a set of asset ids
    ///
    /// Unknown ids are silently ignored; manifest order is preserved.
    pub fn select(&self, ids: &[String]) -> Vec<AssetDescriptor> {
        let wanted: HashSet<&str> = ids.iter().map(String::as_str).collect();
        self.assets
            .iter()
            .filter(|asset| wanted.contains(asset.id.as_str()))
            .cloned()
            .collect()
    }
}
