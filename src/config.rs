//! Application configuration
//!
//! Configuration is a small TOML file; every field has a default so the tool
//! runs with no configuration at all. Paths left unset resolve to the OS
//! cache and data directories.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::debug;

use crate::constants::{cache, http, queue};
use crate::errors::{ConfigError, ConfigResult};

/// Directory name used under the OS cache/data/config roots
const APP_DIR_NAME: &str = "bundle-fetcher";

fn default_base_url() -> String {
    http::DEFAULT_BASE_URL.to_string()
}

fn default_cap_bytes() -> u64 {
    cache::DEFAULT_CAP_BYTES
}

/// Application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base URL asset paths are resolved against
    pub base_url: String,
    /// Root directory for cached blobs (OS cache directory if unset)
    pub cache_root: Option<PathBuf>,
    /// Path of the persisted queue state (OS data directory if unset)
    pub state_path: Option<PathBuf>,
    /// Cache capacity in bytes applied when no persisted state exists yet
    pub cap_bytes: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            cache_root: None,
            state_path: None,
            cap_bytes: default_cap_bytes(),
        }
    }
}

impl AppConfig {
    /// Load configuration
    ///
    /// An explicitly given path must exist and parse. With no path, the
    /// default config file is used when present, defaults otherwise.
    pub async fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_config_path() {
                Some(path) if path.exists() => path,
                _ => {
                    debug!("No configuration file, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound { path })
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        let config: AppConfig = toml::from_str(&raw)?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Default configuration file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR_NAME).join("config.toml"))
    }

    /// Directory the blob store namespace lives under
    pub fn resolve_cache_root(&self) -> ConfigResult<PathBuf> {
        match &self.cache_root {
            Some(path) => Ok(path.clone()),
            None => dirs::cache_dir()
                .map(|dir| dir.join(APP_DIR_NAME))
                .ok_or(ConfigError::DirectoryUnresolved { kind: "cache" }),
        }
    }

    /// File the queue state persists to
    pub fn resolve_state_path(&self) -> ConfigResult<PathBuf> {
        match &self.state_path {
            Some(path) => Ok(path.clone()),
            None => dirs::data_dir()
                .map(|dir| dir.join(APP_DIR_NAME).join(queue::STATE_FILE_NAME))
                .ok_or(ConfigError::DirectoryUnresolved { kind: "data" }),
        }
    }
}
