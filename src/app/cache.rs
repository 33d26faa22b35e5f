//! Capacity-bounded content cache over pluggable blob storage
//!
//! Verified asset bytes land here, keyed by the asset's fetch path. Storage
//! is abstracted behind the [`BlobStore`] trait over byte arrays so the
//! eviction and integrity logic stay storage-agnostic; the production
//! implementation is a filesystem store rooted in a versioned namespace
//! directory. Bumping the namespace version orphans every previously stored
//! blob at once, which is how payload format changes roll out without
//! per-key deletion.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, info, warn};

use crate::app::models::ContentType;
use crate::constants::cache::TEMP_FILE_SUFFIX;
use crate::errors::{CacheError, CacheResult};

/// Pluggable blob storage over byte arrays
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under a key, replacing any existing blob
    async fn put(&self, key: &str, bytes: &[u8], content_type: ContentType) -> CacheResult<()>;

    /// Retrieve the bytes for a key, if present
    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;

    /// Delete the blob for a key; absent keys are a no-op
    async fn delete(&self, key: &str) -> CacheResult<()>;

    /// Check whether a key has a stored blob
    async fn has(&self, key: &str) -> CacheResult<bool>;

    /// Total bytes currently stored
    async fn usage(&self) -> CacheResult<u64>;

    /// Remove every stored blob
    async fn clear(&self) -> CacheResult<()>;
}

/// Filesystem blob store rooted in a versioned namespace directory
///
/// Keys are asset paths; each blob is a file under
/// `<cache_root>/<namespace>/`. Writes are atomic (temp file + rename), the
/// same durable-write pattern the queue store uses.
#[derive(Debug)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a blob store under `cache_root`, namespaced by `namespace`
    ///
    /// Creates the namespace directory if needed. Blobs written under a
    /// different namespace version are never visible through this store.
    pub async fn open(cache_root: &Path, namespace: &str) -> CacheResult<Self> {
        let root = cache_root.join(namespace);
        fs::create_dir_all(&root).await.map_err(|e| {
            warn!("Failed to create cache directory: {}", e);
            CacheError::DirectoryNotAccessible { path: root.clone() }
        })?;

        info!("Opened blob store at {}", root.display());
        Ok(Self { root })
    }

    /// Namespace root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a key to a path inside the namespace
    ///
    /// Leading separators and parent-directory components are rejected so a
    /// hostile manifest path cannot escape the namespace.
    fn blob_path(&self, key: &str) -> CacheResult<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        let mut clean = PathBuf::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => clean.push(part),
                Component::CurDir => {}
                _ => {
                    return Err(CacheError::InvalidKey {
                        key: key.to_string(),
                    })
                }
            }
        }
        if clean.as_os_str().is_empty() {
            return Err(CacheError::InvalidKey {
                key: key.to_string(),
            });
        }
        Ok(self.root.join(clean))
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8], content_type: ContentType) -> CacheResult<()> {
        let final_path = self.blob_path(key)?;
        if let Some(parent) = final_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Write to temporary file first, then rename into place
        let temp_path = final_path.with_extension(format!(
            "{}{}",
            final_path.extension().unwrap_or_default().to_string_lossy(),
            TEMP_FILE_SUFFIX
        ));
        fs::write(&temp_path, bytes).await?;
        if let Err(e) = fs::rename(&temp_path, &final_path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(CacheError::Io(e));
        }

        debug!(
            "Stored blob {} ({} bytes, {})",
            key,
            bytes.len(),
            content_type.mime()
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let path = self.blob_path(key)?;
        match fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn delete(&self, key: &str) -> CacheResult<()> {
        let path = self.blob_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted blob {}", key);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(CacheError::Io(e)),
        }
    }

    async fn has(&self, key: &str) -> CacheResult<bool> {
        let path = self.blob_path(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn usage(&self) -> CacheResult<u64> {
        let mut total = 0u64;
        let mut pending = vec![self.root.clone()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(CacheError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let metadata = entry.metadata().await?;
                if metadata.is_dir() {
                    pending.push(entry.path());
                } else {
                    total += metadata.len();
                }
            }
        }

        Ok(total)
    }

    async fn clear(&self) -> CacheResult<()> {
        match fs::remove_dir_all(&self.root).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(CacheError::Io(e)),
        }
        fs::create_dir_all(&self.root).await?;
        info!("Cleared blob store at {}", self.root.display());
        Ok(())
    }
}

/// A retrieved blob with its derived content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBlob {
    /// The stored bytes
    pub bytes: Vec<u8>,
    /// Content type derived from the key's extension family
    pub content_type: ContentType,
}

/// Content cache over a blob store
///
/// Thin coordination layer: derives content types for consumers and exposes
/// the operations the scheduler and eviction policy need. Owns no queue
/// state.
#[derive(Clone)]
pub struct ContentCache {
    store: Arc<dyn BlobStore>,
}

impl std::fmt::Debug for ContentCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache").finish_non_exhaustive()
    }
}

impl ContentCache {
    /// Create a cache over the given blob store
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Store verified bytes under an asset path
    pub async fn put(&self, key: &str, bytes: &[u8]) -> CacheResult<()> {
        self.store
            .put(key, bytes, ContentType::from_path(key))
            .await
    }

    /// Retrieve cached bytes with their content type
    pub async fn get(&self, key: &str) -> CacheResult<Option<CachedBlob>> {
        Ok(self.store.get(key).await?.map(|bytes| CachedBlob {
            bytes,
            content_type: ContentType::from_path(key),
        }))
    }

    /// Delete the cached bytes for an asset path
    pub async fn delete(&self, key: &str) -> CacheResult<()> {
        self.store.delete(key).await
    }

    /// Check whether an asset path is cached
    pub async fn has(&self, key: &str) -> CacheResult<bool> {
        self.store.has(key).await
    }

    /// Total bytes accounted by the underlying store
    pub async fn usage(&self) -> CacheResult<u64> {
        self.store.usage().await
    }

    /// Remove every cached blob
    pub async fn clear(&self) -> CacheResult<()> {
        self.store.clear().await
    }
}
