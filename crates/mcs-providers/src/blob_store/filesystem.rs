//! Filesystem blob store
//!
//! Content-addressed files under a root directory. The key is the SHA-256
//! of the payload; the first two hex characters shard the directory so no
//! single directory grows unbounded.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use mcs_domain::capability::hash::sha256_hex;
use mcs_domain::error::{Error, Result};
use mcs_domain::ports::BlobStoreProvider;

/// Filesystem blob store
pub struct FilesystemBlobStore {
    root: PathBuf,
}

impl FilesystemBlobStore {
    /// Create a store rooted at the given directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Path for a key, rejecting anything that is not a bare hex digest
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.len() < 3 || !key.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::invalid_argument(format!("malformed blob key '{key}'")));
        }
        Ok(self.root.join(&key[..2]).join(key))
    }

    /// Root directory of the store
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl BlobStoreProvider for FilesystemBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = sha256_hex(bytes);
        let path = self.path_for(&key)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename keeps concurrent readers off partial files
        let staging = path.with_extension("part");
        tokio::fs::write(&staging, bytes).await?;
        tokio::fs::rename(&staging, &path).await?;
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("blob '{key}'")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found(format!("blob '{key}'")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        let path = self.path_for(key)?;
        Ok(tokio::fs::try_exists(&path).await.unwrap_or(false))
    }

    fn provider_name(&self) -> &str {
        "filesystem"
    }
}
