//! In-memory blob store for tests and development

use async_trait::async_trait;
use dashmap::DashMap;

use mcs_domain::capability::hash::sha256_hex;
use mcs_domain::error::{Error, Result};
use mcs_domain::ports::BlobStoreProvider;

/// In-memory blob store
#[derive(Default)]
pub struct InMemoryBlobStore {
    blobs: DashMap<String, Vec<u8>>,
}

impl InMemoryBlobStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStoreProvider for InMemoryBlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<String> {
        let key = sha256_hex(bytes);
        self.blobs.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.blobs
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(format!("blob '{key}'")))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.blobs
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("blob '{key}'")))
    }

    async fn contains(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.contains_key(key))
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}
