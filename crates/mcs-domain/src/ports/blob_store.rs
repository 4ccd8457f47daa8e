//! Blob store port
//!
//! Contract for the external store holding large resource payloads. The
//! store is content-addressed; keys are opaque to the core.

use async_trait::async_trait;

use crate::error::Result;

/// Blob store provider
#[async_trait]
pub trait BlobStoreProvider: Send + Sync {
    /// Store a payload and return its key
    async fn put(&self, bytes: &[u8]) -> Result<String>;

    /// Fetch a payload by key
    async fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Delete a payload by key; absent keys are a `not_found` error
    async fn delete(&self, key: &str) -> Result<()>;

    /// Whether a payload exists for the key
    async fn contains(&self, key: &str) -> Result<bool>;

    /// Name of this provider implementation
    fn provider_name(&self) -> &str;

    /// Health check for the provider
    async fn health_check(&self) -> Result<()> {
        self.contains("__health_check__").await?;
        Ok(())
    }
}
