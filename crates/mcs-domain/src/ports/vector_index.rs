//! Vector index port
//!
//! Contract for the store that holds one embedding record per searchable
//! catalog entry. The index is external and eventually consistent with the
//! registry; the core keeps no authoritative copy.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::{EmbeddingRecord, IndexFilter, IndexStats, ItemType, SearchHit};

/// Vector index provider
///
/// `(item_type, name)` is the unique record key. Similarity is cosine over
/// unit-norm vectors. Errors distinguish `upstream_unavailable` (transient,
/// caller retries), `invalid_argument` (permanent), and `not_found`
/// (benign).
#[async_trait]
pub trait VectorIndexProvider: Send + Sync {
    /// Insert or update the record for `(record.item_type, record.name)`
    async fn upsert(&self, record: EmbeddingRecord) -> Result<()>;

    /// Delete the record for `(item_type, name)`
    ///
    /// Deleting an absent record is a `not_found` error; callers that treat
    /// it as benign are expected to do so explicitly.
    async fn delete(&self, item_type: ItemType, name: &str) -> Result<()>;

    /// Fetch one record by its key
    async fn get(&self, item_type: ItemType, name: &str) -> Result<EmbeddingRecord>;

    /// Similarity search over records matching the filter
    ///
    /// Returns at most `k` hits ordered by descending score in [0, 1].
    async fn search(
        &self,
        query: &[f32],
        filter: &IndexFilter,
        k: usize,
    ) -> Result<Vec<SearchHit>>;

    /// List record keys matching the filter
    ///
    /// Used by the stale-record sweeper to reconcile against the registry.
    async fn list_keys(&self, filter: &IndexFilter) -> Result<Vec<(ItemType, String)>>;

    /// Aggregate counts for records matching the filter
    async fn stats(&self, filter: &IndexFilter) -> Result<IndexStats>;

    /// Name of this provider implementation
    fn provider_name(&self) -> &str;

    /// Health check for the provider
    async fn health_check(&self) -> Result<()> {
        self.stats(&IndexFilter::default()).await?;
        Ok(())
    }
}
