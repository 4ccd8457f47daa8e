//! Null vector index
//!
//! Accepts writes, returns nothing. Used when vector search is disabled;
//! the selector then always takes its rule-based path.

use async_trait::async_trait;

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::VectorIndexProvider;
use mcs_domain::value_objects::{
    EmbeddingRecord, IndexFilter, IndexStats, ItemType, SearchHit,
};

/// Null vector index
#[derive(Default)]
pub struct NullVectorIndex;

impl NullVectorIndex {
    /// Create the null index
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl VectorIndexProvider for NullVectorIndex {
    async fn upsert(&self, _record: EmbeddingRecord) -> Result<()> {
        Ok(())
    }

    async fn delete(&self, _item_type: ItemType, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn get(&self, item_type: ItemType, name: &str) -> Result<EmbeddingRecord> {
        Err(Error::not_found(format!("index record '{item_type}/{name}'")))
    }

    async fn search(
        &self,
        _query: &[f32],
        _filter: &IndexFilter,
        _k: usize,
    ) -> Result<Vec<SearchHit>> {
        Ok(Vec::new())
    }

    async fn list_keys(&self, _filter: &IndexFilter) -> Result<Vec<(ItemType, String)>> {
        Ok(Vec::new())
    }

    async fn stats(&self, _filter: &IndexFilter) -> Result<IndexStats> {
        Ok(IndexStats::default())
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}
