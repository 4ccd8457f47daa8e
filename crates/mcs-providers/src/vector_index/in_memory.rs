//! In-memory vector index implementation
//!
//! Keeps embedding records in a concurrent map keyed by
//! `(item_type, name)`. Data is not persisted and is lost on restart.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use async_trait::async_trait;
use dashmap::DashMap;

use mcs_application::indexing::capability_kind_for;
use mcs_domain::error::{Error, Result};
use mcs_domain::ports::VectorIndexProvider;
use mcs_domain::value_objects::{
    EmbeddingRecord, IndexFilter, IndexStats, ItemType, SearchHit,
};

/// In-memory vector index
///
/// Similarity search computes cosine over the stored vectors with a
/// min-heap for top-k selection, O(n log k) per query.
pub struct InMemoryVectorIndex {
    records: DashMap<(ItemType, String), EmbeddingRecord>,
}

impl InMemoryVectorIndex {
    /// Create an empty index
    pub fn new() -> Self {
        Self {
            records: DashMap::new(),
        }
    }

    /// Number of stored records
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the index is empty
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndexProvider for InMemoryVectorIndex {
    async fn upsert(&self, mut record: EmbeddingRecord) -> Result<()> {
        if record.embedding.vector.is_empty() {
            return Err(Error::invalid_argument("embedding vector must not be empty"));
        }
        let key = (record.item_type, record.name.clone());
        if let Some(existing) = self.records.get(&key) {
            // Updates keep the original creation time
            record.created_at = existing.created_at;
        }
        self.records.insert(key, record);
        Ok(())
    }

    async fn delete(&self, item_type: ItemType, name: &str) -> Result<()> {
        self.records
            .remove(&(item_type, name.to_string()))
            .map(|_| ())
            .ok_or_else(|| Error::not_found(format!("index record '{item_type}/{name}'")))
    }

    async fn get(&self, item_type: ItemType, name: &str) -> Result<EmbeddingRecord> {
        self.records
            .get(&(item_type, name.to_string()))
            .map(|entry| entry.value().clone())
            .ok_or_else(|| Error::not_found(format!("index record '{item_type}/{name}'")))
    }

    async fn search(
        &self,
        query: &[f32],
        filter: &IndexFilter,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        if query.is_empty() {
            return Err(Error::invalid_argument("query vector must not be empty"));
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        // Precompute the query norm once
        let query_norm = compute_norm(query);

        // Min-heap keeps the current top-k; O(n log k) instead of O(n log n)
        let mut heap: BinaryHeap<ScoredKey> = BinaryHeap::with_capacity(k + 1);
        for entry in self.records.iter() {
            if !filter.matches(entry.value()) {
                continue;
            }
            let score =
                cosine_similarity_with_norm(query, &entry.value().embedding.vector, query_norm);

            if heap.len() < k {
                heap.push(ScoredKey {
                    score,
                    key: entry.key().clone(),
                });
            } else if let Some(min) = heap.peek() {
                if score > min.score {
                    heap.pop();
                    heap.push(ScoredKey {
                        score,
                        key: entry.key().clone(),
                    });
                }
            }
        }

        let mut scored: Vec<ScoredKey> = heap.into_iter().collect();
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let hits = scored
            .into_iter()
            .filter_map(|item| {
                let entry = self.records.get(&item.key)?;
                let record = entry.value();
                // Standalone metadata records are searchable internally but
                // are not capability references
                let kind = capability_kind_for(record.item_type)?;
                Some(SearchHit {
                    kind,
                    name: record.name.clone(),
                    category: record.category.clone(),
                    description: record.description.clone(),
                    score: f64::from(item.score),
                })
            })
            .collect();
        Ok(hits)
    }

    async fn list_keys(&self, filter: &IndexFilter) -> Result<Vec<(ItemType, String)>> {
        Ok(self
            .records
            .iter()
            .filter(|entry| filter.matches(entry.value()))
            .map(|entry| entry.key().clone())
            .collect())
    }

    async fn stats(&self, filter: &IndexFilter) -> Result<IndexStats> {
        let mut stats = IndexStats::default();
        for entry in self.records.iter() {
            if !filter.matches(entry.value()) {
                continue;
            }
            stats.total += 1;
            *stats
                .by_item_type
                .entry(entry.value().item_type.as_str().to_string())
                .or_insert(0) += 1;
        }
        Ok(stats)
    }

    fn provider_name(&self) -> &str {
        "memory"
    }
}

/// Scored key for heap-based top-k selection
///
/// Reverse ordering turns the max-heap into a min-heap so the weakest hit
/// sits on top.
struct ScoredKey {
    score: f32,
    key: (ItemType, String),
}

impl PartialEq for ScoredKey {
    fn eq(&self, other: &Self) -> bool {
        self.score == other.score
    }
}

impl Eq for ScoredKey {}

impl Ord for ScoredKey {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .score
            .partial_cmp(&self.score)
            .unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for ScoredKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Compute the L2 norm of a vector
fn compute_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity with a precomputed query norm, mapped to [0, 1]
fn cosine_similarity_with_norm(a: &[f32], b: &[f32], norm_a: f32) -> f32 {
    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        (dot_product / (norm_a * norm_b) + 1.0) / 2.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use mcs_domain::value_objects::Embedding;

    fn record(item_type: ItemType, name: &str, category: &str, vector: Vec<f32>) -> EmbeddingRecord {
        EmbeddingRecord {
            item_type,
            name: name.to_string(),
            category: category.to_string(),
            description: format!("{name} description"),
            embedding: Embedding {
                dimensions: vector.len(),
                vector,
                model: "test".to_string(),
            },
            keywords: Vec::new(),
            metadata: HashMap::new(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn upsert_get_delete_round_trip() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(record(ItemType::Tool, "echo", "general", vec![1.0, 0.0]))
            .await
            .unwrap();

        let fetched = index.get(ItemType::Tool, "echo").await.unwrap();
        assert_eq!(fetched.name, "echo");

        index.delete(ItemType::Tool, "echo").await.unwrap();
        let err = index.get(ItemType::Tool, "echo").await.unwrap_err();
        assert_eq!(err.kind(), mcs_domain::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn upsert_preserves_created_at() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(record(ItemType::Tool, "echo", "general", vec![1.0]))
            .await
            .unwrap();
        let first = index.get(ItemType::Tool, "echo").await.unwrap();

        index
            .upsert(record(ItemType::Tool, "echo", "general", vec![0.5]))
            .await
            .unwrap();
        let second = index.get(ItemType::Tool, "echo").await.unwrap();
        assert_eq!(first.created_at, second.created_at);
        assert_eq!(second.embedding.vector, vec![0.5]);
    }

    #[tokio::test]
    async fn search_orders_by_cosine_similarity() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(record(ItemType::Tool, "aligned", "general", vec![1.0, 0.0]))
            .await
            .unwrap();
        index
            .upsert(record(ItemType::Tool, "orthogonal", "general", vec![0.0, 1.0]))
            .await
            .unwrap();
        index
            .upsert(record(ItemType::Tool, "opposed", "general", vec![-1.0, 0.0]))
            .await
            .unwrap();

        let hits = index
            .search(&[1.0, 0.0], &IndexFilter::default(), 3)
            .await
            .unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].name, "aligned");
        assert_eq!(hits[2].name, "opposed");
        assert!(hits[0].score > hits[1].score && hits[1].score > hits[2].score);
        for hit in &hits {
            assert!(hit.score >= 0.0 && hit.score <= 1.0);
        }
    }

    #[tokio::test]
    async fn search_respects_filters_and_k() {
        let index = InMemoryVectorIndex::new();
        for i in 0..10 {
            index
                .upsert(record(
                    ItemType::Tool,
                    &format!("tool_{i}"),
                    if i % 2 == 0 { "even" } else { "odd" },
                    vec![1.0, i as f32 / 10.0],
                ))
                .await
                .unwrap();
        }
        index
            .upsert(record(ItemType::Prompt, "a_prompt", "even", vec![1.0, 0.0]))
            .await
            .unwrap();

        let filter = IndexFilter {
            item_type: Some(ItemType::Tool),
            category: Some("even".to_string()),
            metadata: HashMap::new(),
        };
        let hits = index.search(&[1.0, 0.0], &filter, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits.iter().all(|hit| hit.category == "even"));
        assert!(hits.iter().all(|hit| hit.name.starts_with("tool_")));
    }

    #[tokio::test]
    async fn stats_count_by_item_type() {
        let index = InMemoryVectorIndex::new();
        index
            .upsert(record(ItemType::Tool, "a", "general", vec![1.0]))
            .await
            .unwrap();
        index
            .upsert(record(ItemType::Tool, "b", "general", vec![1.0]))
            .await
            .unwrap();
        index
            .upsert(record(ItemType::Prompt, "c", "general", vec![1.0]))
            .await
            .unwrap();

        let stats = index.stats(&IndexFilter::default()).await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_item_type.get("tool"), Some(&2));
        assert_eq!(stats.by_item_type.get("prompt"), Some(&1));

        let tools_only = index
            .stats(&IndexFilter::for_item_type(ItemType::Tool))
            .await
            .unwrap();
        assert_eq!(tools_only.total, 2);
    }
}
