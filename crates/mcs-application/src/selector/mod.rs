//! Selector
//!
//! Answers "which catalog entries match this intent" with a two-stage
//! embedding pipeline and a rule-based fallback. The selector runs in the
//! request path but never blocks dispatch: the semantic path has a hard
//! time budget, and on timeout or upstream failure the rule-based ranking
//! runs synchronously over a registry snapshot.

pub mod rule_based;

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use mcs_domain::constants::{
    DEFAULT_SELECTOR_MIN_RESULTS, DEFAULT_SELECTOR_TIMEOUT_MS, SELECTOR_MAX_K,
    SELECTOR_SCORE_FLOOR,
};
use mcs_domain::error::{Error, ErrorKind, Result};
use mcs_domain::ports::{EmbeddingProvider, GenerationOptions, VectorIndexProvider};
use mcs_domain::value_objects::{IndexFilter, ItemType, SearchHit, SelectionRequest};

use crate::registry::{CatalogRegistry, ListFilter};

/// Reranker applied between coarse recall and truncation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RerankerMode {
    /// Keep cosine order
    #[default]
    None,
    /// Ask the generation endpoint to reorder candidates
    Generate,
}

/// Selector tuning knobs
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    /// Hard budget for the semantic path
    pub timeout: Duration,
    /// Results kept even below the score floor
    pub min_results: usize,
    /// Hits below this final score are dropped
    pub score_floor: f64,
    /// Reranker stage selection
    pub reranker: RerankerMode,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_millis(DEFAULT_SELECTOR_TIMEOUT_MS),
            min_results: DEFAULT_SELECTOR_MIN_RESULTS,
            score_floor: SELECTOR_SCORE_FLOOR,
            reranker: RerankerMode::None,
        }
    }
}

/// Embedding-backed catalog selector with rule-based fallback
pub struct Selector {
    registry: Arc<CatalogRegistry>,
    embedding: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexProvider>,
    config: SelectorConfig,
}

impl Selector {
    /// Create a selector over the registry and search providers
    pub fn new(
        registry: Arc<CatalogRegistry>,
        embedding: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexProvider>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            registry,
            embedding,
            index,
            config,
        }
    }

    /// Select the best-matching catalog entries for an intent
    pub async fn select(&self, request: SelectionRequest) -> Result<Vec<SearchHit>> {
        if request.query.trim().is_empty() {
            return Err(Error::invalid_argument("query must not be empty"));
        }
        let k = request.k.clamp(1, SELECTOR_MAX_K);

        let semantic = tokio::time::timeout(self.config.timeout, self.semantic_path(&request, k));
        let hits = match semantic.await {
            // An empty recall usually means indexing has not settled yet;
            // the rule-based ranking still sees the whole catalog
            Ok(Ok(hits)) if hits.is_empty() => self.rule_based(&request),
            Ok(Ok(hits)) => hits,
            Ok(Err(e)) if matches!(e.kind(), ErrorKind::UpstreamUnavailable | ErrorKind::TimedOut | ErrorKind::BudgetExhausted) => {
                debug!(error = %e, "semantic selection unavailable; using rule-based fallback");
                self.rule_based(&request)
            }
            Ok(Err(e)) => return Err(e),
            Err(_) => {
                warn!(
                    budget_ms = self.config.timeout.as_millis() as u64,
                    "selector budget exceeded; using rule-based fallback"
                );
                self.rule_based(&request)
            }
        };

        Ok(self.finalize(hits, k))
    }

    /// Embed the query, recall coarsely, then rerank
    async fn semantic_path(&self, request: &SelectionRequest, k: usize) -> Result<Vec<SearchHit>> {
        let embedding = self.embedding.embed(&request.query).await?.normalized();

        let filter = IndexFilter {
            item_type: request.kind.map(|kind| match kind {
                mcs_domain::capability::CapabilityKind::Tool => ItemType::Tool,
                mcs_domain::capability::CapabilityKind::Prompt => ItemType::Prompt,
                mcs_domain::capability::CapabilityKind::Resource => ItemType::Resource,
            }),
            category: request.category.clone(),
            metadata: Default::default(),
        };

        // Coarse recall over-fetches so the reranker has room to work
        let candidates = self.index.search(&embedding.vector, &filter, k * 4).await?;

        match self.config.reranker {
            RerankerMode::None => Ok(candidates),
            RerankerMode::Generate => Ok(self.rerank(&request.query, candidates).await),
        }
    }

    /// Reorder candidates via the generation endpoint
    ///
    /// Best effort: any failure keeps the cosine order.
    async fn rerank(&self, query: &str, candidates: Vec<SearchHit>) -> Vec<SearchHit> {
        if candidates.len() < 2 {
            return candidates;
        }

        let listing = candidates
            .iter()
            .enumerate()
            .map(|(i, hit)| format!("{i}: {} - {}", hit.name, hit.description))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "Rank these capabilities by relevance to the request.\n\
             Request: {query}\n\
             Capabilities:\n{listing}\n\
             Respond with a JSON array of indices, most relevant first."
        );

        let options = GenerationOptions {
            temperature: 0.0,
            max_tokens: 128,
        };
        match self.embedding.generate(&prompt, &options).await {
            Ok(text) => match serde_json::from_str::<Vec<usize>>(text.trim()) {
                Ok(order) if !order.is_empty() => {
                    let mut reordered = Vec::with_capacity(candidates.len());
                    let mut taken = vec![false; candidates.len()];
                    for index in order {
                        if let Some(hit) = candidates.get(index) {
                            if !taken[index] {
                                taken[index] = true;
                                reordered.push(hit.clone());
                            }
                        }
                    }
                    for (index, hit) in candidates.iter().enumerate() {
                        if !taken[index] {
                            reordered.push(hit.clone());
                        }
                    }
                    reordered
                }
                _ => candidates,
            },
            Err(e) => {
                debug!(error = %e, "reranker unavailable; keeping cosine order");
                candidates
            }
        }
    }

    /// Rule-based ranking over a registry snapshot
    fn rule_based(&self, request: &SelectionRequest) -> Vec<SearchHit> {
        let filter = ListFilter {
            category: request.category.clone(),
        };
        let snapshot = self.registry.list(request.kind, &filter);
        rule_based::rank(&snapshot, &request.query)
    }

    /// Truncate to `k` and apply the score floor
    fn finalize(&self, hits: Vec<SearchHit>, k: usize) -> Vec<SearchHit> {
        let mut out = Vec::with_capacity(k.min(hits.len()));
        for hit in hits.into_iter().take(k) {
            if hit.score >= self.config.score_floor || out.len() < self.config.min_results {
                out.push(hit);
            }
        }
        out
    }
}
