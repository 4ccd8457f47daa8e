//! Null embedding provider for testing and development
//!
//! Provides deterministic, hash-based embeddings without any external
//! service. A forced-failure switch exercises the selector fallback path
//! in tests.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{EmbeddingProvider, GenerationOptions};
use mcs_domain::value_objects::Embedding;

use crate::constants::EMBEDDING_DIMENSION_NULL;

/// Null embedding provider
///
/// Returns fixed-size vectors with deterministic values derived from the
/// input text, so equal texts always embed identically. Works offline.
pub struct NullEmbeddingProvider {
    failing: AtomicBool,
}

impl NullEmbeddingProvider {
    /// Create a provider that always succeeds
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
        }
    }

    /// Create a provider that reports the upstream as unavailable
    pub fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
        }
    }

    /// Flip the forced-failure switch at runtime
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl Default for NullEmbeddingProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for NullEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::upstream("null embedding provider set to fail"));
        }

        let embeddings = texts
            .iter()
            .map(|text| {
                let hash = text.chars().map(|c| c as u32).sum::<u32>();
                let base_value = (hash % 1000) as f32 / 1000.0;

                let vector = (0..EMBEDDING_DIMENSION_NULL)
                    .map(|j| {
                        let variation = ((hash as f32 + j as f32) * 0.01).sin();
                        (base_value + variation * 0.1).clamp(0.0, 1.0)
                    })
                    .collect();

                Embedding {
                    vector,
                    model: "null".to_string(),
                    dimensions: EMBEDDING_DIMENSION_NULL,
                }
            })
            .collect();

        Ok(embeddings)
    }

    async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<String> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::upstream("null embedding provider set to fail"));
        }
        Ok(format!("[null-generation] {}", prompt.chars().take(64).collect::<String>()))
    }

    fn dimensions(&self) -> usize {
        EMBEDDING_DIMENSION_NULL
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn embeddings_are_deterministic() {
        let provider = NullEmbeddingProvider::new();
        let a = provider.embed("hello world").await.unwrap();
        let b = provider.embed("hello world").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a.dimensions, EMBEDDING_DIMENSION_NULL);
        assert_eq!(a.vector.len(), EMBEDDING_DIMENSION_NULL);
    }

    #[tokio::test]
    async fn different_texts_embed_differently() {
        let provider = NullEmbeddingProvider::new();
        let a = provider.embed("alpha").await.unwrap();
        let b = provider.embed("omega").await.unwrap();
        assert_ne!(a.vector, b.vector);
    }

    #[tokio::test]
    async fn failing_mode_reports_upstream_unavailable() {
        let provider = NullEmbeddingProvider::failing();
        let err = provider.embed("anything").await.unwrap_err();
        assert_eq!(err.kind(), mcs_domain::ErrorKind::UpstreamUnavailable);

        provider.set_failing(false);
        assert!(provider.embed("anything").await.is_ok());
    }
}
