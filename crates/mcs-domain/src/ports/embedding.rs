//! Embedding and generation port
//!
//! Contract for the remote model service that computes embeddings and
//! generates short free-form text. Both operations are billed; providers
//! retry transient failures internally and return typed errors
//! distinguishing `budget_exhausted`, `upstream_unavailable`, and
//! `invalid_argument`.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::Embedding;

/// Options for a text generation call
#[derive(Debug, Clone)]
pub struct GenerationOptions {
    /// Sampling temperature
    pub temperature: f64,
    /// Output token cap
    pub max_tokens: u32,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 256,
        }
    }
}

/// Embedding and generation provider
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a batch of texts, one vector per input in order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    /// Embed a single text
    async fn embed(&self, text: &str) -> Result<Embedding> {
        let mut vectors = self.embed_batch(std::slice::from_ref(&text.to_string())).await?;
        vectors
            .pop()
            .ok_or_else(|| crate::error::Error::upstream("embedding service returned no vector"))
    }

    /// Generate short free-form text from a prompt
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String>;

    /// Dimensionality of vectors produced by this provider
    fn dimensions(&self) -> usize;

    /// Name of this provider implementation
    fn provider_name(&self) -> &str;

    /// Health check for the provider
    async fn health_check(&self) -> Result<()> {
        self.embed("health check").await?;
        Ok(())
    }
}
