//! Remote embedding and generation provider
//!
//! Talks to the embedding service over its OpenAI-shaped REST API:
//! `POST {base}/embeddings` and `POST {base}/chat/completions`. Transient
//! failures retry with exponential backoff; every upstream call emits one
//! billing event to the telemetry pipeline.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use mcs_application::retry::with_default_backoff;
use mcs_application::TelemetryPipeline;
use mcs_domain::error::{Error, Result};
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::{EmbeddingProvider, GenerationOptions};
use mcs_domain::value_objects::Embedding;

use crate::constants::{CHARS_PER_TOKEN_ESTIMATE, CONTENT_TYPE_JSON, EMBEDDING_DIMENSION_DEFAULT};
use crate::utils::HttpResponseUtils;

/// Remote embedding provider configuration
#[derive(Debug, Clone)]
pub struct HttpEmbeddingConfig {
    /// Service base URL
    pub base_url: String,
    /// Bearer token, when the service requires one
    pub api_key: Option<String>,
    /// Embedding model name
    pub model: String,
    /// Generation model name
    pub generation_model: String,
    /// Vector dimensionality of the embedding model
    pub dimensions: usize,
    /// Per-request timeout
    pub timeout: Duration,
    /// Billing rate per 1000 tokens, for the cost estimate
    pub cost_per_1k_tokens_usd: f64,
}

impl Default for HttpEmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8091/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            dimensions: EMBEDDING_DIMENSION_DEFAULT,
            timeout: Duration::from_millis(mcs_domain::constants::DEFAULT_EMBEDDING_TIMEOUT_MS),
            cost_per_1k_tokens_usd: 0.0,
        }
    }
}

/// Remote embedding and generation provider
pub struct HttpEmbeddingProvider {
    config: HttpEmbeddingConfig,
    http_client: Client,
    telemetry: TelemetryPipeline,
}

impl HttpEmbeddingProvider {
    /// Create a provider from configuration
    pub fn new(config: HttpEmbeddingConfig, telemetry: TelemetryPipeline) -> Self {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
            telemetry,
        }
    }

    /// Base URL without a trailing slash
    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    /// Send one authenticated JSON request
    async fn post_json(&self, path: &str, payload: &serde_json::Value) -> Result<serde_json::Value> {
        let mut request = self
            .http_client
            .post(format!("{}{path}", self.base_url()))
            .header("Content-Type", CONTENT_TYPE_JSON)
            .json(payload);
        if let Some(api_key) = &self.config.api_key {
            request = request.header("Authorization", format!("Bearer {api_key}"));
        }

        let response = request.send().await.map_err(|e| {
            HttpResponseUtils::transport_error(
                e,
                "embedding service",
                &format!("{:?}", self.config.timeout),
            )
        })?;
        HttpResponseUtils::check_and_parse(response, "embedding service").await
    }

    /// Emit one billing event for an upstream call
    async fn emit_billing(&self, model: &str, input_tokens: u64, output_tokens: u64) {
        let total = input_tokens + output_tokens;
        let cost = (total as f64 / 1_000.0) * self.config.cost_per_1k_tokens_usd;
        self.telemetry
            .emit(
                TelemetryEvent::new(TelemetryEventKind::InvocationBilled)
                    .with_field("model", model)
                    .with_field("input_tokens", input_tokens)
                    .with_field("output_tokens", output_tokens)
                    .with_field("cost_estimate_usd", cost),
            )
            .await;
    }

    /// Usage block token counts, estimated from text length when absent
    fn usage_tokens(response: &serde_json::Value, texts_chars: usize) -> (u64, u64) {
        let usage = &response["usage"];
        let input = usage["prompt_tokens"]
            .as_u64()
            .unwrap_or((texts_chars / CHARS_PER_TOKEN_ESTIMATE) as u64);
        let output = usage["completion_tokens"].as_u64().unwrap_or(0);
        (input, output)
    }

    /// Parse one embedding vector from a response item
    fn parse_embedding(&self, index: usize, item: &serde_json::Value) -> Result<Embedding> {
        let vector = item["embedding"]
            .as_array()
            .ok_or_else(|| {
                Error::upstream(format!("invalid embedding format for input {index}"))
            })?
            .iter()
            .map(|v| v.as_f64().unwrap_or(0.0) as f32)
            .collect::<Vec<f32>>();

        Ok(Embedding {
            vector,
            model: self.config.model.clone(),
            dimensions: self.config.dimensions,
        })
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingProvider {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        if texts.iter().any(|text| text.trim().is_empty()) {
            return Err(Error::invalid_argument("cannot embed empty text"));
        }

        let payload = serde_json::json!({
            "input": texts,
            "model": self.config.model,
            "encoding_format": "float"
        });
        let response = with_default_backoff("embed_batch", || async {
            self.post_json("/embeddings", &payload).await
        })
        .await?;

        let chars: usize = texts.iter().map(String::len).sum();
        let (input_tokens, output_tokens) = Self::usage_tokens(&response, chars);
        self.emit_billing(&self.config.model, input_tokens, output_tokens)
            .await;

        let data = response["data"]
            .as_array()
            .ok_or_else(|| Error::upstream("invalid response format: missing data array"))?;
        if data.len() != texts.len() {
            return Err(Error::upstream(format!(
                "response count mismatch: expected {}, got {}",
                texts.len(),
                data.len()
            )));
        }

        data.iter()
            .enumerate()
            .map(|(i, item)| self.parse_embedding(i, item))
            .collect()
    }

    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        if prompt.trim().is_empty() {
            return Err(Error::invalid_argument("cannot generate from an empty prompt"));
        }

        let payload = serde_json::json!({
            "model": self.config.generation_model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": options.temperature,
            "max_tokens": options.max_tokens,
        });
        let response = with_default_backoff("generate", || async {
            self.post_json("/chat/completions", &payload).await
        })
        .await?;

        let (input_tokens, output_tokens) = Self::usage_tokens(&response, prompt.len());
        self.emit_billing(&self.config.generation_model, input_tokens, output_tokens)
            .await;

        response["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| Error::upstream("invalid response format: missing message content"))
    }

    fn dimensions(&self) -> usize {
        self.config.dimensions
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
