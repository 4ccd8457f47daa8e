//! Remote vector index client
//!
//! Talks to an external vector store service over a JSON REST API:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | PUT | `/records` | upsert |
//! | DELETE | `/records/{item_type}/{name}` | delete |
//! | GET | `/records/{item_type}/{name}` | get |
//! | POST | `/search` | similarity search |
//! | POST | `/keys` | list keys |
//! | POST | `/stats` | aggregate counts |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::VectorIndexProvider;
use mcs_domain::value_objects::{
    EmbeddingRecord, IndexFilter, IndexStats, ItemType, SearchHit,
};

use crate::constants::CONTENT_TYPE_JSON;
use crate::utils::HttpResponseUtils;

/// Remote vector index configuration
#[derive(Debug, Clone)]
pub struct HttpVectorIndexConfig {
    /// Service base URL
    pub base_url: String,
    /// Bearer token, when the service requires one
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpVectorIndexConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8092".to_string(),
            api_key: None,
            timeout: Duration::from_millis(
                mcs_domain::constants::DEFAULT_VECTOR_SEARCH_TIMEOUT_MS,
            ),
        }
    }
}

/// Remote vector index client
pub struct HttpVectorIndex {
    config: HttpVectorIndexConfig,
    http_client: Client,
}

impl HttpVectorIndex {
    /// Create a client from configuration
    pub fn new(config: HttpVectorIndexConfig) -> Self {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .unwrap_or_default();
        Self {
            config,
            http_client,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn with_auth(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let request = request.header("Content-Type", CONTENT_TYPE_JSON);
        match &self.config.api_key {
            Some(api_key) => request.header("Authorization", format!("Bearer {api_key}")),
            None => request,
        }
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<serde_json::Value> {
        let response = request.send().await.map_err(|e| {
            HttpResponseUtils::transport_error(
                e,
                "vector index",
                &format!("{:?}", self.config.timeout),
            )
        })?;
        HttpResponseUtils::check_and_parse(response, "vector index").await
    }
}

#[async_trait]
impl VectorIndexProvider for HttpVectorIndex {
    async fn upsert(&self, record: EmbeddingRecord) -> Result<()> {
        let request = self
            .with_auth(self.http_client.put(self.url("/records")))
            .json(&record);
        self.send(request).await.map(|_| ())
    }

    async fn delete(&self, item_type: ItemType, name: &str) -> Result<()> {
        let request =
            self.with_auth(self.http_client.delete(self.url(&format!("/records/{item_type}/{name}"))));
        self.send(request).await.map(|_| ())
    }

    async fn get(&self, item_type: ItemType, name: &str) -> Result<EmbeddingRecord> {
        let request =
            self.with_auth(self.http_client.get(self.url(&format!("/records/{item_type}/{name}"))));
        let body = self.send(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    async fn search(
        &self,
        query: &[f32],
        filter: &IndexFilter,
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        let payload = serde_json::json!({
            "vector": query,
            "filter": filter,
            "k": k,
        });
        let request = self
            .with_auth(self.http_client.post(self.url("/search")))
            .json(&payload);
        let body = self.send(request).await?;

        let hits = body
            .get("hits")
            .cloned()
            .ok_or_else(|| Error::upstream("search response missing hits"))?;
        Ok(serde_json::from_value(hits)?)
    }

    async fn list_keys(&self, filter: &IndexFilter) -> Result<Vec<(ItemType, String)>> {
        let request = self
            .with_auth(self.http_client.post(self.url("/keys")))
            .json(&serde_json::json!({ "filter": filter }));
        let body = self.send(request).await?;

        let keys = body
            .get("keys")
            .cloned()
            .ok_or_else(|| Error::upstream("keys response missing keys"))?;
        Ok(serde_json::from_value(keys)?)
    }

    async fn stats(&self, filter: &IndexFilter) -> Result<IndexStats> {
        let request = self
            .with_auth(self.http_client.post(self.url("/stats")))
            .json(&serde_json::json!({ "filter": filter }));
        let body = self.send(request).await?;
        Ok(serde_json::from_value(body)?)
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
