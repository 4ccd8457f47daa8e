//! Remote service directory client
//!
//! Speaks a Consul-style agent API:
//!
//! | Method | Path | Operation |
//! |--------|------|-----------|
//! | PUT | `/v1/agent/service/register` | register |
//! | PUT | `/v1/agent/check/update/service:{id}` | TTL health report |
//! | PUT | `/v1/agent/service/deregister/{id}` | deregister |

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;

use mcs_domain::error::Result;
use mcs_domain::ports::directory::{DirectoryClient, InstanceHealth};
use mcs_domain::value_objects::ServiceRegistration;

use crate::utils::HttpResponseUtils;

/// Remote directory client configuration
#[derive(Debug, Clone)]
pub struct HttpDirectoryConfig {
    /// Directory base URL
    pub base_url: String,
    /// Access token, when the directory requires one
    pub token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for HttpDirectoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8500".to_string(),
            token: None,
            timeout: Duration::from_millis(
                mcs_domain::constants::DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            ),
        }
    }
}

/// Remote directory client
pub struct HttpDirectoryClient {
    config: HttpDirectoryConfig,
    http_client: Client,
}

impl HttpDirectoryClient {
    /// Create a client from configuration
    pub fn new(config: HttpDirectoryConfig) -> Self {
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

    async fn put(&self, path: &str, body: Option<serde_json::Value>) -> Result<()> {
        let mut request = self.http_client.put(self.url(path));
        if let Some(token) = &self.config.token {
            request = request.header("X-Consul-Token", token);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(|e| {
            HttpResponseUtils::transport_error(
                e,
                "service directory",
                &format!("{:?}", self.config.timeout),
            )
        })?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HttpResponseUtils::status_error(
                status,
                "service directory",
                &body,
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl DirectoryClient for HttpDirectoryClient {
    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let payload = json!({
            "ID": registration.instance_id,
            "Name": registration.service_name,
            "Address": registration.host,
            "Port": registration.port,
            "Tags": registration.tags,
            "Check": {
                "CheckID": format!("service:{}", registration.instance_id),
                "TTL": format!("{}s", registration.health_check.deregister_after_secs),
                "DeregisterCriticalServiceAfter":
                    format!("{}s", registration.health_check.deregister_after_secs),
            }
        });
        self.put("/v1/agent/service/register", Some(payload)).await
    }

    async fn report_health(&self, instance_id: &str, health: InstanceHealth) -> Result<()> {
        let payload = json!({
            "Status": health.as_str(),
            "Output": format!("capability server TTL report: {}", health.as_str()),
        });
        self.put(
            &format!("/v1/agent/check/update/service:{instance_id}"),
            Some(payload),
        )
        .await
    }

    async fn deregister(&self, instance_id: &str) -> Result<()> {
        self.put(&format!("/v1/agent/service/deregister/{instance_id}"), None)
            .await
    }

    fn provider_name(&self) -> &str {
        "http"
    }
}
