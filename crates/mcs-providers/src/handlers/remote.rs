//! Remote HTTP tool handler
//!
//! Realizes a tool capability by POSTing its arguments to a remote
//! endpoint. The remaining deadline travels as a header and bounds the
//! HTTP call; the cancellation signal aborts the request in flight.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{CapabilityHandler, InvocationContext};

use crate::constants::CONTENT_TYPE_JSON;
use crate::utils::HttpResponseUtils;

/// Tool handler backed by a remote HTTP endpoint
pub struct RemoteHttpToolHandler {
    handler_ref: String,
    endpoint: String,
    http_client: Client,
}

impl RemoteHttpToolHandler {
    /// Create a handler posting to the given endpoint
    ///
    /// The `handler_ref` is what tool definitions reference, conventionally
    /// `remote.{name}`.
    pub fn new(handler_ref: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            handler_ref: handler_ref.into(),
            endpoint: endpoint.into(),
            http_client: Client::new(),
        }
    }
}

#[async_trait]
impl CapabilityHandler for RemoteHttpToolHandler {
    async fn invoke(&self, ctx: &InvocationContext, arguments: Value) -> Result<Value> {
        let remaining = ctx.remaining();
        if remaining.is_zero() {
            return Err(Error::timed_out("deadline exhausted before the remote call"));
        }

        let request = self
            .http_client
            .post(&self.endpoint)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .header("X-Request-Id", ctx.request_id.clone())
            .header(
                "X-Deadline-Ms",
                remaining.as_millis().to_string(),
            )
            .timeout(remaining)
            .json(&arguments);

        let response = tokio::select! {
            response = request.send() => response.map_err(|e| {
                HttpResponseUtils::transport_error(e, "remote tool", &format!("{remaining:?}"))
            })?,
            () = ctx.cancel.cancelled() => {
                return Err(Error::cancelled("remote tool call cancelled"));
            }
        };

        HttpResponseUtils::check_and_parse(response, "remote tool").await
    }

    fn handler_ref(&self) -> &str {
        &self.handler_ref
    }
}
