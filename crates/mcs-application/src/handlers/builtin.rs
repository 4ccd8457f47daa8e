//! Built-in handlers
//!
//! Handlers registered at boot ahead of discovery: the echo diagnostic
//! tool, catalog search wrapping the selector, and the server-info
//! resource.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{CapabilityHandler, InvocationContext, ResourceBody, ResourceReader};
use mcs_domain::value_objects::SelectionRequest;

use crate::selector::Selector;

/// Echo tool handler
///
/// Returns the `msg` argument unchanged. Used for connectivity checks and
/// as the canonical smoke-test tool.
pub struct EchoHandler;

#[async_trait]
impl CapabilityHandler for EchoHandler {
    async fn invoke(&self, _ctx: &InvocationContext, arguments: Value) -> Result<Value> {
        let msg = arguments
            .get("msg")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::invalid_argument("echo requires a 'msg' string"))?;
        Ok(Value::String(msg.to_string()))
    }

    fn handler_ref(&self) -> &str {
        "builtin.echo"
    }
}

/// Catalog search tool handler
///
/// Exposes the selector as a callable tool so MCP clients confined to the
/// tools surface can still run semantic catalog search.
pub struct SearchCatalogHandler {
    selector: Arc<Selector>,
}

impl SearchCatalogHandler {
    /// Create the handler over a selector
    pub fn new(selector: Arc<Selector>) -> Self {
        Self { selector }
    }
}

#[async_trait]
impl CapabilityHandler for SearchCatalogHandler {
    async fn invoke(&self, _ctx: &InvocationContext, arguments: Value) -> Result<Value> {
        let request: SelectionRequest = serde_json::from_value(arguments)
            .map_err(|e| Error::invalid_argument(format!("invalid search arguments: {e}")))?;
        let hits = self.selector.select(request).await?;
        Ok(json!({ "results": hits }))
    }

    fn handler_ref(&self) -> &str {
        "builtin.search_catalog"
    }
}

/// Server-info resource reader
///
/// Yields a JSON document describing this instance.
pub struct ServerInfoReader {
    service_name: String,
    version: String,
    instance_id: String,
}

impl ServerInfoReader {
    /// Create the reader with instance identity
    pub fn new(
        service_name: impl Into<String>,
        version: impl Into<String>,
        instance_id: impl Into<String>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            version: version.into(),
            instance_id: instance_id.into(),
        }
    }
}

#[async_trait]
impl ResourceReader for ServerInfoReader {
    async fn read(&self, _ctx: &InvocationContext, _uri: &str) -> Result<ResourceBody> {
        let body = json!({
            "service": self.service_name,
            "version": self.version,
            "instance_id": self.instance_id,
        });
        let bytes = serde_json::to_vec_pretty(&body)?;
        let etag = mcs_domain::capability::hash::sha256_hex(&bytes);
        Ok(ResourceBody {
            bytes,
            etag: Some(etag),
        })
    }

    fn reader_ref(&self) -> &str {
        "builtin.server_info"
    }
}
