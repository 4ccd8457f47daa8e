//! Transport layer types
//!
//! JSON-RPC message shapes shared by the HTTP transport and its tests.

use serde::{Deserialize, Serialize};

use mcs_domain::error::{Error, ErrorKind};

/// MCP request payload (JSON-RPC format)
#[derive(Debug, Deserialize)]
pub struct McpRequest {
    /// JSON-RPC method
    pub method: String,
    /// Request parameters
    pub params: Option<serde_json::Value>,
    /// Request ID
    pub id: Option<serde_json::Value>,
}

/// MCP response payload (JSON-RPC format)
#[derive(Debug, Serialize)]
pub struct McpResponse {
    /// JSON-RPC version
    pub jsonrpc: &'static str,
    /// Response result (if successful)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    /// Error (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<McpWireError>,
    /// Request ID
    pub id: Option<serde_json::Value>,
}

/// MCP error response (JSON-RPC format)
#[derive(Debug, Serialize)]
pub struct McpWireError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
    /// Structured error details; carries the taxonomy kind
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl McpResponse {
    /// Create a success response
    pub fn success(id: Option<serde_json::Value>, result: serde_json::Value) -> Self {
        Self {
            jsonrpc: "2.0",
            result: Some(result),
            error: None,
            id,
        }
    }

    /// Create an error response
    pub fn error(id: Option<serde_json::Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(McpWireError {
                code,
                message: message.into(),
                data: None,
            }),
            id,
        }
    }

    /// Create an error response from a domain error
    pub fn from_domain_error(id: Option<serde_json::Value>, error: &Error) -> Self {
        let kind = error.kind();
        let mut data = serde_json::json!({ "kind": kind.as_str() });
        if let Error::Overloaded {
            retry_after_ms: Some(retry_after_ms),
            ..
        } = error
        {
            data["retry_after_ms"] = serde_json::json!(retry_after_ms);
        }

        Self {
            jsonrpc: "2.0",
            result: None,
            error: Some(McpWireError {
                code: jsonrpc_code(kind),
                message: error.to_string(),
                data: Some(data),
            }),
            id,
        }
    }
}

/// JSON-RPC error code for a taxonomy kind
pub fn jsonrpc_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::InvalidArgument => -32602,
        ErrorKind::NotFound => -32002,
        ErrorKind::Internal => -32603,
        // Server-defined range for the remaining kinds; the taxonomy kind
        // travels in error.data
        _ => -32000,
    }
}
