//! MCP Transport Layer
//!
//! | Transport | Description | Use Case |
//! |-----------|-------------|----------|
//! | [`stdio`] | Framed MCP over stdin/stdout via rmcp | CLI tools, IDE integrations |
//! | [`http`]  | JSON-RPC over HTTP plus the admin surface | Web clients, fleets |
//!
//! Transport selection happens at initialization based on
//! `server.transport_mode`; hybrid mode runs both concurrently.

pub mod http;
pub mod stdio;
pub mod types;

pub use http::{build_router, serve_http};
pub use types::{McpRequest, McpResponse, McpWireError};
