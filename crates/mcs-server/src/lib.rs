//! MCP Capability Server - transport and protocol layer
//!
//! Translates wire messages into dispatcher, registry, and selector calls.
//! Two surfaces share the same application context: the MCP surface
//! (framed stdio sessions via rmcp, plus JSON-RPC over HTTP) and the admin
//! HTTP surface used by the management portal.

pub mod admin;
pub mod claims;
pub mod init;
pub mod mcp_server;
pub mod transport;
pub mod views;

pub use init::{run, ExitStatus};
pub use mcp_server::McpServer;
