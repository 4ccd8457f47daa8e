//! Provider implementations for the MCP Capability Server
//!
//! Concrete adapters behind the domain ports: embedding and generation
//! clients, vector index clients, blob stores, service directory clients,
//! telemetry sinks, and the remote tool handler. Each concern ships a
//! production implementation plus an in-memory or null variant for
//! development and tests.

pub mod blob_store;
pub mod constants;
pub mod directory;
pub mod embedding;
pub mod handlers;
pub mod telemetry;
pub mod utils;
pub mod vector_index;
