//! Infrastructure layer for the MCP Capability Server
//!
//! Cross-cutting technical concerns: configuration loading and validation,
//! structured logging, the health monitor, and the bootstrap that resolves
//! providers from configuration and wires the application services.

pub mod bootstrap;
pub mod config;
pub mod health;
pub mod logging;

pub use bootstrap::{init_app, AppContext};
pub use config::{AppConfig, ConfigLoader};
