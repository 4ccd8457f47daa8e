//! Application layer for the MCP Capability Server
//!
//! Orchestrates the capability plane: the authoritative catalog registry,
//! auto-discovery of capability sources, the embedding-backed selector, the
//! invocation dispatcher, the background indexing pipeline, and the service
//! directory agent. Everything here depends on domain ports only; concrete
//! providers are injected at bootstrap.

pub mod directory;
pub mod discovery;
pub mod dispatcher;
pub mod handlers;
pub mod indexing;
pub mod registry;
pub mod retry;
pub mod selector;
pub mod telemetry;

pub use directory::{DirectoryAgent, DirectoryAgentConfig};
pub use discovery::{DiscoveryConfig, DiscoveryReport, DiscoveryService, DiscoverySource};
pub use dispatcher::{Dispatcher, DispatcherConfig, InvocationResult, RequestMeta};
pub use handlers::HandlerRegistry;
pub use indexing::{IndexingConfig, IndexingPipeline};
pub use registry::{CatalogRegistry, ListFilter};
pub use selector::{RerankerMode, Selector, SelectorConfig};
pub use telemetry::TelemetryPipeline;
