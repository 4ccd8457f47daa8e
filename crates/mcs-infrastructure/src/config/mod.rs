//! Configuration
//!
//! Typed configuration sections, the figment-based loader, and the plain
//! environment-variable overlay.

pub mod loader;
pub mod types;

pub use loader::ConfigLoader;
pub use types::{
    AppConfig, BlobStoreSettings, BootConfig, DirectorySettings, DispatcherSettings,
    EmbeddingSettings, IndexingSettings, LogFormat, LoggingConfig, ProvidersConfig,
    RemoteToolSettings, SelectorSettings, ServerConfig, TelemetrySettings, TransportMode,
    VectorIndexSettings,
};
