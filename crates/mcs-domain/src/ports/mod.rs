//! Domain ports
//!
//! Contracts implemented by the adapter layer. Application services depend
//! on these traits, never on concrete providers.

pub mod blob_store;
pub mod directory;
pub mod embedding;
pub mod handler;
pub mod telemetry;
pub mod vector_index;

pub use blob_store::BlobStoreProvider;
pub use directory::DirectoryClient;
pub use embedding::{EmbeddingProvider, GenerationOptions};
pub use handler::{CapabilityHandler, InvocationContext, ResourceBody, ResourceReader};
pub use telemetry::TelemetrySink;
pub use vector_index::VectorIndexProvider;
