//! Handler adapters
//!
//! Handlers whose implementations live outside the process: remote HTTP
//! tools and blob-backed resource readers.

pub mod blob_reader;
pub mod remote;

pub use blob_reader::BlobResourceReader;
pub use remote::RemoteHttpToolHandler;
