//! Domain layer for the MCP Capability Server
//!
//! Core business types and contracts: the capability model (tools, prompts,
//! resources), invocation records, registry change events, telemetry events,
//! and the provider ports implemented by the adapter layer.
//!
//! This crate is dependency-light by design. It knows nothing about
//! transports, configuration, or concrete providers.

pub mod capability;
pub mod constants;
pub mod error;
pub mod events;
pub mod ports;
pub mod value_objects;

pub use error::{Error, ErrorKind, Result};
