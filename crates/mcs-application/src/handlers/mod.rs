//! Handler registry
//!
//! Maps opaque `handler_ref` / `reader_ref` identifiers to the in-process
//! code realizing them. Populated at boot and read-only afterwards; the
//! dispatcher resolves refs by value capture at dispatch entry, so catalog
//! mutations never invalidate an in-flight invocation.

pub mod builtin;

use std::collections::HashMap;
use std::sync::Arc;

use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{CapabilityHandler, ResourceReader};

pub use builtin::{EchoHandler, SearchCatalogHandler, ServerInfoReader};

/// Boot-time registry of tool handlers and resource readers
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn CapabilityHandler>>,
    readers: HashMap<String, Arc<dyn ResourceReader>>,
}

impl HandlerRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool handler under its own ref
    ///
    /// Later registrations win, which lets tests shadow builtins.
    pub fn register_handler(&mut self, handler: Arc<dyn CapabilityHandler>) {
        self.handlers
            .insert(handler.handler_ref().to_string(), handler);
    }

    /// Register a resource reader under its own ref
    pub fn register_reader(&mut self, reader: Arc<dyn ResourceReader>) {
        self.readers.insert(reader.reader_ref().to_string(), reader);
    }

    /// Resolve a tool handler by ref
    pub fn resolve_handler(&self, handler_ref: &str) -> Result<Arc<dyn CapabilityHandler>> {
        self.handlers
            .get(handler_ref)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("handler '{handler_ref}'")))
    }

    /// Resolve a resource reader by ref
    pub fn resolve_reader(&self, reader_ref: &str) -> Result<Arc<dyn ResourceReader>> {
        self.readers
            .get(reader_ref)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("reader '{reader_ref}'")))
    }

    /// Registered handler refs, for diagnostics
    pub fn handler_refs(&self) -> Vec<&str> {
        self.handlers.keys().map(String::as_str).collect()
    }

    /// Registered reader refs, for diagnostics
    pub fn reader_refs(&self) -> Vec<&str> {
        self.readers.keys().map(String::as_str).collect()
    }
}
