//! Capability handler ports
//!
//! Contracts for the code that realizes a capability's behavior: tool
//! handlers and resource readers. Handlers receive a context carrying the
//! deadline and a cancellation signal, and are required to propagate both
//! to downstream calls.

use std::time::Instant;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::value_objects::Claims;

/// Per-invocation context handed to handlers
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Request correlation ID
    pub request_id: String,
    /// Session correlation ID
    pub session_id: String,
    /// Verified caller claims
    pub claims: Claims,
    /// Absolute deadline for the invocation
    pub deadline: Instant,
    /// Cancellation signal; cancelled on client cancel, session close,
    /// deadline expiry, and server shutdown
    pub cancel: CancellationToken,
}

impl InvocationContext {
    /// Time remaining before the deadline
    pub fn remaining(&self) -> std::time::Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    /// Whether the invocation has been cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

/// In-process tool handler
///
/// Resolved by `handler_ref` at dispatch entry. The returned value is
/// serialized against the tool's output schema when one is declared.
#[async_trait]
pub trait CapabilityHandler: Send + Sync {
    /// Execute the tool with validated arguments
    async fn invoke(
        &self,
        ctx: &InvocationContext,
        arguments: serde_json::Value,
    ) -> Result<serde_json::Value>;

    /// Identifier this handler is registered under
    fn handler_ref(&self) -> &str;
}

/// Resource content produced by a reader
#[derive(Debug, Clone)]
pub struct ResourceBody {
    /// Raw content bytes
    pub bytes: Vec<u8>,
    /// Content entity tag, when the reader computes one
    pub etag: Option<String>,
}

/// Resource reader
///
/// Resolved by `reader_ref` at dispatch entry. Readers yield the resource
/// body; large payloads typically come from the blob store.
#[async_trait]
pub trait ResourceReader: Send + Sync {
    /// Read the resource content
    async fn read(&self, ctx: &InvocationContext, uri: &str) -> Result<ResourceBody>;

    /// Identifier this reader is registered under
    fn reader_ref(&self) -> &str;
}
