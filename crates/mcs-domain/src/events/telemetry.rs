//! Telemetry event model
//!
//! Flat records with ISO-8601 timestamps and correlation IDs. Events are
//! emitted through the telemetry pipeline; sink failures never abort the
//! emitting path.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a telemetry event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TelemetryEventKind {
    /// A protocol request entered the server
    RequestReceived,
    /// A protocol request reached a terminal state
    RequestCompleted,
    /// An upstream model call was billed
    InvocationBilled,
    /// A discovery pass finished
    DiscoveryRefreshed,
    /// The catalog registry changed
    RegistryChanged,
    /// An embedding record was written (or the write failed non-fatally)
    EmbeddingIndexed,
    /// The instance registered with the service directory
    ServiceRegistered,
    /// The instance health status changed
    HealthChanged,
}

impl TelemetryEventKind {
    /// Stable snake_case label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RequestReceived => "request_received",
            Self::RequestCompleted => "request_completed",
            Self::InvocationBilled => "invocation_billed",
            Self::DiscoveryRefreshed => "discovery_refreshed",
            Self::RegistryChanged => "registry_changed",
            Self::EmbeddingIndexed => "embedding_indexed",
            Self::ServiceRegistered => "service_registered",
            Self::HealthChanged => "health_changed",
        }
    }
}

/// One flat telemetry record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryEvent {
    /// Event kind
    pub kind: TelemetryEventKind,
    /// Event time
    pub at: DateTime<Utc>,
    /// Trace correlation ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trace_id: Option<String>,
    /// Span correlation ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Request correlation ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Session correlation ID
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Flat event attributes
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl TelemetryEvent {
    /// New event stamped with the current time
    pub fn new(kind: TelemetryEventKind) -> Self {
        Self {
            kind,
            at: Utc::now(),
            trace_id: None,
            span_id: None,
            request_id: None,
            session_id: None,
            fields: HashMap::new(),
        }
    }

    /// Attach a request correlation ID
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attach a session correlation ID
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach trace/span correlation IDs
    pub fn with_trace(mut self, trace_id: impl Into<String>, span_id: impl Into<String>) -> Self {
        self.trace_id = Some(trace_id.into());
        self.span_id = Some(span_id.into());
        self
    }

    /// Attach one flat attribute
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }
}
