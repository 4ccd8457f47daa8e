//! Telemetry sink port
//!
//! Contract for pluggable telemetry destinations. Sink failures are
//! swallowed by the pipeline; a sink must never panic on malformed input.

use async_trait::async_trait;

use crate::error::Result;
use crate::events::TelemetryEvent;

/// Telemetry sink
#[async_trait]
pub trait TelemetrySink: Send + Sync {
    /// Write one event
    async fn emit(&self, event: &TelemetryEvent) -> Result<()>;

    /// Name of this sink implementation
    fn sink_name(&self) -> &str;
}
