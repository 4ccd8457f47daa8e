//! Stdout telemetry sink
//!
//! Emits every event as one structured log line through the tracing
//! subscriber, which handles formatting (text or JSON) and routing.

use async_trait::async_trait;
use tracing::info;

use mcs_domain::error::Result;
use mcs_domain::events::TelemetryEvent;
use mcs_domain::ports::TelemetrySink;

/// Stdout (tracing) telemetry sink
#[derive(Default)]
pub struct StdoutTelemetrySink;

impl StdoutTelemetrySink {
    /// Create the sink
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TelemetrySink for StdoutTelemetrySink {
    async fn emit(&self, event: &TelemetryEvent) -> Result<()> {
        let fields = serde_json::to_string(&event.fields).unwrap_or_default();
        info!(
            target: "telemetry",
            event = event.kind.as_str(),
            at = %event.at.to_rfc3339(),
            request_id = event.request_id.as_deref().unwrap_or(""),
            session_id = event.session_id.as_deref().unwrap_or(""),
            trace_id = event.trace_id.as_deref().unwrap_or(""),
            fields = %fields,
            "telemetry event"
        );
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "stdout"
    }
}
