//! Null telemetry sink

use async_trait::async_trait;

use mcs_domain::error::Result;
use mcs_domain::events::TelemetryEvent;
use mcs_domain::ports::TelemetrySink;

/// Sink that drops every event
#[derive(Default)]
pub struct NullTelemetrySink;

impl NullTelemetrySink {
    /// Create the sink
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl TelemetrySink for NullTelemetrySink {
    async fn emit(&self, _event: &TelemetryEvent) -> Result<()> {
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "null"
    }
}
