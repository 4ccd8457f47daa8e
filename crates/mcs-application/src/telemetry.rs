//! Telemetry pipeline
//!
//! Fans each event out to the configured sinks. A failing sink is logged
//! and skipped; emission never propagates an error into the calling path.

use std::sync::Arc;

use tracing::warn;

use mcs_domain::events::TelemetryEvent;
use mcs_domain::ports::TelemetrySink;

/// Fan-out pipeline over pluggable telemetry sinks
#[derive(Clone, Default)]
pub struct TelemetryPipeline {
    sinks: Vec<Arc<dyn TelemetrySink>>,
}

impl TelemetryPipeline {
    /// Create a pipeline over the given sinks
    pub fn new(sinks: Vec<Arc<dyn TelemetrySink>>) -> Self {
        Self { sinks }
    }

    /// Pipeline that drops every event; used in tests and minimal setups
    pub fn disabled() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Number of configured sinks
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Emit one event to all sinks
    pub async fn emit(&self, event: TelemetryEvent) {
        for sink in &self.sinks {
            if let Err(e) = sink.emit(&event).await {
                warn!(
                    sink = sink.sink_name(),
                    event = event.kind.as_str(),
                    error = %e,
                    "telemetry sink failed; event dropped for this sink"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mcs_domain::error::{Error, Result};
    use mcs_domain::events::TelemetryEventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        emitted: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl TelemetrySink for CountingSink {
        async fn emit(&self, _event: &TelemetryEvent) -> Result<()> {
            if self.fail {
                return Err(Error::upstream("sink offline"));
            }
            self.emitted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn sink_name(&self) -> &str {
            "counting"
        }
    }

    #[tokio::test]
    async fn failing_sink_does_not_block_others() {
        let failing = Arc::new(CountingSink {
            emitted: AtomicUsize::new(0),
            fail: true,
        });
        let healthy = Arc::new(CountingSink {
            emitted: AtomicUsize::new(0),
            fail: false,
        });
        let pipeline = TelemetryPipeline::new(vec![failing.clone(), healthy.clone()]);

        pipeline
            .emit(TelemetryEvent::new(TelemetryEventKind::RequestReceived))
            .await;

        assert_eq!(healthy.emitted.load(Ordering::SeqCst), 1);
        assert_eq!(failing.emitted.load(Ordering::SeqCst), 0);
    }
}
