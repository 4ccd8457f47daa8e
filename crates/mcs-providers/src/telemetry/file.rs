//! File telemetry sink
//!
//! Appends one JSON line per event. Writes are serialized through a
//! mutex; the pipeline already shields callers from sink latency and
//! failure.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use mcs_domain::error::Result;
use mcs_domain::events::TelemetryEvent;
use mcs_domain::ports::TelemetrySink;

/// JSON-lines file telemetry sink
pub struct FileTelemetrySink {
    path: PathBuf,
    file: Mutex<Option<tokio::fs::File>>,
}

impl FileTelemetrySink {
    /// Create a sink appending to the given path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TelemetrySink for FileTelemetrySink {
    async fn emit(&self, event: &TelemetryEvent) -> Result<()> {
        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');

        let mut guard = self.file.lock().await;
        if guard.is_none() {
            if let Some(parent) = self.path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let file = tokio::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .await?;
            *guard = Some(file);
        }
        if let Some(file) = guard.as_mut() {
            file.write_all(&line).await?;
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "file"
    }
}
