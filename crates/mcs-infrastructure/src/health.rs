//! Instance health
//!
//! A fixed set of named probes assembled at bootstrap and frozen, the same
//! discipline the handler registry follows. The monitor owns timing and
//! classification: a failing probe *degrades* the instance (dependencies
//! are recoverable and serving continues without them), unless the probe
//! is marked critical, in which case it takes the instance out of
//! rotation. The overall status is the worst of the parts.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mcs_domain::constants::DEFAULT_HEALTH_CHECK_TIMEOUT_MS;
use mcs_domain::error::{Error, Result};

/// Health of the instance or one of its parts
///
/// Variant order is severity order, so folding with `max` yields the
/// worst-of-parts status.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Fully operational
    Ok,
    /// Serving, with at least one dependency impaired
    Degraded,
    /// Out of rotation
    Unhealthy,
}

impl HealthStatus {
    /// Whether the instance should keep receiving traffic
    pub fn is_operational(&self) -> bool {
        *self != Self::Unhealthy
    }
}

/// Probe result for one component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: HealthStatus,
    /// Probe round-trip in milliseconds
    pub latency_ms: u64,
    /// Failure note when the probe did not pass
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Aggregated health of the instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthReport {
    /// Worst status across all probes
    pub status: HealthStatus,
    /// When the probes ran
    pub checked_at: DateTime<Utc>,
    /// Per-component results, ordered by probe name
    pub details: BTreeMap<String, ComponentHealth>,
}

/// One health probe
///
/// A probe answers "can this dependency do its job right now"; the
/// monitor owns timeouts, severity, and aggregation.
#[async_trait::async_trait]
pub trait HealthProbe: Send + Sync {
    /// Succeeds when the component is usable
    async fn probe(&self) -> Result<()>;

    /// Whether a failure takes the whole instance out of rotation
    fn critical(&self) -> bool {
        false
    }
}

/// Frozen set of named probes
pub struct HealthMonitor {
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    probe_timeout: Duration,
}

impl HealthMonitor {
    /// Start assembling a probe set
    pub fn builder() -> HealthMonitorBuilder {
        HealthMonitorBuilder::default()
    }

    /// Run every probe and fold the worst status
    pub async fn report(&self) -> HealthReport {
        let mut report = HealthReport {
            status: HealthStatus::Ok,
            checked_at: Utc::now(),
            details: BTreeMap::new(),
        };

        for (name, probe) in &self.probes {
            let started = Instant::now();
            let outcome = tokio::time::timeout(self.probe_timeout, probe.probe()).await;
            let component = Self::classify(outcome, probe.critical(), started.elapsed());
            report.status = report.status.max(component.status);
            report.details.insert(name.clone(), component);
        }
        report
    }

    /// Whether the instance should keep receiving traffic
    pub async fn ready(&self) -> bool {
        self.report().await.status.is_operational()
    }

    /// Names of the configured probes
    pub fn probe_names(&self) -> Vec<&str> {
        self.probes.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Map one probe outcome onto component health
    fn classify(
        outcome: std::result::Result<Result<()>, tokio::time::error::Elapsed>,
        critical: bool,
        elapsed: Duration,
    ) -> ComponentHealth {
        let failure_status = if critical {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Degraded
        };
        let (status, note) = match outcome {
            Ok(Ok(())) => (HealthStatus::Ok, None),
            Ok(Err(e)) => (failure_status, Some(e.to_string())),
            Err(_) => (failure_status, Some("probe timed out".to_string())),
        };
        ComponentHealth {
            status,
            latency_ms: elapsed.as_millis() as u64,
            note,
        }
    }
}

/// Builder collecting the boot-time probe set
#[derive(Default)]
pub struct HealthMonitorBuilder {
    probes: Vec<(String, Arc<dyn HealthProbe>)>,
    probe_timeout: Option<Duration>,
}

impl HealthMonitorBuilder {
    /// Add a named probe
    pub fn probe(mut self, name: impl Into<String>, probe: impl HealthProbe + 'static) -> Self {
        self.probes.push((name.into(), Arc::new(probe)));
        self
    }

    /// Override the per-probe timeout
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = Some(timeout);
        self
    }

    /// Freeze the probe set
    pub fn build(self) -> HealthMonitor {
        HealthMonitor {
            probes: self.probes,
            probe_timeout: self
                .probe_timeout
                .unwrap_or(Duration::from_millis(DEFAULT_HEALTH_CHECK_TIMEOUT_MS)),
        }
    }
}

/// Readiness probe over the monitor, for the directory agent heartbeat
pub struct MonitorReadinessProbe {
    monitor: Arc<HealthMonitor>,
}

impl MonitorReadinessProbe {
    /// Create a probe over a shared monitor
    pub fn new(monitor: Arc<HealthMonitor>) -> Self {
        Self { monitor }
    }
}

#[async_trait::async_trait]
impl mcs_application::directory::ReadinessProbe for MonitorReadinessProbe {
    async fn check(&self) -> Result<()> {
        if self.monitor.ready().await {
            Ok(())
        } else {
            Err(Error::internal("instance health is unhealthy"))
        }
    }
}

/// Built-in probes
pub mod probes {
    use super::*;
    use mcs_domain::ports::{EmbeddingProvider, VectorIndexProvider};

    /// Embedding service probe
    ///
    /// Not critical: without embeddings the selector degrades to
    /// rule-based ranking but the server keeps serving.
    pub struct EmbeddingProbe {
        provider: Arc<dyn EmbeddingProvider>,
    }

    impl EmbeddingProbe {
        /// Create a probe over the embedding provider
        pub fn new(provider: Arc<dyn EmbeddingProvider>) -> Self {
            Self { provider }
        }
    }

    #[async_trait::async_trait]
    impl HealthProbe for EmbeddingProbe {
        async fn probe(&self) -> Result<()> {
            self.provider.health_check().await
        }
    }

    /// Vector index probe
    ///
    /// Not critical for the same reason: search falls back, dispatch is
    /// unaffected.
    pub struct VectorIndexProbe {
        provider: Arc<dyn VectorIndexProvider>,
    }

    impl VectorIndexProbe {
        /// Create a probe over the vector index
        pub fn new(provider: Arc<dyn VectorIndexProvider>) -> Self {
            Self { provider }
        }
    }

    #[async_trait::async_trait]
    impl HealthProbe for VectorIndexProbe {
        async fn probe(&self) -> Result<()> {
            self.provider.health_check().await
        }
    }

    /// Memory pressure probe
    ///
    /// Fails once used memory crosses the configured fraction of total.
    /// A single refresh is enough for memory, unlike CPU sampling.
    pub struct MemoryPressureProbe {
        max_used_fraction: f64,
    }

    impl Default for MemoryPressureProbe {
        fn default() -> Self {
            Self::new()
        }
    }

    impl MemoryPressureProbe {
        /// Create with the default 0.9 used-memory limit
        pub fn new() -> Self {
            Self {
                max_used_fraction: 0.9,
            }
        }

        /// Create with a custom used-memory limit in (0, 1]
        pub fn with_limit(max_used_fraction: f64) -> Self {
            Self { max_used_fraction }
        }
    }

    #[async_trait::async_trait]
    impl HealthProbe for MemoryPressureProbe {
        async fn probe(&self) -> Result<()> {
            use sysinfo::{MemoryRefreshKind, RefreshKind, System};

            let sys = System::new_with_specifics(
                RefreshKind::nothing().with_memory(MemoryRefreshKind::everything()),
            );
            let total = sys.total_memory();
            if total == 0 {
                return Ok(());
            }

            let used_fraction = sys.used_memory() as f64 / total as f64;
            if used_fraction > self.max_used_fraction {
                return Err(Error::internal(format!(
                    "memory pressure: {:.0}% used exceeds the {:.0}% limit",
                    used_fraction * 100.0,
                    self.max_used_fraction * 100.0
                )));
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProbe {
        result: Result<()>,
        critical: bool,
    }

    impl FixedProbe {
        fn passing() -> Self {
            Self {
                result: Ok(()),
                critical: false,
            }
        }

        fn failing(critical: bool) -> Self {
            Self {
                result: Err(Error::upstream("dependency down")),
                critical,
            }
        }
    }

    #[async_trait::async_trait]
    impl HealthProbe for FixedProbe {
        async fn probe(&self) -> Result<()> {
            match &self.result {
                Ok(()) => Ok(()),
                Err(e) => Err(Error::upstream(e.to_string())),
            }
        }

        fn critical(&self) -> bool {
            self.critical
        }
    }

    #[tokio::test]
    async fn empty_monitor_reports_ok() {
        let monitor = HealthMonitor::builder().build();
        let report = monitor.report().await;
        assert_eq!(report.status, HealthStatus::Ok);
        assert!(report.details.is_empty());
        assert!(monitor.ready().await);
    }

    #[tokio::test]
    async fn failing_dependency_degrades_but_stays_operational() {
        let monitor = HealthMonitor::builder()
            .probe("embedding", FixedProbe::failing(false))
            .probe("vector_index", FixedProbe::passing())
            .build();

        let report = monitor.report().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert!(report.status.is_operational());
        assert_eq!(report.details["embedding"].status, HealthStatus::Degraded);
        assert!(report.details["embedding"].note.is_some());
        assert_eq!(report.details["vector_index"].status, HealthStatus::Ok);
    }

    #[tokio::test]
    async fn critical_failure_takes_the_instance_out_of_rotation() {
        let monitor = HealthMonitor::builder()
            .probe("embedding", FixedProbe::passing())
            .probe("catalog", FixedProbe::failing(true))
            .build();

        let report = monitor.report().await;
        assert_eq!(report.status, HealthStatus::Unhealthy);
        assert!(!monitor.ready().await);
    }

    #[tokio::test]
    async fn slow_probe_is_classified_by_the_monitor_timeout() {
        struct StuckProbe;

        #[async_trait::async_trait]
        impl HealthProbe for StuckProbe {
            async fn probe(&self) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(())
            }
        }

        let monitor = HealthMonitor::builder()
            .probe("stuck", StuckProbe)
            .probe_timeout(Duration::from_millis(50))
            .build();

        let report = monitor.report().await;
        assert_eq!(report.status, HealthStatus::Degraded);
        assert_eq!(
            report.details["stuck"].note.as_deref(),
            Some("probe timed out")
        );
    }

    #[test]
    fn statuses_serialize_to_wire_labels() {
        assert_eq!(serde_json::to_string(&HealthStatus::Ok).unwrap(), "\"ok\"");
        assert_eq!(
            serde_json::to_string(&HealthStatus::Degraded).unwrap(),
            "\"degraded\""
        );
        assert_eq!(
            serde_json::to_string(&HealthStatus::Unhealthy).unwrap(),
            "\"unhealthy\""
        );
    }

    #[test]
    fn severity_folds_with_max() {
        assert_eq!(
            HealthStatus::Ok.max(HealthStatus::Degraded),
            HealthStatus::Degraded
        );
        assert_eq!(
            HealthStatus::Degraded.max(HealthStatus::Unhealthy),
            HealthStatus::Unhealthy
        );
    }
}
