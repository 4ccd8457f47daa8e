//! Service directory agent
//!
//! Registers this process with the external directory once it is ready,
//! runs liveness heartbeats on an interval, and deregisters on shutdown.
//! The agent retries inside its own bounded loop; a directory outage never
//! blocks serving traffic.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use mcs_domain::constants::DEFAULT_HEALTH_CHECK_TIMEOUT_MS;
use mcs_domain::error::Result;
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::directory::{DirectoryClient, InstanceHealth};
use mcs_domain::value_objects::{HealthCheckSpec, ServiceRegistration};

use crate::retry::{with_backoff, BackoffPolicy};
use crate::telemetry::TelemetryPipeline;

/// Local readiness probe the agent runs on its heartbeat interval
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// Succeeds when the instance should keep receiving traffic
    async fn check(&self) -> Result<()>;
}

/// Directory agent configuration
#[derive(Debug, Clone)]
pub struct DirectoryAgentConfig {
    /// Logical service name
    pub service_name: String,
    /// Advertised host
    pub host: String,
    /// Advertised port
    pub port: u16,
    /// Routing tags
    pub tags: Vec<String>,
    /// Heartbeat interval
    pub heartbeat_interval: Duration,
    /// Per-probe timeout
    pub check_timeout: Duration,
    /// Missed-heartbeat window after which the directory reaps the instance
    pub deregister_after: Duration,
    /// Probe failures in a row before the instance reports unhealthy
    pub consecutive_failures_to_unhealthy: u32,
}

impl Default for DirectoryAgentConfig {
    fn default() -> Self {
        Self {
            service_name: "capability-server".to_string(),
            host: "127.0.0.1".to_string(),
            port: 7423,
            tags: vec!["mcp".to_string()],
            heartbeat_interval: Duration::from_secs(10),
            check_timeout: Duration::from_millis(DEFAULT_HEALTH_CHECK_TIMEOUT_MS),
            deregister_after: Duration::from_secs(60),
            consecutive_failures_to_unhealthy: 3,
        }
    }
}

impl DirectoryAgentConfig {
    /// The registration record this configuration describes
    pub fn registration(&self) -> ServiceRegistration {
        ServiceRegistration::new(
            self.service_name.clone(),
            self.host.clone(),
            self.port,
            self.tags.clone(),
            HealthCheckSpec {
                endpoint: "/health".to_string(),
                interval_secs: self.heartbeat_interval.as_secs(),
                timeout_ms: self.check_timeout.as_millis() as u64,
                deregister_after_secs: self.deregister_after.as_secs(),
            },
        )
    }
}

/// Background registration and heartbeat agent
pub struct DirectoryAgent {
    client: Arc<dyn DirectoryClient>,
    probe: Arc<dyn ReadinessProbe>,
    telemetry: TelemetryPipeline,
    config: DirectoryAgentConfig,
}

impl DirectoryAgent {
    /// Create an agent over a directory client and readiness probe
    pub fn new(
        client: Arc<dyn DirectoryClient>,
        probe: Arc<dyn ReadinessProbe>,
        telemetry: TelemetryPipeline,
        config: DirectoryAgentConfig,
    ) -> Self {
        Self {
            client,
            probe,
            telemetry,
            config,
        }
    }

    /// Start the agent
    ///
    /// Call after readiness: listener bound and the first discovery pass
    /// done. The task registers, heartbeats until `shutdown` fires, then
    /// deregisters. Deregistration failure is logged and ignored.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    async fn run(self, shutdown: CancellationToken) {
        let registration = self.config.registration();

        let registered = with_backoff("directory_register", BackoffPolicy::default(), || {
            let client = Arc::clone(&self.client);
            let registration = registration.clone();
            async move { client.register(&registration).await }
        })
        .await;

        match registered {
            Ok(()) => {
                info!(
                    instance_id = %registration.instance_id,
                    directory = self.client.provider_name(),
                    "registered with service directory"
                );
                self.telemetry
                    .emit(
                        TelemetryEvent::new(TelemetryEventKind::ServiceRegistered)
                            .with_field("instance_id", registration.instance_id.as_str())
                            .with_field("service", registration.service_name.as_str()),
                    )
                    .await;
            }
            Err(e) => {
                // Keep heartbeating; the directory may come back and the
                // TTL pass doubles as a re-registration probe.
                warn!(error = %e, "service directory registration failed; continuing without it");
            }
        }

        self.heartbeat_loop(&registration, &shutdown).await;

        let deregistered = with_backoff("directory_deregister", BackoffPolicy::default(), || {
            let client = Arc::clone(&self.client);
            let instance_id = registration.instance_id.clone();
            async move { client.deregister(&instance_id).await }
        })
        .await;
        if let Err(e) = deregistered {
            warn!(
                instance_id = %registration.instance_id,
                error = %e,
                "service directory deregistration failed; directory will reap the instance"
            );
        } else {
            info!(instance_id = %registration.instance_id, "deregistered from service directory");
        }
    }

    async fn heartbeat_loop(&self, registration: &ServiceRegistration, shutdown: &CancellationToken) {
        let mut interval = tokio::time::interval(self.config.heartbeat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let mut consecutive_failures: u32 = 0;
        let mut reported_unhealthy = false;

        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                _ = interval.tick() => {}
            }

            let probe = tokio::time::timeout(self.config.check_timeout, self.probe.check()).await;
            let healthy = matches!(probe, Ok(Ok(())));

            if healthy {
                consecutive_failures = 0;
                if reported_unhealthy {
                    reported_unhealthy = false;
                    info!("instance recovered; reporting healthy to directory");
                    self.emit_health_changed("healthy").await;
                }
                self.report(registration, InstanceHealth::Passing).await;
            } else {
                consecutive_failures = consecutive_failures.saturating_add(1);
                debug!(consecutive_failures, "readiness probe failed");
                if consecutive_failures >= self.config.consecutive_failures_to_unhealthy {
                    if !reported_unhealthy {
                        reported_unhealthy = true;
                        warn!(
                            consecutive_failures,
                            "marking instance unhealthy; directory stops routing but keeps the registration"
                        );
                        self.emit_health_changed("unhealthy").await;
                    }
                    self.report(registration, InstanceHealth::Critical).await;
                }
            }
        }
    }

    /// Push one health report, tolerating directory failures
    async fn report(&self, registration: &ServiceRegistration, health: InstanceHealth) {
        if let Err(e) = self
            .client
            .report_health(&registration.instance_id, health)
            .await
        {
            debug!(error = %e, "health report did not reach the directory");
        }
    }

    async fn emit_health_changed(&self, status: &str) {
        self.telemetry
            .emit(
                TelemetryEvent::new(TelemetryEventKind::HealthChanged)
                    .with_field("status", status)
                    .with_field("service", self.config.service_name.as_str()),
            )
            .await;
    }
}
