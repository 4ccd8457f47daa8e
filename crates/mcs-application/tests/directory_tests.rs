//! Directory agent tests: registration, heartbeat state transitions, and
//! shutdown deregistration.

use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use mcs_application::directory::{DirectoryAgent, DirectoryAgentConfig, ReadinessProbe};
use mcs_application::TelemetryPipeline;
use mcs_domain::error::{Error, Result};
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::directory::{DirectoryClient, InstanceHealth};
use mcs_domain::ports::TelemetrySink;
use mcs_domain::value_objects::ServiceRegistration;

/// Probe that fails a configured number of times before recovering
struct FlakyProbe {
    calls: AtomicU32,
    failures: u32,
}

#[async_trait]
impl ReadinessProbe for FlakyProbe {
    async fn check(&self) -> Result<()> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            Err(Error::upstream("not ready"))
        } else {
            Ok(())
        }
    }
}

/// Directory stub tracking calls, with optional registration failures
#[derive(Default)]
struct RecordingDirectory {
    registrations: AtomicUsize,
    deregistrations: AtomicUsize,
    passing: AtomicUsize,
    critical: AtomicUsize,
}

#[async_trait]
impl DirectoryClient for RecordingDirectory {
    async fn register(&self, _registration: &ServiceRegistration) -> Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn report_health(&self, _instance_id: &str, health: InstanceHealth) -> Result<()> {
        match health {
            InstanceHealth::Passing => self.passing.fetch_add(1, Ordering::SeqCst),
            InstanceHealth::Critical => self.critical.fetch_add(1, Ordering::SeqCst),
        };
        Ok(())
    }

    async fn deregister(&self, _instance_id: &str) -> Result<()> {
        self.deregistrations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "recording"
    }
}

/// Sink collecting health_changed statuses
#[derive(Default)]
struct HealthEventSink {
    statuses: std::sync::Mutex<Vec<String>>,
}

#[async_trait]
impl TelemetrySink for HealthEventSink {
    async fn emit(&self, event: &TelemetryEvent) -> Result<()> {
        if event.kind == TelemetryEventKind::HealthChanged {
            if let Some(status) = event.fields.get("status").and_then(|v| v.as_str()) {
                self.statuses.lock().unwrap().push(status.to_string());
            }
        }
        Ok(())
    }

    fn sink_name(&self) -> &str {
        "health-events"
    }
}

fn agent_config() -> DirectoryAgentConfig {
    DirectoryAgentConfig {
        heartbeat_interval: Duration::from_millis(20),
        check_timeout: Duration::from_millis(100),
        consecutive_failures_to_unhealthy: 3,
        ..DirectoryAgentConfig::default()
    }
}

async fn wait_until<F: Fn() -> bool>(condition: F, budget: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + budget;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}

#[tokio::test]
async fn registers_heartbeats_and_deregisters() {
    let directory = Arc::new(RecordingDirectory::default());
    let probe = Arc::new(FlakyProbe {
        calls: AtomicU32::new(0),
        failures: 0,
    });
    let shutdown = CancellationToken::new();

    let agent = DirectoryAgent::new(
        directory.clone(),
        probe,
        TelemetryPipeline::disabled(),
        agent_config(),
    );
    let handle = agent.spawn(shutdown.clone());

    let d = directory.clone();
    assert!(
        wait_until(
            move || d.passing.load(Ordering::SeqCst) >= 3,
            Duration::from_secs(5)
        )
        .await
    );
    assert_eq!(directory.registrations.load(Ordering::SeqCst), 1);
    assert_eq!(directory.critical.load(Ordering::SeqCst), 0);

    shutdown.cancel();
    handle.await.unwrap();
    assert_eq!(directory.deregistrations.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn consecutive_failures_mark_instance_unhealthy_then_recover() {
    let directory = Arc::new(RecordingDirectory::default());
    // Fails the first 10 probes, then recovers
    let probe = Arc::new(FlakyProbe {
        calls: AtomicU32::new(0),
        failures: 10,
    });
    let sink = Arc::new(HealthEventSink::default());
    let shutdown = CancellationToken::new();

    let agent = DirectoryAgent::new(
        directory.clone(),
        probe,
        TelemetryPipeline::new(vec![sink.clone()]),
        agent_config(),
    );
    let handle = agent.spawn(shutdown.clone());

    // Unhealthy after the failure threshold, with critical reports
    let d = directory.clone();
    assert!(
        wait_until(
            move || d.critical.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(5)
        )
        .await
    );

    // Recovery flips it back to passing
    let d = directory.clone();
    assert!(
        wait_until(
            move || d.passing.load(Ordering::SeqCst) >= 1,
            Duration::from_secs(5)
        )
        .await
    );

    let statuses = sink.statuses.lock().unwrap().clone();
    assert_eq!(statuses.first().map(String::as_str), Some("unhealthy"));
    assert!(statuses.iter().any(|s| s == "healthy"));

    shutdown.cancel();
    handle.await.unwrap();
}

#[tokio::test]
async fn directory_outage_never_blocks_shutdown() {
    /// Directory that always fails
    struct DeadDirectory;

    #[async_trait]
    impl DirectoryClient for DeadDirectory {
        async fn register(&self, _registration: &ServiceRegistration) -> Result<()> {
            Err(Error::upstream("directory down"))
        }
        async fn report_health(&self, _id: &str, _health: InstanceHealth) -> Result<()> {
            Err(Error::upstream("directory down"))
        }
        async fn deregister(&self, _id: &str) -> Result<()> {
            Err(Error::upstream("directory down"))
        }
        fn provider_name(&self) -> &str {
            "dead"
        }
    }

    let probe = Arc::new(FlakyProbe {
        calls: AtomicU32::new(0),
        failures: 0,
    });
    let shutdown = CancellationToken::new();
    let agent = DirectoryAgent::new(
        Arc::new(DeadDirectory),
        probe,
        TelemetryPipeline::disabled(),
        agent_config(),
    );
    let handle = agent.spawn(shutdown.clone());

    // Give the agent time to burn through its registration retries
    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    // The agent still terminates despite every directory call failing
    tokio::time::timeout(Duration::from_secs(60), handle)
        .await
        .expect("agent must shut down despite directory outage")
        .unwrap();
}
