//! Service directory registration
//!
//! The record this process registers with the external service directory,
//! and the health check contract attached to it.

use serde::{Deserialize, Serialize};

/// Health check contract registered alongside the service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    /// Endpoint the directory (or the agent) probes
    pub endpoint: String,
    /// Probe interval in seconds
    pub interval_secs: u64,
    /// Probe timeout in milliseconds
    pub timeout_ms: u64,
    /// Missed-heartbeat window after which the directory reaps the instance
    pub deregister_after_secs: u64,
}

/// Service instance registration record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceRegistration {
    /// Logical service name
    pub service_name: String,
    /// Unique instance identifier: `{service}-{host}-{port}`
    pub instance_id: String,
    /// Advertised host
    pub host: String,
    /// Advertised port
    pub port: u16,
    /// Routing tags
    pub tags: Vec<String>,
    /// Health check contract
    pub health_check: HealthCheckSpec,
}

impl ServiceRegistration {
    /// Build a registration with the canonical instance id
    pub fn new(
        service_name: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        tags: Vec<String>,
        health_check: HealthCheckSpec,
    ) -> Self {
        let service_name = service_name.into();
        let host = host.into();
        Self {
            instance_id: format!("{service_name}-{host}-{port}"),
            service_name,
            host,
            port,
            tags,
            health_check,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instance_id_follows_convention() {
        let reg = ServiceRegistration::new(
            "capability-server",
            "worker-3",
            7423,
            vec!["mcp".to_string()],
            HealthCheckSpec {
                endpoint: "/health".to_string(),
                interval_secs: 10,
                timeout_ms: 3_000,
                deregister_after_secs: 60,
            },
        );
        assert_eq!(reg.instance_id, "capability-server-worker-3-7423");
    }
}
