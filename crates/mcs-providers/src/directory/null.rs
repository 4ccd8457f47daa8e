//! Null directory client
//!
//! Accepts every call and remembers the last reported state. Used for
//! standalone deployments without a directory, and for agent tests.

use std::sync::Mutex;

use async_trait::async_trait;

use mcs_domain::error::Result;
use mcs_domain::ports::directory::{DirectoryClient, InstanceHealth};
use mcs_domain::value_objects::ServiceRegistration;

/// Null directory client
#[derive(Default)]
pub struct NullDirectoryClient {
    state: Mutex<NullDirectoryState>,
}

/// Observed interactions, for tests
#[derive(Debug, Default, Clone)]
pub struct NullDirectoryState {
    /// Last registration received
    pub registration: Option<ServiceRegistration>,
    /// Health reports received, newest last
    pub health_reports: Vec<String>,
    /// Whether the instance deregistered
    pub deregistered: bool,
}

impl NullDirectoryClient {
    /// Create the null client
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything observed so far
    pub fn state(&self) -> NullDirectoryState {
        self.state.lock().expect("state lock poisoned").clone()
    }
}

#[async_trait]
impl DirectoryClient for NullDirectoryClient {
    async fn register(&self, registration: &ServiceRegistration) -> Result<()> {
        let mut state = self.state.lock().expect("state lock poisoned");
        state.registration = Some(registration.clone());
        state.deregistered = false;
        Ok(())
    }

    async fn report_health(&self, _instance_id: &str, health: InstanceHealth) -> Result<()> {
        self.state
            .lock()
            .expect("state lock poisoned")
            .health_reports
            .push(health.as_str().to_string());
        Ok(())
    }

    async fn deregister(&self, _instance_id: &str) -> Result<()> {
        self.state.lock().expect("state lock poisoned").deregistered = true;
        Ok(())
    }

    fn provider_name(&self) -> &str {
        "null"
    }
}
