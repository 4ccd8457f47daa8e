//! Service directory port
//!
//! Contract for the external directory that enumerates live instances. A
//! directory outage never blocks serving traffic; the agent retries inside
//! its own bounded loop.

use async_trait::async_trait;

use crate::error::Result;
use crate::value_objects::ServiceRegistration;

/// Reported health of an instance, as the directory understands it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceHealth {
    /// Routable
    Passing,
    /// Still registered, but the directory stops routing to it
    Critical,
}

impl InstanceHealth {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Passing => "passing",
            Self::Critical => "critical",
        }
    }
}

/// Service directory client
#[async_trait]
pub trait DirectoryClient: Send + Sync {
    /// Register this instance
    async fn register(&self, registration: &ServiceRegistration) -> Result<()>;

    /// Report the instance health for its TTL check
    async fn report_health(&self, instance_id: &str, health: InstanceHealth) -> Result<()>;

    /// Deregister this instance
    async fn deregister(&self, instance_id: &str) -> Result<()>;

    /// Name of this client implementation
    fn provider_name(&self) -> &str;
}
