//! Registry change-feed events
//!
//! Every successful catalog mutation emits one event with a strictly
//! increasing sequence number. Subscribers can replay from a sequence
//! number, and per-subscriber delivery is monotonic and gap-free.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::capability::{Capability, CapabilityKind};

/// The kind of catalog mutation an event describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistryChange {
    /// A new capability entered the catalog
    Added,
    /// An existing name was atomically swapped to a new definition
    Replaced,
    /// A capability left the catalog
    Removed,
}

impl RegistryChange {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Replaced => "replaced",
            Self::Removed => "removed",
        }
    }
}

/// One change-feed entry
#[derive(Debug, Clone)]
pub struct RegistryEvent {
    /// Strictly increasing sequence number, gap-free per process
    pub seq: u64,
    /// Mutation kind
    pub change: RegistryChange,
    /// Capability kind affected
    pub kind: CapabilityKind,
    /// Capability name affected
    pub name: String,
    /// The capability after the mutation (before it, for removals)
    pub capability: Arc<Capability>,
    /// Event time
    pub at: DateTime<Utc>,
}
