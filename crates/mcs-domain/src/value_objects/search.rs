//! Selector value objects
//!
//! Input and output shapes of catalog selection: the caller's intent plus
//! filters in, scored capability references out.

use serde::{Deserialize, Serialize};

use crate::capability::CapabilityKind;

/// A selection request against the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionRequest {
    /// Free-form user intent
    pub query: String,
    /// Restrict to one capability kind
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<CapabilityKind>,
    /// Restrict to a category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Result count, clamped to [1, 50]
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    5
}

/// One scored selection result
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// Capability kind
    pub kind: CapabilityKind,
    /// Capability name
    pub name: String,
    /// Category label
    pub category: String,
    /// Description text
    pub description: String,
    /// Relevance score in [0, 1]
    pub score: f64,
}
