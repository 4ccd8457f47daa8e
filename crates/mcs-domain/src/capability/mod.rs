//! Capability model
//!
//! The common envelope shared by tools, prompts, and resources, plus the
//! kind-specific payloads. A capability describes how it is *described*,
//! *validated*, and *invoked*; the three kinds supply the concrete parts.

pub mod counters;
pub mod descriptor;
pub mod hash;
pub mod template;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::value_objects::Claims;

pub use counters::{CapabilityCounters, CounterSnapshot};
pub use descriptor::{CapabilityDescriptor, CapabilityManifest, PromptArgumentSpec, PromptSpec, ResourceSpec, ToolSpec};
pub use hash::{canonical_json, definition_hash};

/// Kind discriminator for catalog entries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityKind {
    /// Callable procedure with a JSON-Schema input contract
    Tool,
    /// Templated instruction rendered with arguments
    Prompt,
    /// Addressable data read through a reader handler
    Resource,
}

impl CapabilityKind {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
        }
    }
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Access control class of a capability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityClass {
    /// Callable by anyone
    #[default]
    Public,
    /// Requires an authenticated caller
    Authenticated,
    /// Requires the privileged claim
    Privileged,
}

impl SecurityClass {
    /// Check the caller's claims against this class
    pub fn permits(&self, claims: &Claims) -> bool {
        match self {
            Self::Public => true,
            Self::Authenticated => claims.authenticated,
            Self::Privileged => claims.privileged,
        }
    }
}

/// Where a capability definition came from
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type", content = "value")]
pub enum CapabilitySource {
    /// Declared inline in configuration
    #[default]
    Inline,
    /// Local definition file discovered by a module scan
    File(String),
    /// Remote manifest URL
    Remote(String),
    /// Registered by in-process boot code
    Builtin,
}

impl CapabilitySource {
    /// Human-readable origin, for logs and summaries
    pub fn label(&self) -> String {
        match self {
            Self::Inline => "inline".to_string(),
            Self::File(path) => format!("file:{path}"),
            Self::Remote(url) => format!("remote:{url}"),
            Self::Builtin => "builtin".to_string(),
        }
    }
}

/// Kind-specific payload of a capability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CapabilityPayload {
    /// Tool payload
    Tool(ToolSpec),
    /// Prompt payload
    Prompt(PromptSpec),
    /// Resource payload
    Resource(ResourceSpec),
}

impl CapabilityPayload {
    /// Kind implied by the payload variant
    pub fn kind(&self) -> CapabilityKind {
        match self {
            Self::Tool(_) => CapabilityKind::Tool,
            Self::Prompt(_) => CapabilityKind::Prompt,
            Self::Resource(_) => CapabilityKind::Resource,
        }
    }
}

/// Registered catalog entry
///
/// Immutable once constructed; `replace` swaps the whole `Arc` while the
/// counters handle carries over, so an in-flight invocation keeps the
/// definition it captured at dispatch entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capability {
    /// Stable identifier assigned at registration
    pub id: String,
    /// Unique name within the kind
    pub name: String,
    /// Human-readable description, also the default embedding text
    pub description: String,
    /// Definition version string
    pub version: String,
    /// Free-form grouping label
    pub category: String,
    /// Access control class
    pub security_class: SecurityClass,
    /// Origin of the definition
    pub source: CapabilitySource,
    /// Search keywords
    pub keywords: Vec<String>,
    /// Kind-specific payload
    pub payload: CapabilityPayload,
    /// SHA-256 of the canonical definition
    pub definition_hash: String,
    /// First registration time; preserved across replaces
    pub registered_at: DateTime<Utc>,
    /// Invocation counters; preserved across replaces
    #[serde(skip, default)]
    pub counters: Arc<CapabilityCounters>,
}

impl Capability {
    /// Build a capability from a validated descriptor
    ///
    /// Computes the definition hash from the descriptor's canonical form.
    /// Fails if the descriptor's declared kind and payload disagree.
    pub fn from_descriptor(descriptor: CapabilityDescriptor) -> Result<Self> {
        descriptor.validate()?;
        let hash = descriptor.definition_hash()?;
        let payload = descriptor.payload()?;

        Ok(Self {
            id: format!("{}:{}", payload.kind(), descriptor.name),
            name: descriptor.name,
            description: descriptor.description,
            version: descriptor.version,
            category: descriptor.category,
            security_class: descriptor.security_class,
            source: descriptor.source,
            keywords: descriptor.keywords,
            payload,
            definition_hash: hash,
            registered_at: Utc::now(),
            counters: Arc::new(CapabilityCounters::default()),
        })
    }

    /// Kind of this capability
    pub fn kind(&self) -> CapabilityKind {
        self.payload.kind()
    }

    /// Tool payload, or an invalid-argument error for other kinds
    pub fn as_tool(&self) -> Result<&ToolSpec> {
        match &self.payload {
            CapabilityPayload::Tool(spec) => Ok(spec),
            _ => Err(Error::invalid_argument(format!(
                "capability '{}' is a {}, not a tool",
                self.name,
                self.kind()
            ))),
        }
    }

    /// Prompt payload, or an invalid-argument error for other kinds
    pub fn as_prompt(&self) -> Result<&PromptSpec> {
        match &self.payload {
            CapabilityPayload::Prompt(spec) => Ok(spec),
            _ => Err(Error::invalid_argument(format!(
                "capability '{}' is a {}, not a prompt",
                self.name,
                self.kind()
            ))),
        }
    }

    /// Resource payload, or an invalid-argument error for other kinds
    pub fn as_resource(&self) -> Result<&ResourceSpec> {
        match &self.payload {
            CapabilityPayload::Resource(spec) => Ok(spec),
            _ => Err(Error::invalid_argument(format!(
                "capability '{}' is a {}, not a resource",
                self.name,
                self.kind()
            ))),
        }
    }

    /// Reconstruct the wire/file descriptor for this capability
    ///
    /// The canonical form of the returned descriptor is what
    /// `definition_hash` was computed over; the registry re-derives it to
    /// reject tampered entries.
    pub fn to_descriptor(&self) -> CapabilityDescriptor {
        let (tool, prompt, resource) = match &self.payload {
            CapabilityPayload::Tool(spec) => (Some(spec.clone()), None, None),
            CapabilityPayload::Prompt(spec) => (None, Some(spec.clone()), None),
            CapabilityPayload::Resource(spec) => (None, None, Some(spec.clone())),
        };
        CapabilityDescriptor {
            kind: self.kind(),
            name: self.name.clone(),
            description: self.description.clone(),
            version: self.version.clone(),
            category: self.category.clone(),
            security_class: self.security_class,
            source: self.source.clone(),
            keywords: self.keywords.clone(),
            tool,
            prompt,
            resource,
        }
    }

    /// Text submitted to the embedding pipeline for this capability
    ///
    /// Metadata only by default; resources opt into body indexing via
    /// their spec.
    pub fn embedding_text(&self) -> String {
        let mut text = format!("{} {} {}", self.name, self.category, self.description);
        if !self.keywords.is_empty() {
            text.push(' ');
            text.push_str(&self.keywords.join(" "));
        }
        text
    }
}

impl PartialEq for Capability {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
            && self.name == other.name
            && self.definition_hash == other.definition_hash
    }
}

/// Serializable catalog listing entry with counter snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySummary {
    /// Stable identifier
    pub id: String,
    /// Kind label
    pub kind: CapabilityKind,
    /// Name, unique within the kind
    pub name: String,
    /// Description
    pub description: String,
    /// Version string
    pub version: String,
    /// Category label
    pub category: String,
    /// Access control class
    pub security_class: SecurityClass,
    /// Origin label
    pub source: String,
    /// Definition hash
    pub definition_hash: String,
    /// First registration time
    pub registered_at: DateTime<Utc>,
    /// Counter values at snapshot time
    pub counters: CounterSnapshot,
}

impl From<&Capability> for CapabilitySummary {
    fn from(cap: &Capability) -> Self {
        Self {
            id: cap.id.clone(),
            kind: cap.kind(),
            name: cap.name.clone(),
            description: cap.description.clone(),
            version: cap.version.clone(),
            category: cap.category.clone(),
            security_class: cap.security_class,
            source: cap.source.label(),
            definition_hash: cap.definition_hash.clone(),
            registered_at: cap.registered_at,
            counters: cap.counters.snapshot(),
        }
    }
}
