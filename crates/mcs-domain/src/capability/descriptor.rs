//! Capability descriptors
//!
//! The wire/file form of a capability definition, as produced by discovery
//! sources and the admin API. Descriptors are validated and then promoted
//! into registered [`Capability`](super::Capability) entries.

use serde::{Deserialize, Serialize};

use crate::capability::hash;
use crate::capability::{CapabilityKind, CapabilityPayload, CapabilitySource, SecurityClass};
use crate::error::{Error, Result};

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_category() -> String {
    "general".to_string()
}

fn default_mime_type() -> String {
    "text/plain".to_string()
}

fn default_argument_type() -> String {
    "string".to_string()
}

/// Tool-specific definition fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    /// JSON Schema the invocation arguments must satisfy
    pub input_schema: serde_json::Value,
    /// Optional JSON Schema for the handler output
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_schema: Option<serde_json::Value>,
    /// Opaque handler identifier resolved by the dispatcher
    pub handler_ref: String,
    /// Whether the dispatcher may retry this tool on transient failure
    #[serde(default)]
    pub idempotent: bool,
    /// Per-tool runtime cap in milliseconds; falls back to the global default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_runtime_ms: Option<u64>,
}

/// Declared argument of a prompt template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptArgumentSpec {
    /// Placeholder name
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Argument type label (informational)
    #[serde(default = "default_argument_type", rename = "type")]
    pub arg_type: String,
    /// Whether rendering fails when the argument is absent
    #[serde(default)]
    pub required: bool,
}

/// Prompt-specific definition fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptSpec {
    /// Declared template arguments
    #[serde(default)]
    pub arguments: Vec<PromptArgumentSpec>,
    /// Template text with `{placeholder}` slots
    pub template: String,
}

impl PromptSpec {
    /// SHA-256 of the template text
    pub fn content_sha(&self) -> String {
        hash::sha256_hex(self.template.as_bytes())
    }
}

/// Resource-specific definition fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSpec {
    /// Resource URI
    pub uri: String,
    /// MIME type of the content
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    /// Content size in bytes, when known up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    /// Content entity tag, when known up front
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    /// Opaque reader identifier resolved by the dispatcher
    pub reader_ref: String,
    /// Whether the resource body contributes to its embedding text
    #[serde(default)]
    pub index_body: bool,
}

impl ResourceSpec {
    /// Whether the MIME type is textual and may be inlined as text
    pub fn is_textual(&self) -> bool {
        self.mime_type.starts_with("text/")
            || self.mime_type == "application/json"
            || self.mime_type.ends_with("+json")
            || self.mime_type == "application/xml"
    }
}

/// Wire/file form of one capability definition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDescriptor {
    /// Declared kind; must match the payload section present
    pub kind: CapabilityKind,
    /// Name, unique within the kind
    pub name: String,
    /// Human-readable description
    #[serde(default)]
    pub description: String,
    /// Definition version string
    #[serde(default = "default_version")]
    pub version: String,
    /// Free-form grouping label
    #[serde(default = "default_category")]
    pub category: String,
    /// Access control class
    #[serde(default)]
    pub security_class: SecurityClass,
    /// Origin of the definition; discovery fills this in
    #[serde(default)]
    pub source: CapabilitySource,
    /// Search keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Tool payload (kind = tool)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolSpec>,
    /// Prompt payload (kind = prompt)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptSpec>,
    /// Resource payload (kind = resource)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ResourceSpec>,
}

impl CapabilityDescriptor {
    /// Validate structural invariants of the descriptor
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid_argument("capability name must not be empty"));
        }
        if !self
            .name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        {
            return Err(Error::invalid_argument(format!(
                "capability name '{}' contains unsupported characters",
                self.name
            )));
        }

        match self.kind {
            CapabilityKind::Tool => {
                let tool = self.tool.as_ref().ok_or_else(|| {
                    Error::invalid_argument(format!("tool '{}' is missing its tool section", self.name))
                })?;
                if !tool.input_schema.is_object() {
                    return Err(Error::invalid_argument(format!(
                        "tool '{}' input_schema must be a JSON object",
                        self.name
                    )));
                }
                if tool.handler_ref.trim().is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "tool '{}' handler_ref must not be empty",
                        self.name
                    )));
                }
            }
            CapabilityKind::Prompt => {
                let prompt = self.prompt.as_ref().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "prompt '{}' is missing its prompt section",
                        self.name
                    ))
                })?;
                if prompt.template.trim().is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "prompt '{}' template must not be empty",
                        self.name
                    )));
                }
                super::template::validate_placeholders(&prompt.template, &prompt.arguments)
                    .map_err(|e| {
                        Error::invalid_argument(format!("prompt '{}': {e}", self.name))
                    })?;
            }
            CapabilityKind::Resource => {
                let resource = self.resource.as_ref().ok_or_else(|| {
                    Error::invalid_argument(format!(
                        "resource '{}' is missing its resource section",
                        self.name
                    ))
                })?;
                if resource.uri.trim().is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "resource '{}' uri must not be empty",
                        self.name
                    )));
                }
                if resource.reader_ref.trim().is_empty() {
                    return Err(Error::invalid_argument(format!(
                        "resource '{}' reader_ref must not be empty",
                        self.name
                    )));
                }
            }
        }

        Ok(())
    }

    /// SHA-256 over the canonical serialized form of this definition
    ///
    /// Runtime fields never appear in a descriptor, so the whole canonical
    /// serialization is hashed.
    pub fn definition_hash(&self) -> Result<String> {
        let value = serde_json::to_value(self)?;
        Ok(hash::definition_hash(&value))
    }

    /// Extract the kind-matching payload
    pub fn payload(&self) -> Result<CapabilityPayload> {
        match self.kind {
            CapabilityKind::Tool => self
                .tool
                .clone()
                .map(CapabilityPayload::Tool)
                .ok_or_else(|| Error::invalid_argument("missing tool payload")),
            CapabilityKind::Prompt => self
                .prompt
                .clone()
                .map(CapabilityPayload::Prompt)
                .ok_or_else(|| Error::invalid_argument("missing prompt payload")),
            CapabilityKind::Resource => self
                .resource
                .clone()
                .map(CapabilityPayload::Resource)
                .ok_or_else(|| Error::invalid_argument("missing resource payload")),
        }
    }
}

/// A set of descriptors, as found in a definition file or remote manifest
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CapabilityManifest {
    /// The capability definitions
    #[serde(default)]
    pub capabilities: Vec<CapabilityDescriptor>,
}
