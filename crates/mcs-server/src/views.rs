//! Wire views of catalog entries
//!
//! Builds the JSON summaries and content shapes both protocol surfaces
//! share: tool/prompt/resource listings, tool call content, and resource
//! contents.

use base64::Engine;
use serde_json::{json, Value};

use mcs_domain::capability::{Capability, CapabilityPayload};
use mcs_domain::ports::ResourceBody;

/// Tool listing entry
pub fn tool_summary(capability: &Capability) -> Value {
    let tool = match &capability.payload {
        CapabilityPayload::Tool(tool) => tool,
        _ => return Value::Null,
    };
    json!({
        "name": capability.name,
        "description": capability.description,
        "category": capability.category,
        "version": capability.version,
        "security_class": capability.security_class,
        "inputSchema": tool.input_schema,
        "idempotent": tool.idempotent,
    })
}

/// Prompt listing entry
pub fn prompt_summary(capability: &Capability) -> Value {
    let prompt = match &capability.payload {
        CapabilityPayload::Prompt(prompt) => prompt,
        _ => return Value::Null,
    };
    json!({
        "name": capability.name,
        "description": capability.description,
        "category": capability.category,
        "version": capability.version,
        "security_class": capability.security_class,
        "arguments": prompt.arguments.iter().map(|arg| json!({
            "name": arg.name,
            "description": arg.description,
            "type": arg.arg_type,
            "required": arg.required,
        })).collect::<Vec<_>>(),
        "content_sha": prompt.content_sha(),
    })
}

/// Resource listing entry
pub fn resource_summary(capability: &Capability) -> Value {
    let resource = match &capability.payload {
        CapabilityPayload::Resource(resource) => resource,
        _ => return Value::Null,
    };
    json!({
        "uri": resource.uri,
        "name": capability.name,
        "description": capability.description,
        "mimeType": resource.mime_type,
        "byte_size": resource.byte_size,
        "etag": resource.etag,
    })
}

/// Shape a handler value as MCP tool content
///
/// Strings pass through as text; everything else is rendered as JSON.
pub fn tool_content(value: &Value) -> Vec<Value> {
    let text = match value {
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
    };
    vec![json!({ "type": "text", "text": text })]
}

/// Shape a resource body as MCP resource contents
///
/// Textual MIME types inline as `text`; binary content is base64 `blob`.
pub fn resource_contents(capability: &Capability, body: &ResourceBody) -> Value {
    let resource = match &capability.payload {
        CapabilityPayload::Resource(resource) => resource,
        _ => return Value::Null,
    };

    let content = if resource.is_textual() {
        match std::str::from_utf8(&body.bytes) {
            Ok(text) => json!({
                "uri": resource.uri,
                "mimeType": resource.mime_type,
                "text": text,
            }),
            Err(_) => json!({
                "uri": resource.uri,
                "mimeType": resource.mime_type,
                "blob": base64::engine::general_purpose::STANDARD.encode(&body.bytes),
            }),
        }
    } else {
        json!({
            "uri": resource.uri,
            "mimeType": resource.mime_type,
            "blob": base64::engine::general_purpose::STANDARD.encode(&body.bytes),
        })
    };

    json!({ "contents": [content] })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_domain::capability::CapabilityDescriptor;

    fn capability(value: Value) -> Capability {
        let descriptor: CapabilityDescriptor = serde_json::from_value(value).unwrap();
        Capability::from_descriptor(descriptor).unwrap()
    }

    #[test]
    fn tool_summary_carries_schema() {
        let capability = capability(json!({
            "kind": "tool",
            "name": "echo",
            "description": "Echo",
            "tool": {
                "input_schema": {"type": "object", "required": ["msg"]},
                "handler_ref": "builtin.echo"
            }
        }));
        let summary = tool_summary(&capability);
        assert_eq!(summary["name"], "echo");
        assert_eq!(summary["inputSchema"]["required"][0], "msg");
    }

    #[test]
    fn string_values_become_plain_text_content() {
        let content = tool_content(&Value::String("hi".to_string()));
        assert_eq!(content[0]["type"], "text");
        assert_eq!(content[0]["text"], "hi");
    }

    #[test]
    fn json_values_render_as_json_text() {
        let content = tool_content(&json!({"a": 1}));
        assert!(content[0]["text"].as_str().unwrap().contains("\"a\""));
    }

    #[test]
    fn textual_resources_inline_text() {
        let capability = capability(json!({
            "kind": "resource",
            "name": "doc",
            "resource": {
                "uri": "blob://abc",
                "mime_type": "text/plain",
                "reader_ref": "blob.reader"
            }
        }));
        let body = ResourceBody {
            bytes: b"hello".to_vec(),
            etag: None,
        };
        let contents = resource_contents(&capability, &body);
        assert_eq!(contents["contents"][0]["text"], "hello");
    }

    #[test]
    fn binary_resources_encode_as_blob() {
        let capability = capability(json!({
            "kind": "resource",
            "name": "img",
            "resource": {
                "uri": "blob://img",
                "mime_type": "image/png",
                "reader_ref": "blob.reader"
            }
        }));
        let body = ResourceBody {
            bytes: vec![0, 159, 146, 150],
            etag: None,
        };
        let contents = resource_contents(&capability, &body);
        assert!(contents["contents"][0]["blob"].is_string());
        assert!(contents["contents"][0].get("text").is_none());
    }
}
