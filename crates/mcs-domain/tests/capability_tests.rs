//! Tests for the capability model: descriptors, hashing, and summaries.

use serde_json::json;

use mcs_domain::capability::{
    Capability, CapabilityDescriptor, CapabilityKind, CapabilityPayload, SecurityClass, ToolSpec,
};
use mcs_domain::value_objects::Claims;

fn echo_descriptor() -> CapabilityDescriptor {
    serde_json::from_value(json!({
        "kind": "tool",
        "name": "echo",
        "description": "Echo the message back",
        "category": "diagnostics",
        "tool": {
            "input_schema": {
                "type": "object",
                "properties": {"msg": {"type": "string"}},
                "required": ["msg"]
            },
            "handler_ref": "builtin.echo",
            "idempotent": true
        }
    }))
    .unwrap()
}

#[test]
fn descriptor_promotes_to_capability() {
    let cap = Capability::from_descriptor(echo_descriptor()).unwrap();
    assert_eq!(cap.kind(), CapabilityKind::Tool);
    assert_eq!(cap.name, "echo");
    assert_eq!(cap.category, "diagnostics");
    assert_eq!(cap.version, "0.1.0");
    assert_eq!(cap.definition_hash.len(), 64);
    assert!(cap.as_tool().is_ok());
    assert!(cap.as_prompt().is_err());
}

#[test]
fn definition_hash_is_stable_across_promotions() {
    let a = Capability::from_descriptor(echo_descriptor()).unwrap();
    let b = Capability::from_descriptor(echo_descriptor()).unwrap();
    assert_eq!(a.definition_hash, b.definition_hash);
}

#[test]
fn definition_hash_tracks_definition_changes() {
    let mut changed = echo_descriptor();
    changed.description = "Echo the message back, loudly".to_string();
    let a = Capability::from_descriptor(echo_descriptor()).unwrap();
    let b = Capability::from_descriptor(changed).unwrap();
    assert_ne!(a.definition_hash, b.definition_hash);
}

#[test]
fn kind_payload_mismatch_is_rejected() {
    let mut descriptor = echo_descriptor();
    descriptor.kind = CapabilityKind::Prompt;
    assert!(Capability::from_descriptor(descriptor).is_err());
}

#[test]
fn tool_without_object_schema_is_rejected() {
    let mut descriptor = echo_descriptor();
    if let Some(tool) = descriptor.tool.as_mut() {
        tool.input_schema = json!("not-an-object");
    }
    assert!(Capability::from_descriptor(descriptor).is_err());
}

#[test]
fn prompt_descriptor_round_trips_through_toml() {
    let toml_src = r#"
        [[capabilities]]
        kind = "prompt"
        name = "summarize"
        description = "Summarize a document"

        [capabilities.prompt]
        template = "Summarize {topic}"

        [[capabilities.prompt.arguments]]
        name = "topic"
        required = true
    "#;
    let manifest: mcs_domain::capability::CapabilityManifest = toml::from_str(toml_src).unwrap();
    assert_eq!(manifest.capabilities.len(), 1);
    let cap = Capability::from_descriptor(manifest.capabilities[0].clone()).unwrap();
    assert_eq!(cap.kind(), CapabilityKind::Prompt);
    let prompt = cap.as_prompt().unwrap();
    assert_eq!(prompt.arguments.len(), 1);
    assert_eq!(prompt.content_sha().len(), 64);
}

#[test]
fn security_class_checks_claims() {
    assert!(SecurityClass::Public.permits(&Claims::anonymous()));
    assert!(!SecurityClass::Authenticated.permits(&Claims::anonymous()));
    assert!(!SecurityClass::Privileged.permits(&Claims::parse_header("authenticated")));
    assert!(SecurityClass::Privileged.permits(&Claims::privileged()));
}

#[test]
fn embedding_text_includes_keywords() {
    let mut descriptor = echo_descriptor();
    descriptor.keywords = vec!["repeat".to_string(), "mirror".to_string()];
    let cap = Capability::from_descriptor(descriptor).unwrap();
    let text = cap.embedding_text();
    assert!(text.contains("echo"));
    assert!(text.contains("repeat"));
    assert!(text.contains("mirror"));
}

#[test]
fn summary_snapshot_reflects_counters() {
    let cap = Capability::from_descriptor(echo_descriptor()).unwrap();
    cap.counters.record(true, 12, 1_700_000_000_000);
    cap.counters.record(false, 30, 1_700_000_000_100);

    let summary = mcs_domain::capability::CapabilitySummary::from(&cap);
    assert_eq!(summary.counters.invocations, 2);
    assert_eq!(summary.counters.failures, 1);
    assert_eq!(summary.counters.cumulative_latency_ms, 42);

    // Payload access stays typed
    match &cap.payload {
        CapabilityPayload::Tool(ToolSpec { idempotent, .. }) => assert!(idempotent),
        _ => panic!("expected tool payload"),
    }
}
