//! Discovery tests: source application, hash-driven register/replace/skip,
//! rejection reporting, module scans, and the boot cache.

use std::sync::Arc;

use serde_json::json;

use mcs_application::discovery::{DiscoveryConfig, DiscoveryService, DiscoverySource};
use mcs_application::{CatalogRegistry, TelemetryPipeline};
use mcs_domain::capability::{CapabilityDescriptor, CapabilityKind};

fn descriptor(name: &str, description: &str) -> CapabilityDescriptor {
    serde_json::from_value(json!({
        "kind": "tool",
        "name": name,
        "description": description,
        "tool": {
            "input_schema": {"type": "object"},
            "handler_ref": "builtin.echo"
        }
    }))
    .unwrap()
}

fn service(registry: Arc<CatalogRegistry>, sources: Vec<DiscoverySource>) -> DiscoveryService {
    DiscoveryService::new(
        registry,
        TelemetryPipeline::disabled(),
        DiscoveryConfig {
            sources,
            ..DiscoveryConfig::default()
        },
    )
}

#[tokio::test]
async fn explicit_list_registers_capabilities() {
    let registry = Arc::new(CatalogRegistry::new());
    let discovery = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ExplicitList {
            capabilities: vec![descriptor("echo", "Echo"), descriptor("web_fetch", "Fetch")],
        }],
    );

    let report = discovery.run().await;
    assert_eq!(report.accepted.len(), 2);
    assert!(report.rejected.is_empty());
    assert!(registry.get(CapabilityKind::Tool, "echo").is_ok());
    assert!(registry.get(CapabilityKind::Tool, "web_fetch").is_ok());
}

#[tokio::test]
async fn rerun_with_identical_definitions_skips() {
    let registry = Arc::new(CatalogRegistry::new());
    let discovery = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ExplicitList {
            capabilities: vec![descriptor("echo", "Echo")],
        }],
    );

    discovery.run().await;
    let second = discovery.run().await;
    assert!(second.accepted.is_empty());
    assert_eq!(second.skipped, 1);
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn changed_definition_hot_replaces() {
    let registry = Arc::new(CatalogRegistry::new());
    let first = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ExplicitList {
            capabilities: vec![descriptor("echo", "Echo v1")],
        }],
    );
    first.run().await;

    let second = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ExplicitList {
            capabilities: vec![descriptor("echo", "Echo v2")],
        }],
    );
    let report = second.run().await;
    assert_eq!(report.replaced.len(), 1);

    let current = registry.get(CapabilityKind::Tool, "echo").unwrap();
    assert_eq!(current.description, "Echo v2");
}

#[tokio::test]
async fn invalid_definitions_are_collected_not_fatal() {
    let registry = Arc::new(CatalogRegistry::new());
    let mut broken = descriptor("broken", "Missing payload");
    broken.tool = None;

    let discovery = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ExplicitList {
            capabilities: vec![broken, descriptor("echo", "Echo")],
        }],
    );

    let report = discovery.run().await;
    assert_eq!(report.accepted.len(), 1);
    assert_eq!(report.rejected.len(), 1);
    assert!(report.rejected[0].reason.contains("tool section"));
    assert!(registry.get(CapabilityKind::Tool, "echo").is_ok());
}

#[tokio::test]
async fn module_scan_parses_toml_and_json_files() {
    let dir = tempfile::tempdir().unwrap();
    let toml_manifest = r#"
        [[capabilities]]
        kind = "tool"
        name = "from_toml"
        description = "Defined in TOML"

        [capabilities.tool]
        input_schema = { type = "object" }
        handler_ref = "builtin.echo"
    "#;
    std::fs::write(dir.path().join("tools.toml"), toml_manifest).unwrap();

    let json_manifest = json!({
        "capabilities": [{
            "kind": "prompt",
            "name": "from_json",
            "prompt": {"template": "Say hello"}
        }]
    });
    std::fs::write(
        dir.path().join("prompts.json"),
        serde_json::to_string_pretty(&json_manifest).unwrap(),
    )
    .unwrap();

    // Garbage file is rejected, not fatal
    std::fs::write(dir.path().join("junk.json"), "{not json").unwrap();
    // Unrecognized extensions are ignored entirely
    std::fs::write(dir.path().join("README.md"), "docs").unwrap();

    let registry = Arc::new(CatalogRegistry::new());
    let discovery = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ModuleScan {
            roots: vec![dir.path().to_path_buf()],
            include_pattern: None,
            exclude_pattern: None,
        }],
    );

    let report = discovery.run().await;
    assert_eq!(report.accepted.len(), 2);
    assert_eq!(report.rejected.len(), 1);
    assert!(registry.get(CapabilityKind::Tool, "from_toml").is_ok());
    assert!(registry.get(CapabilityKind::Prompt, "from_json").is_ok());
}

#[tokio::test]
async fn module_scan_honors_exclude_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let manifest = json!({
        "capabilities": [{
            "kind": "tool",
            "name": "excluded_tool",
            "tool": {"input_schema": {"type": "object"}, "handler_ref": "builtin.echo"}
        }]
    });
    std::fs::write(
        dir.path().join("skip-me.json"),
        serde_json::to_string(&manifest).unwrap(),
    )
    .unwrap();

    let registry = Arc::new(CatalogRegistry::new());
    let discovery = service(
        Arc::clone(&registry),
        vec![DiscoverySource::ModuleScan {
            roots: vec![dir.path().to_path_buf()],
            include_pattern: None,
            exclude_pattern: Some("**/skip-*.json".to_string()),
        }],
    );

    let report = discovery.run().await;
    assert!(report.accepted.is_empty());
    assert!(registry.is_empty());
}

#[tokio::test]
async fn boot_cache_round_trips_the_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let cache_path = dir.path().join("pipeline-state.json");

    // First boot: explicit list, cache written
    let registry = Arc::new(CatalogRegistry::new());
    let discovery = DiscoveryService::new(
        Arc::clone(&registry),
        TelemetryPipeline::disabled(),
        DiscoveryConfig {
            sources: vec![DiscoverySource::ExplicitList {
                capabilities: vec![descriptor("echo", "Echo")],
            }],
            pipeline_state_path: Some(cache_path.clone()),
            ..DiscoveryConfig::default()
        },
    );
    discovery.run_at_boot().await;
    assert!(cache_path.exists());

    // Second boot: no sources, catalog rebuilt from the cache alone
    let cold_registry = Arc::new(CatalogRegistry::new());
    let cold_discovery = DiscoveryService::new(
        Arc::clone(&cold_registry),
        TelemetryPipeline::disabled(),
        DiscoveryConfig {
            sources: Vec::new(),
            pipeline_state_path: Some(cache_path),
            ..DiscoveryConfig::default()
        },
    );
    cold_discovery.run_at_boot().await;
    assert!(cold_registry.get(CapabilityKind::Tool, "echo").is_ok());
}
