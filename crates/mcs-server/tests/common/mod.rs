//! Shared fixtures for server tests
//!
//! Builds a fully wired application context over in-process providers so
//! router tests run without any network or external service.

// Each test binary uses its own subset of these helpers
#![allow(dead_code)]

use std::sync::Arc;

use serde_json::json;
use tokio_util::sync::CancellationToken;

use mcs_application::discovery::{DiscoveryConfig, DiscoveryService};
use mcs_application::indexing::{IndexingConfig, IndexingPipeline};
use mcs_application::selector::SelectorConfig;
use mcs_application::{
    CatalogRegistry, Dispatcher, DispatcherConfig, HandlerRegistry, Selector, TelemetryPipeline,
};
use mcs_domain::capability::{Capability, CapabilityDescriptor};
use mcs_domain::ports::{BlobStoreProvider, EmbeddingProvider, VectorIndexProvider};
use mcs_infrastructure::config::AppConfig;
use mcs_infrastructure::health::HealthMonitor;
use mcs_infrastructure::AppContext;
use mcs_providers::blob_store::InMemoryBlobStore;
use mcs_providers::directory::NullDirectoryClient;
use mcs_providers::embedding::NullEmbeddingProvider;
use mcs_providers::handlers::BlobResourceReader;
use mcs_providers::vector_index::InMemoryVectorIndex;

/// Build a test application context
///
/// `failing_embedding` forces the upstream-unavailable path so tests can
/// exercise the rule-based selector fallback.
pub fn test_app(failing_embedding: bool, discovery: DiscoveryConfig) -> Arc<AppContext> {
    let config = AppConfig {
        telemetry: mcs_infrastructure::config::TelemetrySettings {
            sinks: vec!["null".to_string()],
            ..Default::default()
        },
        ..AppConfig::default()
    };

    let embedding: Arc<dyn EmbeddingProvider> = if failing_embedding {
        Arc::new(NullEmbeddingProvider::failing())
    } else {
        Arc::new(NullEmbeddingProvider::new())
    };
    let vector_index: Arc<dyn VectorIndexProvider> = Arc::new(InMemoryVectorIndex::new());
    let blob_store: Arc<dyn BlobStoreProvider> = Arc::new(InMemoryBlobStore::new());

    let registry = Arc::new(CatalogRegistry::new());
    let telemetry = TelemetryPipeline::disabled();
    let selector = Arc::new(Selector::new(
        Arc::clone(&registry),
        Arc::clone(&embedding),
        Arc::clone(&vector_index),
        SelectorConfig::default(),
    ));

    let mut handlers = HandlerRegistry::new();
    handlers.register_handler(Arc::new(mcs_application::handlers::EchoHandler));
    handlers.register_handler(Arc::new(mcs_application::handlers::SearchCatalogHandler::new(
        Arc::clone(&selector),
    )));
    handlers.register_reader(Arc::new(BlobResourceReader::new(Arc::clone(&blob_store))));
    handlers.register_reader(Arc::new(mcs_application::handlers::ServerInfoReader::new(
        "capability-server",
        "test",
        "capability-server-test-0",
    )));
    let handlers = Arc::new(handlers);

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&handlers),
        telemetry.clone(),
        DispatcherConfig::default(),
    ));

    let shutdown = CancellationToken::new();
    let (indexing, _worker) = IndexingPipeline::spawn(
        Arc::clone(&registry),
        Arc::clone(&embedding),
        Arc::clone(&vector_index),
        Arc::clone(&handlers),
        telemetry.clone(),
        IndexingConfig::default(),
        shutdown.clone(),
    );

    let discovery = Arc::new(DiscoveryService::new(
        Arc::clone(&registry),
        telemetry.clone(),
        discovery,
    ));

    Arc::new(AppContext {
        config,
        registry,
        handlers,
        selector,
        dispatcher,
        discovery,
        indexing: Arc::new(indexing),
        telemetry,
        health: Arc::new(HealthMonitor::builder().build()),
        embedding,
        vector_index,
        blob_store,
        directory_client: Arc::new(NullDirectoryClient::new()),
        shutdown,
    })
}

/// Register the echo tool used across scenarios
pub fn register_echo(app: &AppContext) {
    let descriptor: CapabilityDescriptor = serde_json::from_value(json!({
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
    .unwrap();
    app.registry
        .register(Capability::from_descriptor(descriptor).unwrap())
        .unwrap();
}

/// Register the three search-scenario tools
pub fn register_search_catalog_fixture(app: &AppContext) {
    for (name, description, keywords) in [
        ("web_fetch", "Fetch a web page over HTTP", vec!["http", "fetch", "page"]),
        ("data_query", "Query structured data", vec!["sql", "query"]),
        ("memory_store", "Store a memory for later recall", vec!["remember"]),
    ] {
        let descriptor: CapabilityDescriptor = serde_json::from_value(json!({
            "kind": "tool",
            "name": name,
            "description": description,
            "keywords": keywords,
            "tool": {
                "input_schema": {"type": "object"},
                "handler_ref": "builtin.echo"
            }
        }))
        .unwrap();
        app.registry
            .register(Capability::from_descriptor(descriptor).unwrap())
            .unwrap();
    }
}

/// Register a prompt and the server-info resource
pub fn register_prompt_and_resource(app: &AppContext) {
    let prompt: CapabilityDescriptor = serde_json::from_value(json!({
        "kind": "prompt",
        "name": "summarize",
        "description": "Summarize a topic",
        "prompt": {
            "template": "Summarize {topic}",
            "arguments": [{"name": "topic", "required": true}]
        }
    }))
    .unwrap();
    app.registry
        .register(Capability::from_descriptor(prompt).unwrap())
        .unwrap();

    let resource: CapabilityDescriptor = serde_json::from_value(json!({
        "kind": "resource",
        "name": "server-info",
        "description": "Instance identity",
        "resource": {
            "uri": "mcs://server-info",
            "mime_type": "application/json",
            "reader_ref": "builtin.server_info"
        }
    }))
    .unwrap();
    app.registry
        .register(Capability::from_descriptor(resource).unwrap())
        .unwrap();
}
