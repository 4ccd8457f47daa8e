//! Application bootstrap
//!
//! Resolves providers from configuration, wires the application services,
//! registers the built-in capabilities, and runs the dependency warm-up.
//! Every service is constructed exactly once here and passed by reference;
//! there is no module-level mutable state.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use mcs_application::directory::{DirectoryAgent, DirectoryAgentConfig};
use mcs_application::discovery::DiscoveryService;
use mcs_application::handlers::{EchoHandler, SearchCatalogHandler, ServerInfoReader};
use mcs_application::indexing::{IndexJob, IndexingPipeline};
use mcs_application::retry::{with_backoff, BackoffPolicy};
use mcs_application::{CatalogRegistry, Dispatcher, HandlerRegistry, Selector, TelemetryPipeline};
use mcs_domain::capability::{Capability, CapabilityDescriptor, CapabilitySource};
use mcs_domain::error::{Error, Result};
use mcs_domain::ports::{
    BlobStoreProvider, DirectoryClient, EmbeddingProvider, TelemetrySink, VectorIndexProvider,
};
use mcs_providers::blob_store::{FilesystemBlobStore, InMemoryBlobStore};
use mcs_providers::directory::{HttpDirectoryClient, NullDirectoryClient};
use mcs_providers::embedding::http::HttpEmbeddingConfig;
use mcs_providers::embedding::{HttpEmbeddingProvider, NullEmbeddingProvider};
use mcs_providers::handlers::{BlobResourceReader, RemoteHttpToolHandler};
use mcs_providers::telemetry::{FileTelemetrySink, NullTelemetrySink, StdoutTelemetrySink};
use mcs_providers::vector_index::http::HttpVectorIndexConfig;
use mcs_providers::vector_index::{HttpVectorIndex, InMemoryVectorIndex, NullVectorIndex};

use crate::config::AppConfig;
use crate::health::probes::{EmbeddingProbe, MemoryPressureProbe, VectorIndexProbe};
use crate::health::{HealthMonitor, MonitorReadinessProbe};

/// Fully wired application
pub struct AppContext {
    /// Effective configuration
    pub config: AppConfig,
    /// Authoritative capability catalog
    pub registry: Arc<CatalogRegistry>,
    /// Boot-time handler registry
    pub handlers: Arc<HandlerRegistry>,
    /// Catalog selector
    pub selector: Arc<Selector>,
    /// Invocation dispatcher
    pub dispatcher: Arc<Dispatcher>,
    /// Capability source scanner
    pub discovery: Arc<DiscoveryService>,
    /// Background indexing pipeline
    pub indexing: Arc<IndexingPipeline>,
    /// Telemetry pipeline
    pub telemetry: TelemetryPipeline,
    /// Health monitor backing /health and the directory heartbeat
    pub health: Arc<HealthMonitor>,
    /// Resolved embedding provider
    pub embedding: Arc<dyn EmbeddingProvider>,
    /// Resolved vector index
    pub vector_index: Arc<dyn VectorIndexProvider>,
    /// Resolved blob store
    pub blob_store: Arc<dyn BlobStoreProvider>,
    /// Resolved directory client
    pub directory_client: Arc<dyn DirectoryClient>,
    /// Root shutdown signal; cancelling it stops background work and
    /// cancels in-flight invocations
    pub shutdown: CancellationToken,
}

impl AppContext {
    /// Instance identifier of this process
    pub fn instance_id(&self) -> String {
        format!(
            "{}-{}-{}",
            self.config.server.service_name, self.config.server.host, self.config.server.port
        )
    }

    /// Build the directory agent for this instance
    pub fn directory_agent(&self) -> DirectoryAgent {
        // A wildcard bind address is useless for routing; advertise the
        // machine hostname instead
        let host = if self.config.server.host == "0.0.0.0" {
            hostname::get()
                .ok()
                .and_then(|name| name.into_string().ok())
                .unwrap_or_else(|| self.config.server.host.clone())
        } else {
            self.config.server.host.clone()
        };
        let config = DirectoryAgentConfig {
            service_name: self.config.server.service_name.clone(),
            host,
            port: self.config.server.port,
            tags: self.config.directory.tags.clone(),
            heartbeat_interval: std::time::Duration::from_secs(
                self.config.directory.heartbeat_interval_secs,
            ),
            check_timeout: std::time::Duration::from_millis(self.config.directory.check_timeout_ms),
            deregister_after: std::time::Duration::from_secs(
                self.config.directory.deregister_after_secs,
            ),
            consecutive_failures_to_unhealthy: self
                .config
                .directory
                .consecutive_failures_to_unhealthy,
        };
        DirectoryAgent::new(
            Arc::clone(&self.directory_client),
            Arc::new(MonitorReadinessProbe::new(Arc::clone(&self.health))),
            self.telemetry.clone(),
            config,
        )
    }
}

/// Initialize the application from configuration
pub async fn init_app(config: AppConfig) -> Result<AppContext> {
    let shutdown = CancellationToken::new();
    let telemetry = build_telemetry(&config)?;

    let embedding = build_embedding(&config, &telemetry);
    let vector_index = build_vector_index(&config);
    let blob_store = build_blob_store(&config);
    let directory_client = build_directory(&config);

    let registry = Arc::new(CatalogRegistry::new());
    let selector = Arc::new(Selector::new(
        Arc::clone(&registry),
        Arc::clone(&embedding),
        Arc::clone(&vector_index),
        config.selector.to_selector_config(),
    ));

    let handlers = Arc::new(build_handlers(&config, &selector, &blob_store));
    register_builtin_capabilities(&registry)?;

    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&registry),
        Arc::clone(&handlers),
        telemetry.clone(),
        config.dispatcher.to_dispatcher_config(),
    ));

    let (indexing, _indexing_worker) = IndexingPipeline::spawn(
        Arc::clone(&registry),
        Arc::clone(&embedding),
        Arc::clone(&vector_index),
        Arc::clone(&handlers),
        telemetry.clone(),
        config.indexing.to_indexing_config(),
        shutdown.clone(),
    );

    // A metadata record describing this instance makes the service itself
    // discoverable through catalog search
    indexing.try_submit(IndexJob::UpsertMetadata {
        name: config.server.service_name.clone(),
        category: "service".to_string(),
        text: format!(
            "MCP capability server instance {}-{}-{} serving tools, prompts, and resources",
            config.server.service_name, config.server.host, config.server.port
        ),
    });

    let discovery = Arc::new(DiscoveryService::new(
        Arc::clone(&registry),
        telemetry.clone(),
        config.discovery.clone(),
    ));

    spawn_registry_telemetry(Arc::clone(&registry), telemetry.clone(), shutdown.clone());

    let health = Arc::new(
        HealthMonitor::builder()
            .probe("memory", MemoryPressureProbe::new())
            .probe("embedding", EmbeddingProbe::new(Arc::clone(&embedding)))
            .probe(
                "vector_index",
                VectorIndexProbe::new(Arc::clone(&vector_index)),
            )
            .probe_timeout(std::time::Duration::from_millis(
                config.directory.check_timeout_ms,
            ))
            .build(),
    );

    warm_up(&config, &embedding, &vector_index, &blob_store).await?;

    info!(
        embedding = embedding.provider_name(),
        vector_index = vector_index.provider_name(),
        blob_store = blob_store.provider_name(),
        directory = directory_client.provider_name(),
        "application context initialized"
    );

    Ok(AppContext {
        config,
        registry,
        handlers,
        selector,
        dispatcher,
        discovery,
        indexing: Arc::new(indexing),
        telemetry,
        health,
        embedding,
        vector_index,
        blob_store,
        directory_client,
        shutdown,
    })
}

/// Mirror registry change-feed events into telemetry
fn spawn_registry_telemetry(
    registry: Arc<CatalogRegistry>,
    telemetry: TelemetryPipeline,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let (_, mut feed) = registry.subscribe(Some(registry.last_seq()));
        loop {
            tokio::select! {
                () = shutdown.cancelled() => return,
                event = feed.recv() => match event {
                    Ok(event) => {
                        telemetry
                            .emit(
                                mcs_domain::events::TelemetryEvent::new(
                                    mcs_domain::events::TelemetryEventKind::RegistryChanged,
                                )
                                .with_field("change", event.change.as_str())
                                .with_field("kind", event.kind.as_str())
                                .with_field("name", event.name.as_str())
                                .with_field("seq", event.seq),
                            )
                            .await;
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "registry telemetry subscriber lagged");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    });
}

/// Build the telemetry pipeline from configured sink names
fn build_telemetry(config: &AppConfig) -> Result<TelemetryPipeline> {
    let mut sinks: Vec<Arc<dyn TelemetrySink>> = Vec::new();
    for name in &config.telemetry.sinks {
        match name.as_str() {
            "stdout" => sinks.push(Arc::new(StdoutTelemetrySink::new())),
            "file" => sinks.push(Arc::new(FileTelemetrySink::new(
                config.telemetry.file_path.clone(),
            ))),
            "null" => sinks.push(Arc::new(NullTelemetrySink::new())),
            other => {
                return Err(Error::configuration(format!(
                    "unknown telemetry sink '{other}'"
                )))
            }
        }
    }
    Ok(TelemetryPipeline::new(sinks))
}

/// Resolve the embedding provider by name
fn build_embedding(config: &AppConfig, telemetry: &TelemetryPipeline) -> Arc<dyn EmbeddingProvider> {
    let settings = &config.providers.embedding;
    match settings.provider.as_str() {
        "http" => Arc::new(HttpEmbeddingProvider::new(
            HttpEmbeddingConfig {
                base_url: settings.base_url.clone(),
                api_key: settings.api_key.clone(),
                model: settings.model.clone(),
                generation_model: settings.generation_model.clone(),
                dimensions: settings.dimensions,
                timeout: std::time::Duration::from_millis(settings.timeout_ms),
                cost_per_1k_tokens_usd: settings.cost_per_1k_tokens_usd,
            },
            telemetry.clone(),
        )),
        _ => Arc::new(NullEmbeddingProvider::new()),
    }
}

/// Resolve the vector index by name
fn build_vector_index(config: &AppConfig) -> Arc<dyn VectorIndexProvider> {
    let settings = &config.providers.vector_index;
    match settings.provider.as_str() {
        "http" => Arc::new(HttpVectorIndex::new(HttpVectorIndexConfig {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout: std::time::Duration::from_millis(settings.timeout_ms),
        })),
        "null" => Arc::new(NullVectorIndex::new()),
        _ => Arc::new(InMemoryVectorIndex::new()),
    }
}

/// Resolve the blob store by name
fn build_blob_store(config: &AppConfig) -> Arc<dyn BlobStoreProvider> {
    let settings = &config.providers.blob_store;
    match settings.provider.as_str() {
        "filesystem" => Arc::new(FilesystemBlobStore::new(settings.root.clone())),
        _ => Arc::new(InMemoryBlobStore::new()),
    }
}

/// Resolve the directory client by name
fn build_directory(config: &AppConfig) -> Arc<dyn DirectoryClient> {
    match config.directory.provider.as_str() {
        "http" => Arc::new(HttpDirectoryClient::new(
            mcs_providers::directory::http::HttpDirectoryConfig {
                base_url: config.directory.base_url.clone(),
                token: config.directory.token.clone(),
                timeout: std::time::Duration::from_millis(config.directory.check_timeout_ms),
            },
        )),
        _ => Arc::new(NullDirectoryClient::new()),
    }
}

/// Register handlers: builtins plus configured remote tool endpoints
fn build_handlers(
    config: &AppConfig,
    selector: &Arc<Selector>,
    blob_store: &Arc<dyn BlobStoreProvider>,
) -> HandlerRegistry {
    let mut handlers = HandlerRegistry::new();
    handlers.register_handler(Arc::new(EchoHandler));
    handlers.register_handler(Arc::new(SearchCatalogHandler::new(Arc::clone(selector))));
    handlers.register_reader(Arc::new(BlobResourceReader::new(Arc::clone(blob_store))));
    handlers.register_reader(Arc::new(ServerInfoReader::new(
        config.server.service_name.clone(),
        env!("CARGO_PKG_VERSION"),
        format!(
            "{}-{}-{}",
            config.server.service_name, config.server.host, config.server.port
        ),
    )));

    for remote in &config.providers.remote_tools {
        handlers.register_handler(Arc::new(RemoteHttpToolHandler::new(
            remote.handler_ref.clone(),
            remote.endpoint.clone(),
        )));
    }

    handlers
}

/// Arguments of the builtin echo tool
#[derive(Debug, Deserialize, JsonSchema)]
struct EchoArgs {
    /// Message echoed back verbatim
    #[allow(dead_code)]
    msg: String,
}

/// Arguments of the builtin catalog search tool
#[derive(Debug, Deserialize, JsonSchema)]
struct SearchCatalogArgs {
    /// Free-form intent to match against the catalog
    #[allow(dead_code)]
    query: String,
    /// Restrict to one capability kind
    #[allow(dead_code)]
    kind: Option<String>,
    /// Restrict to a category
    #[allow(dead_code)]
    category: Option<String>,
    /// Result count
    #[allow(dead_code)]
    k: Option<u32>,
}

/// Register the built-in capabilities ahead of discovery
fn register_builtin_capabilities(registry: &Arc<CatalogRegistry>) -> Result<()> {
    let echo_schema = serde_json::to_value(schemars::schema_for!(EchoArgs))?;
    let search_schema = serde_json::to_value(schemars::schema_for!(SearchCatalogArgs))?;

    let descriptors: Vec<CapabilityDescriptor> = vec![
        serde_json::from_value(json!({
            "kind": "tool",
            "name": "echo",
            "description": "Echo the message back, for connectivity checks",
            "category": "diagnostics",
            "keywords": ["echo", "ping", "diagnostics"],
            "tool": {
                "input_schema": echo_schema,
                "handler_ref": "builtin.echo",
                "idempotent": true,
                "max_runtime_ms": 1000
            }
        }))?,
        serde_json::from_value(json!({
            "kind": "tool",
            "name": "search_catalog",
            "description": "Semantic search over the capability catalog",
            "category": "catalog",
            "keywords": ["search", "find", "capability", "catalog"],
            "tool": {
                "input_schema": search_schema,
                "handler_ref": "builtin.search_catalog",
                "idempotent": true
            }
        }))?,
        serde_json::from_value(json!({
            "kind": "resource",
            "name": "server-info",
            "description": "Identity and version of this capability server instance",
            "category": "diagnostics",
            "keywords": ["server", "info", "version"],
            "resource": {
                "uri": "mcs://server-info",
                "mime_type": "application/json",
                "reader_ref": "builtin.server_info"
            }
        }))?,
    ];

    for mut descriptor in descriptors {
        descriptor.source = CapabilitySource::Builtin;
        let capability = Capability::from_descriptor(descriptor)?;
        registry.register(capability)?;
    }

    Ok(())
}

/// Check required dependencies before serving, honoring the fast-boot flags
async fn warm_up(
    config: &AppConfig,
    embedding: &Arc<dyn EmbeddingProvider>,
    vector_index: &Arc<dyn VectorIndexProvider>,
    blob_store: &Arc<dyn BlobStoreProvider>,
) -> Result<()> {
    let policy = BackoffPolicy {
        max_attempts: config.boot.dependency_retry_attempts.max(1),
        ..BackoffPolicy::default()
    };

    if config.boot.lazy_load_ai_selectors {
        info!("lazy AI selector boot: skipping embedding and vector index warm-up");
    } else {
        with_backoff("embedding_warm_up", policy, || async {
            embedding.health_check().await
        })
        .await
        .map_err(|e| {
            Error::upstream(format!("embedding service unreachable at boot: {e}"))
        })?;
        with_backoff("vector_index_warm_up", policy, || async {
            vector_index.health_check().await
        })
        .await
        .map_err(|e| Error::upstream(format!("vector index unreachable at boot: {e}")))?;
    }

    if config.boot.lazy_load_external_services {
        info!("lazy external services boot: skipping blob store warm-up");
    } else if let Err(e) = blob_store.health_check().await {
        // The blob store only matters once a blob resource is read
        warn!(error = %e, "blob store check failed at boot; resource reads may fail");
    }

    Ok(())
}
