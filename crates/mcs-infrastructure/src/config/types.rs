//! Configuration types
//!
//! Every section carries serde defaults, so an empty file and an empty
//! environment yield a runnable standalone configuration (null embedding,
//! in-memory index, no directory).

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mcs_application::discovery::DiscoveryConfig;
use mcs_application::dispatcher::DispatcherConfig;
use mcs_application::indexing::IndexingConfig;
use mcs_application::selector::{RerankerMode, SelectorConfig};
use mcs_domain::constants::{
    DEFAULT_CANCEL_GRACE_MS, DEFAULT_GLOBAL_CONCURRENCY, DEFAULT_INDEX_STALE_AFTER_SECS,
    DEFAULT_PER_CAPABILITY_CONCURRENCY, DEFAULT_SELECTOR_MIN_RESULTS,
    DEFAULT_SELECTOR_TIMEOUT_MS, DEFAULT_TOOL_TIMEOUT_MS, SELECTOR_SCORE_FLOOR,
};

/// Transport selection for the protocol server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// MCP over stdin/stdout only
    #[default]
    Stdio,
    /// HTTP (MCP JSON-RPC + admin surface) only
    Http,
    /// Both stdio and HTTP concurrently
    Hybrid,
}

/// Network and identity settings of the server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Logical service name, used for directory registration
    pub service_name: String,
    /// Bind host
    pub host: String,
    /// Bind port for the HTTP surface
    pub port: u16,
    /// Transport selection
    pub transport_mode: TransportMode,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service_name: "capability-server".to_string(),
            host: "127.0.0.1".to_string(),
            port: 7423,
            transport_mode: TransportMode::Stdio,
        }
    }
}

/// Output format of the log stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Compact human-readable lines
    #[default]
    Text,
    /// One JSON object per line, for log collectors
    Json,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    pub level: String,
    /// Output format
    pub format: LogFormat,
    /// Optional rolling log file
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
            file_output: None,
        }
    }
}

/// Selector settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorSettings {
    /// Hard budget for the semantic path, in milliseconds
    pub timeout_ms: u64,
    /// Results kept even below the score floor
    pub min_results: usize,
    /// Hits below this final score are dropped
    pub score_floor: f64,
    /// Reranker stage: none or generate
    pub reranker: RerankerMode,
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            timeout_ms: DEFAULT_SELECTOR_TIMEOUT_MS,
            min_results: DEFAULT_SELECTOR_MIN_RESULTS,
            score_floor: SELECTOR_SCORE_FLOOR,
            reranker: RerankerMode::None,
        }
    }
}

impl SelectorSettings {
    /// Convert into the application-layer configuration
    pub fn to_selector_config(&self) -> SelectorConfig {
        SelectorConfig {
            timeout: Duration::from_millis(self.timeout_ms),
            min_results: self.min_results,
            score_floor: self.score_floor,
            reranker: self.reranker,
        }
    }
}

/// Dispatcher settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatcherSettings {
    /// Concurrent invocations allowed per capability
    pub per_capability_concurrency: usize,
    /// Concurrent invocations allowed process-wide
    pub global_concurrency: usize,
    /// Invocations allowed to wait for a slot
    pub max_queued: usize,
    /// Default tool runtime cap in milliseconds
    pub default_timeout_ms: u64,
    /// Cancellation grace window in milliseconds
    pub cancel_grace_ms: u64,
}

impl Default for DispatcherSettings {
    fn default() -> Self {
        Self {
            per_capability_concurrency: DEFAULT_PER_CAPABILITY_CONCURRENCY,
            global_concurrency: DEFAULT_GLOBAL_CONCURRENCY,
            max_queued: 256,
            default_timeout_ms: DEFAULT_TOOL_TIMEOUT_MS,
            cancel_grace_ms: DEFAULT_CANCEL_GRACE_MS,
        }
    }
}

impl DispatcherSettings {
    /// Convert into the application-layer configuration
    pub fn to_dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            per_capability_concurrency: self.per_capability_concurrency,
            global_concurrency: self.global_concurrency,
            max_queued: self.max_queued,
            default_timeout: Duration::from_millis(self.default_timeout_ms),
            cancel_grace: Duration::from_millis(self.cancel_grace_ms),
        }
    }
}

/// Indexing pipeline settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexingSettings {
    /// Direct-submission queue capacity
    pub queue_capacity: usize,
    /// Stale-record age before the sweeper reaps it, in seconds
    pub stale_after_secs: u64,
    /// Sweep cadence in seconds
    pub sweep_interval_secs: u64,
}

impl Default for IndexingSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            stale_after_secs: DEFAULT_INDEX_STALE_AFTER_SECS,
            sweep_interval_secs: DEFAULT_INDEX_STALE_AFTER_SECS,
        }
    }
}

impl IndexingSettings {
    /// Convert into the application-layer configuration
    pub fn to_indexing_config(&self) -> IndexingConfig {
        IndexingConfig {
            queue_capacity: self.queue_capacity,
            stale_after: Duration::from_secs(self.stale_after_secs),
            sweep_interval: Duration::from_secs(self.sweep_interval_secs),
        }
    }
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    /// Provider name: null or http
    pub provider: String,
    /// Service base URL (http provider)
    pub base_url: String,
    /// Bearer token (http provider)
    pub api_key: Option<String>,
    /// Embedding model name
    pub model: String,
    /// Generation model name
    pub generation_model: String,
    /// Vector dimensionality
    pub dimensions: usize,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// Billing rate per 1000 tokens
    pub cost_per_1k_tokens_usd: f64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "null".to_string(),
            base_url: "http://127.0.0.1:8091/v1".to_string(),
            api_key: None,
            model: "text-embedding-3-small".to_string(),
            generation_model: "gpt-4o-mini".to_string(),
            dimensions: mcs_domain::constants::DEFAULT_EMBEDDING_DIMENSIONS,
            timeout_ms: mcs_domain::constants::DEFAULT_EMBEDDING_TIMEOUT_MS,
            cost_per_1k_tokens_usd: 0.0,
        }
    }
}

/// Vector index provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorIndexSettings {
    /// Provider name: memory, http, or null
    pub provider: String,
    /// Service base URL (http provider)
    pub base_url: String,
    /// Bearer token (http provider)
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
}

impl Default for VectorIndexSettings {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            base_url: "http://127.0.0.1:8092".to_string(),
            api_key: None,
            timeout_ms: mcs_domain::constants::DEFAULT_VECTOR_SEARCH_TIMEOUT_MS,
        }
    }
}

/// Blob store provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlobStoreSettings {
    /// Provider name: memory or filesystem
    pub provider: String,
    /// Store root directory (filesystem provider)
    pub root: PathBuf,
}

impl Default for BlobStoreSettings {
    fn default() -> Self {
        Self {
            provider: "memory".to_string(),
            root: PathBuf::from("./data/blobs"),
        }
    }
}

/// One remote tool endpoint registered as a handler at boot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteToolSettings {
    /// Handler ref tool definitions use to reach this endpoint
    pub handler_ref: String,
    /// Endpoint URL invocation arguments are POSTed to
    pub endpoint: String,
}

/// Provider selection block
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    /// Embedding and generation client
    #[serde(default)]
    pub embedding: EmbeddingSettings,
    /// Vector index client
    #[serde(default)]
    pub vector_index: VectorIndexSettings,
    /// Blob store
    #[serde(default)]
    pub blob_store: BlobStoreSettings,
    /// Remote tool endpoints
    #[serde(default)]
    pub remote_tools: Vec<RemoteToolSettings>,
}

/// Service directory settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Whether the agent runs at all
    pub enabled: bool,
    /// Client name: null or http
    pub provider: String,
    /// Directory base URL (http provider)
    pub base_url: String,
    /// Directory access token (http provider)
    pub token: Option<String>,
    /// Routing tags advertised with the registration
    pub tags: Vec<String>,
    /// Heartbeat interval in seconds
    pub heartbeat_interval_secs: u64,
    /// Per-probe timeout in milliseconds
    pub check_timeout_ms: u64,
    /// Missed-heartbeat window before the directory reaps the instance
    pub deregister_after_secs: u64,
    /// Probe failures in a row before the instance reports unhealthy
    pub consecutive_failures_to_unhealthy: u32,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "null".to_string(),
            base_url: "http://127.0.0.1:8500".to_string(),
            token: None,
            tags: vec!["mcp".to_string()],
            heartbeat_interval_secs: 10,
            check_timeout_ms: mcs_domain::constants::DEFAULT_HEALTH_CHECK_TIMEOUT_MS,
            deregister_after_secs: 60,
            consecutive_failures_to_unhealthy: 3,
        }
    }
}

/// Telemetry sink settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetrySettings {
    /// Sink names: stdout, file, null
    pub sinks: Vec<String>,
    /// Output path for the file sink
    pub file_path: PathBuf,
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self {
            sinks: vec!["stdout".to_string()],
            file_path: PathBuf::from("./data/telemetry.jsonl"),
        }
    }
}

/// Boot behavior flags
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BootConfig {
    /// Skip embedding/vector warm-up; the selector degrades to rule-based
    /// ranking until the first successful semantic call
    #[serde(default)]
    pub lazy_load_ai_selectors: bool,
    /// Defer directory registration and blob store checks
    #[serde(default)]
    pub lazy_load_external_services: bool,
    /// Warm-up attempts before a required dependency is declared
    /// unreachable
    #[serde(default = "default_dependency_retry_attempts")]
    pub dependency_retry_attempts: u32,
}

impl Default for BootConfig {
    fn default() -> Self {
        Self {
            lazy_load_ai_selectors: false,
            lazy_load_external_services: false,
            dependency_retry_attempts: default_dependency_retry_attempts(),
        }
    }
}

fn default_dependency_retry_attempts() -> u32 {
    mcs_domain::constants::RETRY_MAX_ATTEMPTS
}

/// Root application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server identity and transports
    #[serde(default)]
    pub server: ServerConfig,
    /// Logging
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Discovery sources
    #[serde(default)]
    pub discovery: DiscoveryConfig,
    /// Selector tuning
    #[serde(default)]
    pub selector: SelectorSettings,
    /// Dispatcher tuning
    #[serde(default)]
    pub dispatcher: DispatcherSettings,
    /// Indexing pipeline tuning
    #[serde(default)]
    pub indexing: IndexingSettings,
    /// Provider selection
    #[serde(default)]
    pub providers: ProvidersConfig,
    /// Service directory agent
    #[serde(default)]
    pub directory: DirectorySettings,
    /// Telemetry sinks
    #[serde(default)]
    pub telemetry: TelemetrySettings,
    /// Boot behavior
    #[serde(default)]
    pub boot: BootConfig,
}
