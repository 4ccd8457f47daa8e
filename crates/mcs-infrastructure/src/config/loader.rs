//! Configuration loader
//!
//! Merges, in order of increasing precedence: `AppConfig::default()`, a
//! TOML configuration file, `MCS__`-prefixed environment variables (double
//! underscore separates nesting levels), and finally the handful of plain
//! environment variables recognized for fleet deployment
//! (`SERVICE_PORT`, `DIRECTORY_URL`, ...).

use std::env;
use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use tracing::{info, warn};

use mcs_domain::error::{Error, Result};

use crate::config::types::AppConfig;

/// Environment prefix for structured overrides
const CONFIG_ENV_PREFIX: &str = "MCS";

/// Default configuration file name
const DEFAULT_CONFIG_FILENAME: &str = "mcs.toml";

/// Configuration loader service
#[derive(Clone, Default)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self { config_path: None }
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration from all sources
    pub fn load(&self) -> Result<AppConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(AppConfig::default()));

        if let Some(config_path) = &self.config_path {
            if config_path.exists() {
                figment = figment.merge(Toml::file(config_path));
                info!(path = %config_path.display(), "configuration file loaded");
            } else {
                warn!(path = %config_path.display(), "configuration file not found; using defaults");
            }
        } else if let Some(default_path) = Self::find_default_config_path() {
            figment = figment.merge(Toml::file(&default_path));
            info!(path = %default_path.display(), "configuration file loaded");
        }

        // Structured overrides: MCS__SERVER__PORT=9000 etc.
        figment = figment.merge(Env::prefixed(&format!("{CONFIG_ENV_PREFIX}__")).split("__"));

        let mut config: AppConfig = figment
            .extract()
            .map_err(|e| Error::configuration_with_source("failed to extract configuration", e))?;

        apply_plain_env_overrides(&mut config);
        validate_app_config(&config)?;
        Ok(config)
    }

    /// Find the default configuration file, if one exists
    fn find_default_config_path() -> Option<PathBuf> {
        let current_dir = env::current_dir().ok()?;
        let candidates = [
            current_dir.join(DEFAULT_CONFIG_FILENAME),
            current_dir.join("config").join(DEFAULT_CONFIG_FILENAME),
        ];
        candidates.into_iter().find(|path| path.exists())
    }
}

/// Overlay the plain environment variables recognized for deployment
fn apply_plain_env_overrides(config: &mut AppConfig) {
    if let Ok(host) = env::var("SERVICE_HOST") {
        if !host.is_empty() {
            config.server.host = host;
        }
    }
    if let Ok(port) = env::var("SERVICE_PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %port, "ignoring unparseable SERVICE_PORT"),
        }
    }
    if let Ok(url) = env::var("DIRECTORY_URL") {
        if !url.is_empty() {
            config.directory.base_url = url;
            config.directory.provider = "http".to_string();
            config.directory.enabled = true;
        }
    }
    if let Ok(url) = env::var("VECTOR_STORE_URL") {
        if !url.is_empty() {
            config.providers.vector_index.base_url = url;
            config.providers.vector_index.provider = "http".to_string();
        }
    }
    if let Ok(url) = env::var("BLOB_STORE_URL") {
        if !url.is_empty() {
            // Only file URLs are supported; the store is local to the node
            config.providers.blob_store.provider = "filesystem".to_string();
            config.providers.blob_store.root =
                PathBuf::from(url.strip_prefix("file://").unwrap_or(&url));
        }
    }
    if let Ok(url) = env::var("EMBEDDING_SERVICE_URL") {
        if !url.is_empty() {
            config.providers.embedding.base_url = url;
            config.providers.embedding.provider = "http".to_string();
        }
    }
    if let Ok(level) = env::var("LOG_LEVEL") {
        if !level.is_empty() {
            config.logging.level = level;
        }
    }
    if let Ok(value) = env::var("LAZY_LOAD_AI_SELECTORS") {
        config.boot.lazy_load_ai_selectors = parse_bool(&value);
    }
    if let Ok(value) = env::var("LAZY_LOAD_EXTERNAL_SERVICES") {
        config.boot.lazy_load_external_services = parse_bool(&value);
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

/// Validate application configuration
fn validate_app_config(config: &AppConfig) -> Result<()> {
    if config.server.port == 0 {
        return Err(Error::configuration("server port cannot be 0"));
    }
    if config.server.service_name.trim().is_empty() {
        return Err(Error::configuration("service name cannot be empty"));
    }
    if config.selector.timeout_ms == 0 {
        return Err(Error::configuration("selector timeout cannot be 0"));
    }
    if config.selector.min_results == 0 {
        return Err(Error::configuration("selector min_results cannot be 0"));
    }
    if config.dispatcher.per_capability_concurrency == 0
        || config.dispatcher.global_concurrency == 0
    {
        return Err(Error::configuration("dispatcher concurrency caps cannot be 0"));
    }
    if config.providers.embedding.dimensions == 0 {
        return Err(Error::configuration("embedding dimensions cannot be 0"));
    }

    let embedding = config.providers.embedding.provider.as_str();
    if !matches!(embedding, "null" | "http") {
        return Err(Error::configuration(format!(
            "unknown embedding provider '{embedding}' (expected null or http)"
        )));
    }
    let vector = config.providers.vector_index.provider.as_str();
    if !matches!(vector, "memory" | "http" | "null") {
        return Err(Error::configuration(format!(
            "unknown vector index provider '{vector}' (expected memory, http, or null)"
        )));
    }
    let blob = config.providers.blob_store.provider.as_str();
    if !matches!(blob, "memory" | "filesystem") {
        return Err(Error::configuration(format!(
            "unknown blob store provider '{blob}' (expected memory or filesystem)"
        )));
    }
    let directory = config.directory.provider.as_str();
    if !matches!(directory, "null" | "http") {
        return Err(Error::configuration(format!(
            "unknown directory provider '{directory}' (expected null or http)"
        )));
    }
    for sink in &config.telemetry.sinks {
        if !matches!(sink.as_str(), "stdout" | "file" | "null") {
            return Err(Error::configuration(format!(
                "unknown telemetry sink '{sink}' (expected stdout, file, or null)"
            )));
        }
    }
    if config.directory.enabled && config.directory.heartbeat_interval_secs == 0 {
        return Err(Error::configuration(
            "directory heartbeat interval cannot be 0 when the agent is enabled",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(validate_app_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn zero_port_is_rejected() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_app_config(&config).is_err());
    }

    #[test]
    fn unknown_provider_is_rejected() {
        let mut config = AppConfig::default();
        config.providers.embedding.provider = "quantum".to_string();
        assert!(validate_app_config(&config).is_err());
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mcs.toml");
        std::fs::write(
            &path,
            r#"
                [server]
                port = 9000
                transport_mode = "hybrid"

                [selector]
                timeout_ms = 800
            "#,
        )
        .unwrap();

        let config = ConfigLoader::new().with_config_path(&path).load().unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(
            config.server.transport_mode,
            crate::config::TransportMode::Hybrid
        );
        assert_eq!(config.selector.timeout_ms, 800);
        // Untouched sections keep their defaults
        assert_eq!(config.providers.embedding.provider, "null");
    }

    #[test]
    fn boolean_parsing_accepts_common_spellings() {
        assert!(parse_bool("true"));
        assert!(parse_bool("1"));
        assert!(parse_bool("Yes"));
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("banana"));
    }
}
