//! Auto-discovery
//!
//! Scans configured capability sources, hashes definitions, and drives the
//! registry: new names register, changed hashes replace, identical hashes
//! are skipped. Parse and validation failures are collected into the
//! report and never abort a pass. Runs at boot before the server opens its
//! listeners, and again on admin-triggered refresh.

use std::path::{Path, PathBuf};
use std::time::Instant;

use globset::{Glob, GlobMatcher};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use mcs_domain::capability::{Capability, CapabilityDescriptor, CapabilityManifest, CapabilitySource};
use mcs_domain::constants::DEFAULT_MANIFEST_FETCH_TIMEOUT_MS;
use mcs_domain::error::{Error, Result};
use mcs_domain::events::{TelemetryEvent, TelemetryEventKind};

use crate::registry::CatalogRegistry;
use crate::telemetry::TelemetryPipeline;

/// Directories never entered during a module scan
const SKIP_DIRS: &[&str] = &[".git", "node_modules", "target", "__pycache__"];

/// Definition file extensions recognized by a module scan
const DEFINITION_EXTENSIONS: &[&str] = &["toml", "json"];

fn default_manifest_timeout_ms() -> u64 {
    DEFAULT_MANIFEST_FETCH_TIMEOUT_MS
}

/// One configured capability source
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscoverySource {
    /// Descriptors declared inline in configuration
    ExplicitList {
        /// The capability definitions
        capabilities: Vec<CapabilityDescriptor>,
    },
    /// Local definition files under the given roots
    ModuleScan {
        /// Directories to walk
        roots: Vec<PathBuf>,
        /// Glob the file path must match, when set
        #[serde(default)]
        include_pattern: Option<String>,
        /// Glob the file path must not match, when set
        #[serde(default)]
        exclude_pattern: Option<String>,
    },
    /// Remote manifest of capability envelopes
    RemoteManifest {
        /// Manifest URL
        url: String,
        /// Authorization header value sent with the fetch, when set
        #[serde(default)]
        auth_header: Option<String>,
    },
}

/// Discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryConfig {
    /// Configured sources, applied in order
    #[serde(default)]
    pub sources: Vec<DiscoverySource>,
    /// Optional JSON cache of the last accepted discovery set
    #[serde(default)]
    pub pipeline_state_path: Option<PathBuf>,
    /// Remote manifest fetch timeout
    #[serde(default = "default_manifest_timeout_ms")]
    pub manifest_timeout_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            pipeline_state_path: None,
            manifest_timeout_ms: default_manifest_timeout_ms(),
        }
    }
}

/// A definition that did not make it into the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RejectedDefinition {
    /// Where the definition came from
    pub source: String,
    /// Why it was rejected
    pub reason: String,
}

/// Result of one discovery pass
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryReport {
    /// Newly registered capability ids
    pub accepted: Vec<String>,
    /// Hot-replaced capability ids
    pub replaced: Vec<String>,
    /// Definitions identical to the registered entry
    pub skipped: usize,
    /// Definitions rejected with their reasons
    pub rejected: Vec<RejectedDefinition>,
    /// Pass duration in milliseconds
    pub duration_ms: u64,
}

impl DiscoveryReport {
    /// Total definitions that entered or stayed in the registry
    pub fn live_total(&self) -> usize {
        self.accepted.len() + self.replaced.len() + self.skipped
    }
}

/// Capability source scanner
pub struct DiscoveryService {
    registry: std::sync::Arc<CatalogRegistry>,
    telemetry: TelemetryPipeline,
    config: DiscoveryConfig,
    http: reqwest::Client,
}

impl DiscoveryService {
    /// Create the service over a registry
    pub fn new(
        registry: std::sync::Arc<CatalogRegistry>,
        telemetry: TelemetryPipeline,
        config: DiscoveryConfig,
    ) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.manifest_timeout_ms))
            .build()
            .unwrap_or_default();
        Self {
            registry,
            telemetry,
            config,
            http,
        }
    }

    /// Boot-time pass: cached state first, then the configured sources
    ///
    /// The cache is a pure cold-start optimization; a missing or stale file
    /// changes nothing but speed.
    pub async fn run_at_boot(&self) -> DiscoveryReport {
        if let Some(path) = self.config.pipeline_state_path.clone() {
            match self.load_cache(&path).await {
                Ok(descriptors) if !descriptors.is_empty() => {
                    info!(
                        count = descriptors.len(),
                        path = %path.display(),
                        "applying cached discovery state"
                    );
                    let mut report = DiscoveryReport::default();
                    self.apply(descriptors, &mut report);
                }
                Ok(_) => {}
                Err(e) => debug!(path = %path.display(), error = %e, "no usable discovery cache"),
            }
        }

        let report = self.run().await;
        if let Some(path) = self.config.pipeline_state_path.clone() {
            if let Err(e) = self.save_cache(&path).await {
                warn!(path = %path.display(), error = %e, "failed to persist discovery cache");
            }
        }
        report
    }

    /// Run one discovery pass over all configured sources
    pub async fn run(&self) -> DiscoveryReport {
        let started = Instant::now();
        let mut report = DiscoveryReport::default();

        for source in self.config.sources.clone() {
            match source {
                DiscoverySource::ExplicitList { capabilities } => {
                    let tagged = capabilities
                        .into_iter()
                        .map(|mut descriptor| {
                            descriptor.source = CapabilitySource::Inline;
                            descriptor
                        })
                        .collect();
                    self.apply(tagged, &mut report);
                }
                DiscoverySource::ModuleScan {
                    roots,
                    include_pattern,
                    exclude_pattern,
                } => {
                    self.scan_modules(&roots, include_pattern, exclude_pattern, &mut report)
                        .await;
                }
                DiscoverySource::RemoteManifest { url, auth_header } => {
                    match self.fetch_manifest(&url, auth_header.as_deref()).await {
                        Ok(descriptors) => {
                            let tagged = descriptors
                                .into_iter()
                                .map(|mut descriptor| {
                                    descriptor.source = CapabilitySource::Remote(url.clone());
                                    descriptor
                                })
                                .collect();
                            self.apply(tagged, &mut report);
                        }
                        Err(e) => report.rejected.push(RejectedDefinition {
                            source: url.clone(),
                            reason: e.to_string(),
                        }),
                    }
                }
            }
        }

        report.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            accepted = report.accepted.len(),
            replaced = report.replaced.len(),
            skipped = report.skipped,
            rejected = report.rejected.len(),
            duration_ms = report.duration_ms,
            "discovery pass finished"
        );
        self.telemetry
            .emit(
                TelemetryEvent::new(TelemetryEventKind::DiscoveryRefreshed)
                    .with_field("accepted", report.accepted.len() as u64)
                    .with_field("replaced", report.replaced.len() as u64)
                    .with_field("skipped", report.skipped as u64)
                    .with_field("rejected", report.rejected.len() as u64)
                    .with_field("duration_ms", report.duration_ms),
            )
            .await;
        report
    }

    /// Register, replace, or skip each descriptor
    fn apply(&self, descriptors: Vec<CapabilityDescriptor>, report: &mut DiscoveryReport) {
        for descriptor in descriptors {
            let origin = descriptor.source.label();
            let named = format!("{}/{}", descriptor.kind.as_str(), descriptor.name);

            let capability = match Capability::from_descriptor(descriptor) {
                Ok(capability) => capability,
                Err(e) => {
                    report.rejected.push(RejectedDefinition {
                        source: origin,
                        reason: e.to_string(),
                    });
                    continue;
                }
            };

            match self.registry.get(capability.kind(), &capability.name) {
                Ok(existing) if existing.definition_hash == capability.definition_hash => {
                    report.skipped += 1;
                }
                Ok(_) => match self.registry.replace(capability) {
                    Ok(entry) => report.replaced.push(entry.id.clone()),
                    Err(e) => report.rejected.push(RejectedDefinition {
                        source: origin,
                        reason: e.to_string(),
                    }),
                },
                Err(_) => match self.registry.register(capability) {
                    Ok(entry) => report.accepted.push(entry.id.clone()),
                    Err(e) => report.rejected.push(RejectedDefinition {
                        source: origin,
                        reason: format!("{named}: {e}"),
                    }),
                },
            }
        }
    }

    /// Walk scan roots and parse every definition file found
    async fn scan_modules(
        &self,
        roots: &[PathBuf],
        include_pattern: Option<String>,
        exclude_pattern: Option<String>,
        report: &mut DiscoveryReport,
    ) {
        let include = match Self::compile_glob(include_pattern.as_deref(), report) {
            Ok(matcher) => matcher,
            Err(()) => return,
        };
        let exclude = match Self::compile_glob(exclude_pattern.as_deref(), report) {
            Ok(matcher) => matcher,
            Err(()) => return,
        };

        for root in roots {
            let files = self.discover_files(root, report).await;
            for path in files {
                if let Some(include) = &include {
                    if !include.is_match(&path) {
                        continue;
                    }
                }
                if let Some(exclude) = &exclude {
                    if exclude.is_match(&path) {
                        continue;
                    }
                }
                match self.parse_definition_file(&path).await {
                    Ok(descriptors) => {
                        let tagged = descriptors
                            .into_iter()
                            .map(|mut descriptor| {
                                descriptor.source =
                                    CapabilitySource::File(path.display().to_string());
                                descriptor
                            })
                            .collect();
                        self.apply(tagged, report);
                    }
                    Err(e) => report.rejected.push(RejectedDefinition {
                        source: path.display().to_string(),
                        reason: e.to_string(),
                    }),
                }
            }
        }
    }

    fn compile_glob(
        pattern: Option<&str>,
        report: &mut DiscoveryReport,
    ) -> std::result::Result<Option<GlobMatcher>, ()> {
        match pattern {
            None => Ok(None),
            Some(pattern) => match Glob::new(pattern) {
                Ok(glob) => Ok(Some(glob.compile_matcher())),
                Err(e) => {
                    report.rejected.push(RejectedDefinition {
                        source: pattern.to_string(),
                        reason: format!("invalid glob: {e}"),
                    });
                    Err(())
                }
            },
        }
    }

    /// Recursively enumerate definition files under a root
    async fn discover_files(&self, root: &Path, report: &mut DiscoveryReport) -> Vec<PathBuf> {
        let mut files = Vec::new();
        let mut dirs_to_visit = vec![root.to_path_buf()];

        while let Some(dir_path) = dirs_to_visit.pop() {
            let mut entries = match tokio::fs::read_dir(&dir_path).await {
                Ok(entries) => entries,
                Err(e) => {
                    report.rejected.push(RejectedDefinition {
                        source: dir_path.display().to_string(),
                        reason: format!("unreadable directory: {e}"),
                    });
                    continue;
                }
            };

            while let Ok(Some(entry)) = entries.next_entry().await {
                let entry_path = entry.path();
                if entry_path.is_dir() {
                    if Self::should_visit_dir(&entry_path) {
                        dirs_to_visit.push(entry_path);
                    }
                } else if Self::is_definition_file(&entry_path) {
                    files.push(entry_path);
                }
            }
        }

        files.sort();
        files
    }

    /// Check if a directory should be entered during a scan
    fn should_visit_dir(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| !SKIP_DIRS.contains(&name))
            .unwrap_or(true)
    }

    /// Check if a file has a recognized definition extension
    fn is_definition_file(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| DEFINITION_EXTENSIONS.contains(&ext))
            .unwrap_or(false)
    }

    /// Parse one definition file into descriptors
    async fn parse_definition_file(&self, path: &Path) -> Result<Vec<CapabilityDescriptor>> {
        let text = tokio::fs::read_to_string(path).await?;
        let manifest: CapabilityManifest = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&text)
                .map_err(|e| Error::invalid_argument(format!("invalid TOML manifest: {e}")))?,
            _ => serde_json::from_str(&text)
                .map_err(|e| Error::invalid_argument(format!("invalid JSON manifest: {e}")))?,
        };
        Ok(manifest.capabilities)
    }

    /// Fetch and parse a remote manifest
    async fn fetch_manifest(
        &self,
        url: &str,
        auth_header: Option<&str>,
    ) -> Result<Vec<CapabilityDescriptor>> {
        let mut request = self.http.get(url);
        if let Some(auth) = auth_header {
            request = request.header("Authorization", auth);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::upstream_with_source(format!("manifest fetch failed: {url}"), e))?;
        if !response.status().is_success() {
            return Err(Error::upstream(format!(
                "manifest fetch returned {} for {url}",
                response.status()
            )));
        }

        let body: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::upstream_with_source("manifest body unreadable", e))?;

        // Accept either a bare array of envelopes or a manifest object
        if body.is_array() {
            Ok(serde_json::from_value(body)?)
        } else {
            let manifest: CapabilityManifest = serde_json::from_value(body)?;
            Ok(manifest.capabilities)
        }
    }

    /// Load the discovery cache file
    async fn load_cache(&self, path: &Path) -> Result<Vec<CapabilityDescriptor>> {
        let text = tokio::fs::read_to_string(path).await?;
        let manifest: CapabilityManifest = serde_json::from_str(&text)?;
        Ok(manifest.capabilities)
    }

    /// Persist the current catalog as the discovery cache
    async fn save_cache(&self, path: &Path) -> Result<()> {
        let manifest = CapabilityManifest {
            capabilities: self
                .registry
                .list(None, &Default::default())
                .iter()
                .map(|capability| capability.to_descriptor())
                .collect(),
        };
        let text = serde_json::to_string_pretty(&manifest)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, text).await?;
        Ok(())
    }
}
