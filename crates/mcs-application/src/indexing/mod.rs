//! Indexing pipeline
//!
//! Keeps the vector index eventually consistent with the registry. A
//! worker follows the registry change feed: register/replace upserts an
//! embedding record, deregister deletes it. Failures retry with backoff
//! and surface as non-fatal telemetry; the capability stays usable without
//! vector search. A sweeper reaps index records whose capability is gone.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use mcs_domain::capability::{Capability, CapabilityKind};
use mcs_domain::constants::DEFAULT_INDEX_STALE_AFTER_SECS;
use mcs_domain::error::{ErrorKind, Result};
use mcs_domain::events::{RegistryChange, RegistryEvent, TelemetryEvent, TelemetryEventKind};
use mcs_domain::ports::{EmbeddingProvider, InvocationContext, VectorIndexProvider};
use mcs_domain::value_objects::{Claims, EmbeddingRecord, IndexFilter, ItemType};

use crate::handlers::HandlerRegistry;
use crate::registry::CatalogRegistry;
use crate::retry::with_default_backoff;
use crate::telemetry::TelemetryPipeline;

/// Longest resource body slice contributing to an embedding
const MAX_INDEXED_BODY_CHARS: usize = 2_048;

/// Budget for reading a resource body during indexing
const BODY_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Indexing pipeline configuration
#[derive(Debug, Clone)]
pub struct IndexingConfig {
    /// Capacity of the direct-submission queue
    pub queue_capacity: usize,
    /// Age after which an index record with no live capability is reaped
    pub stale_after: Duration,
    /// Sweep cadence
    pub sweep_interval: Duration,
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1_024,
            stale_after: Duration::from_secs(DEFAULT_INDEX_STALE_AFTER_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_INDEX_STALE_AFTER_SECS),
        }
    }
}

/// Direct submission into the pipeline, bypassing the change feed
#[derive(Debug, Clone)]
pub enum IndexJob {
    /// Index or refresh one standalone metadata entry
    UpsertMetadata {
        /// Record name, unique within metadata entries
        name: String,
        /// Category label
        category: String,
        /// Text to embed
        text: String,
    },
    /// Remove one record
    Delete {
        /// Item type of the record
        item_type: ItemType,
        /// Record name
        name: String,
    },
}

/// Handle to the running pipeline
pub struct IndexingPipeline {
    tx: mpsc::Sender<IndexJob>,
    dropped: Arc<AtomicU64>,
}

impl IndexingPipeline {
    /// Spawn the pipeline worker
    ///
    /// The worker replays the registry backlog first, so capabilities
    /// registered before the spawn still get indexed.
    pub fn spawn(
        registry: Arc<CatalogRegistry>,
        embedding: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndexProvider>,
        handlers: Arc<HandlerRegistry>,
        telemetry: TelemetryPipeline,
        config: IndexingConfig,
        shutdown: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        let dropped = Arc::new(AtomicU64::new(0));

        let worker = Worker {
            registry,
            embedding,
            index,
            handlers,
            telemetry,
            config,
            stale_candidates: HashMap::new(),
        };
        let handle = tokio::spawn(worker.run(rx, shutdown));

        (Self { tx, dropped }, handle)
    }

    /// Submit a job without waiting
    ///
    /// Overflow drops the job with an alert, per the bounded-queue
    /// contract; the catalog itself is unaffected.
    pub fn try_submit(&self, job: IndexJob) -> bool {
        match self.tx.try_send(job) {
            Ok(()) => true,
            Err(e) => {
                let total = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                error!(
                    dropped_total = total,
                    error = %e,
                    "indexing queue full; dropping indexing request"
                );
                false
            }
        }
    }

    /// Jobs dropped due to queue overflow
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Pipeline worker state
struct Worker {
    registry: Arc<CatalogRegistry>,
    embedding: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndexProvider>,
    handlers: Arc<HandlerRegistry>,
    telemetry: TelemetryPipeline,
    config: IndexingConfig,
    /// First-seen times of index records with no live capability
    stale_candidates: HashMap<(ItemType, String), Instant>,
}

impl Worker {
    async fn run(mut self, mut rx: mpsc::Receiver<IndexJob>, shutdown: CancellationToken) {
        let (backlog, mut feed) = self.registry.subscribe(None);
        for event in backlog {
            self.handle_event(event).await;
        }

        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    debug!("indexing pipeline shutting down");
                    return;
                }
                event = feed.recv() => match event {
                    Ok(event) => self.handle_event(event).await,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!(missed, "indexing worker lagged behind the change feed; records may go stale until the next sweep");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                },
                job = rx.recv() => match job {
                    Some(job) => self.handle_job(job).await,
                    None => return,
                },
                _ = sweep.tick() => self.sweep().await,
            }
        }
    }

    async fn handle_event(&mut self, event: RegistryEvent) {
        match event.change {
            RegistryChange::Added | RegistryChange::Replaced => {
                self.index_capability(&event.capability).await;
            }
            RegistryChange::Removed => {
                let item_type = item_type_for(event.kind);
                if let Err(e) = self.index.delete(item_type, &event.name).await {
                    if e.kind() != ErrorKind::NotFound {
                        warn!(name = %event.name, error = %e, "failed to delete index record");
                    }
                }
            }
        }
    }

    async fn handle_job(&mut self, job: IndexJob) {
        match job {
            IndexJob::UpsertMetadata {
                name,
                category,
                text,
            } => {
                self.upsert_record(ItemType::Metadata, &name, &category, &text, &[], None)
                    .await;
            }
            IndexJob::Delete { item_type, name } => {
                if let Err(e) = self.index.delete(item_type, &name).await {
                    if e.kind() != ErrorKind::NotFound {
                        warn!(name = %name, error = %e, "failed to delete index record");
                    }
                }
            }
        }
    }

    /// Embed and upsert one capability
    async fn index_capability(&self, capability: &Capability) {
        let mut text = capability.embedding_text();
        if let Some(extra) = self.resource_body_excerpt(capability).await {
            text.push(' ');
            text.push_str(&extra);
        }

        self.upsert_record(
            item_type_for(capability.kind()),
            &capability.name,
            &capability.category,
            &text,
            &capability.keywords,
            Some(capability.definition_hash.clone()),
        )
        .await;
    }

    /// Body excerpt for resources that opted into body indexing
    async fn resource_body_excerpt(&self, capability: &Capability) -> Option<String> {
        let resource = match &capability.payload {
            mcs_domain::capability::CapabilityPayload::Resource(resource)
                if resource.index_body && resource.is_textual() =>
            {
                resource.clone()
            }
            _ => return None,
        };
        let reader = self.handlers.resolve_reader(&resource.reader_ref).ok()?;

        let ctx = InvocationContext {
            request_id: format!("indexing-{}", capability.name),
            session_id: "indexing".to_string(),
            claims: Claims::privileged(),
            deadline: Instant::now() + BODY_READ_TIMEOUT,
            cancel: CancellationToken::new(),
        };
        let body = tokio::time::timeout(BODY_READ_TIMEOUT, reader.read(&ctx, &resource.uri))
            .await
            .ok()?
            .ok()?;

        let text = String::from_utf8_lossy(&body.bytes);
        let mut excerpt: String = text.chars().take(MAX_INDEXED_BODY_CHARS).collect();
        excerpt.truncate(excerpt.trim_end().len());
        Some(excerpt)
    }

    /// Embed text and write the record, retrying transient failures
    async fn upsert_record(
        &self,
        item_type: ItemType,
        name: &str,
        category: &str,
        text: &str,
        keywords: &[String],
        definition_hash: Option<String>,
    ) {
        let result = with_default_backoff("index_upsert", || async {
            let embedding = self.embedding.embed(text).await?.normalized();
            let now = Utc::now();
            let mut metadata = HashMap::new();
            if let Some(hash) = &definition_hash {
                metadata.insert(
                    "definition_hash".to_string(),
                    serde_json::Value::String(hash.clone()),
                );
            }
            let record = EmbeddingRecord {
                item_type,
                name: name.to_string(),
                category: category.to_string(),
                description: text.to_string(),
                embedding,
                keywords: keywords.to_vec(),
                metadata,
                created_at: now,
                updated_at: now,
            };
            self.index.upsert(record).await
        })
        .await;

        let event = match result {
            Ok(()) => TelemetryEvent::new(TelemetryEventKind::EmbeddingIndexed)
                .with_field("item_type", item_type.as_str())
                .with_field("name", name)
                .with_field("status", "ok"),
            Err(e) => {
                warn!(
                    item_type = item_type.as_str(),
                    name,
                    error = %e,
                    "indexing failed; capability remains usable without vector search"
                );
                TelemetryEvent::new(TelemetryEventKind::EmbeddingIndexed)
                    .with_field("item_type", item_type.as_str())
                    .with_field("name", name)
                    .with_field("status", e.kind().as_str())
            }
        };
        self.telemetry.emit(event).await;
    }

    /// Reap index records whose capability is gone
    async fn sweep(&mut self) {
        let keys = match self.index.list_keys(&IndexFilter::default()).await {
            Ok(keys) => keys,
            Err(e) => {
                debug!(error = %e, "sweep skipped; index unavailable");
                return;
            }
        };

        let now = Instant::now();
        let mut live_keys = Vec::with_capacity(keys.len());
        for (item_type, name) in keys {
            let kind = match capability_kind_for(item_type) {
                Some(kind) => kind,
                // Metadata entries have no registry counterpart
                None => continue,
            };
            if self.registry.get(kind, &name).is_ok() {
                self.stale_candidates.remove(&(item_type, name));
                continue;
            }

            let first_seen = *self
                .stale_candidates
                .entry((item_type, name.clone()))
                .or_insert(now);
            if now.duration_since(first_seen) >= self.config.stale_after {
                match self.index.delete(item_type, &name).await {
                    Ok(()) | Err(_) => {
                        self.stale_candidates.remove(&(item_type, name.clone()));
                    }
                }
                debug!(item_type = item_type.as_str(), name = %name, "reaped stale index record");
            } else {
                live_keys.push((item_type, name));
            }
        }

        // Forget candidates whose records disappeared on their own
        self.stale_candidates
            .retain(|key, _| live_keys.contains(key));
    }
}

/// Item type of a capability kind
pub fn item_type_for(kind: CapabilityKind) -> ItemType {
    match kind {
        CapabilityKind::Tool => ItemType::Tool,
        CapabilityKind::Prompt => ItemType::Prompt,
        CapabilityKind::Resource => ItemType::Resource,
    }
}

/// Capability kind of an item type, when one exists
pub fn capability_kind_for(item_type: ItemType) -> Option<CapabilityKind> {
    match item_type {
        ItemType::Tool => Some(CapabilityKind::Tool),
        ItemType::Prompt => Some(CapabilityKind::Prompt),
        ItemType::Resource => Some(CapabilityKind::Resource),
        ItemType::Metadata => None,
    }
}
