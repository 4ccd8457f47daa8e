//! Catalog registry
//!
//! Authoritative, in-memory, process-scoped map of capability definitions.
//! Many concurrent readers, serialized writers; readers always see fully
//! constructed entries because entries are immutable `Arc`s swapped whole.
//! Every successful mutation appends one event to the change feed with a
//! strictly increasing, gap-free sequence number.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use chrono::Utc;
use tokio::sync::broadcast;
use tracing::debug;

use mcs_domain::capability::{Capability, CapabilityKind, CapabilityPayload};
use mcs_domain::error::{Error, Result};
use mcs_domain::events::{RegistryChange, RegistryEvent};

/// Replay horizon of the in-memory change feed log
const EVENT_LOG_CAPACITY: usize = 4096;

/// Broadcast channel depth for live subscribers
const CHANGE_FEED_BUFFER: usize = 1024;

/// Snapshot filter for [`CatalogRegistry::list`]
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    /// Restrict to a category
    pub category: Option<String>,
}

/// Authoritative capability catalog
pub struct CatalogRegistry {
    entries: RwLock<HashMap<(CapabilityKind, String), Arc<Capability>>>,
    event_log: RwLock<VecDeque<RegistryEvent>>,
    seq: AtomicU64,
    feed: broadcast::Sender<RegistryEvent>,
}

impl Default for CatalogRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (feed, _) = broadcast::channel(CHANGE_FEED_BUFFER);
        Self {
            entries: RwLock::new(HashMap::new()),
            event_log: RwLock::new(VecDeque::new()),
            seq: AtomicU64::new(0),
            feed,
        }
    }

    /// Register a new capability
    ///
    /// Succeeds when `(kind, name)` is free and the definition validates.
    /// Re-registering an identical definition is a no-op. A name collision
    /// with a different hash is a conflict; replacing it requires
    /// [`replace`](Self::replace).
    pub fn register(&self, capability: Capability) -> Result<Arc<Capability>> {
        self.validate(&capability)?;
        let key = (capability.kind(), capability.name.clone());

        let mut entries = self.entries.write().expect("registry lock poisoned");
        if let Some(existing) = entries.get(&key) {
            if existing.definition_hash == capability.definition_hash {
                return Ok(Arc::clone(existing));
            }
            return Err(Error::conflict(format!(
                "{} '{}' already registered with a different definition",
                key.0, key.1
            )));
        }

        let entry = Arc::new(capability);
        entries.insert(key, Arc::clone(&entry));
        self.publish(RegistryChange::Added, &entry);
        debug!(kind = %entry.kind(), name = %entry.name, "capability registered");
        Ok(entry)
    }

    /// Atomically swap an existing capability for a new definition
    ///
    /// Counters and the original registration time carry over, so counts
    /// stay continuous across hot swaps. In-flight invocations keep the
    /// definition they captured at dispatch entry.
    pub fn replace(&self, capability: Capability) -> Result<Arc<Capability>> {
        self.validate(&capability)?;
        let key = (capability.kind(), capability.name.clone());

        let mut entries = self.entries.write().expect("registry lock poisoned");
        let existing = entries
            .get(&key)
            .ok_or_else(|| Error::not_found(format!("{} '{}'", key.0, key.1)))?;

        let mut replacement = capability;
        replacement.counters = Arc::clone(&existing.counters);
        replacement.registered_at = existing.registered_at;

        let entry = Arc::new(replacement);
        entries.insert(key, Arc::clone(&entry));
        self.publish(RegistryChange::Replaced, &entry);
        debug!(kind = %entry.kind(), name = %entry.name, "capability replaced");
        Ok(entry)
    }

    /// Remove a capability from the catalog
    pub fn deregister(&self, kind: CapabilityKind, name: &str) -> Result<Arc<Capability>> {
        let key = (kind, name.to_string());
        let mut entries = self.entries.write().expect("registry lock poisoned");
        let removed = entries
            .remove(&key)
            .ok_or_else(|| Error::not_found(format!("{kind} '{name}'")))?;
        self.publish(RegistryChange::Removed, &removed);
        debug!(kind = %kind, name = %name, "capability deregistered");
        Ok(removed)
    }

    /// Fetch one capability by kind and name
    pub fn get(&self, kind: CapabilityKind, name: &str) -> Result<Arc<Capability>> {
        self.entries
            .read()
            .expect("registry lock poisoned")
            .get(&(kind, name.to_string()))
            .cloned()
            .ok_or_else(|| Error::not_found(format!("{kind} '{name}'")))
    }

    /// Snapshot of the catalog, optionally restricted by kind and filter
    ///
    /// The returned vector is a point-in-time view, not a live cursor.
    /// Ordered by (kind, name) for stable listings.
    pub fn list(&self, kind: Option<CapabilityKind>, filter: &ListFilter) -> Vec<Arc<Capability>> {
        let entries = self.entries.read().expect("registry lock poisoned");
        let mut result: Vec<Arc<Capability>> = entries
            .values()
            .filter(|cap| kind.is_none_or(|k| cap.kind() == k))
            .filter(|cap| {
                filter
                    .category
                    .as_ref()
                    .is_none_or(|category| &cap.category == category)
            })
            .cloned()
            .collect();
        result.sort_by(|a, b| {
            (a.kind().as_str(), a.name.as_str()).cmp(&(b.kind().as_str(), b.name.as_str()))
        });
        result
    }

    /// Number of registered capabilities
    pub fn len(&self) -> usize {
        self.entries.read().expect("registry lock poisoned").len()
    }

    /// Whether the catalog is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sequence number of the most recent event, zero when none
    pub fn last_seq(&self) -> u64 {
        self.seq.load(Ordering::SeqCst)
    }

    /// Subscribe to the change feed
    ///
    /// Returns the replayable backlog starting after `from_seq` (everything
    /// retained when `None`) plus a live receiver. Events on the receiver
    /// continue the backlog without gaps as long as the subscriber keeps up
    /// with the broadcast buffer.
    pub fn subscribe(
        &self,
        from_seq: Option<u64>,
    ) -> (Vec<RegistryEvent>, broadcast::Receiver<RegistryEvent>) {
        // Publishers broadcast while holding the log write lock, so taking
        // the read lock across subscribe + snapshot means no event can land
        // in both the replay and the live receiver, and none can fall
        // between them.
        let log = self.event_log.read().expect("registry lock poisoned");
        let receiver = self.feed.subscribe();
        let replay = log
            .iter()
            .filter(|event| from_seq.is_none_or(|seq| event.seq > seq))
            .cloned()
            .collect();
        (replay, receiver)
    }

    /// Validate a capability definition before it enters the catalog
    ///
    /// Checks the structural invariants of the descriptor form, verifies
    /// the definition hash against the canonical serialization, and
    /// compiles tool schemas so broken ones never reach dispatch.
    fn validate(&self, capability: &Capability) -> Result<()> {
        let descriptor = capability.to_descriptor();
        descriptor.validate()?;

        let expected = descriptor.definition_hash()?;
        if expected != capability.definition_hash {
            return Err(Error::invalid_argument(format!(
                "{} '{}' definition hash mismatch",
                capability.kind(),
                capability.name
            )));
        }

        if let CapabilityPayload::Tool(tool) = &capability.payload {
            jsonschema::validator_for(&tool.input_schema).map_err(|e| {
                Error::invalid_argument(format!(
                    "tool '{}' input_schema does not compile: {e}",
                    capability.name
                ))
            })?;
            if let Some(output_schema) = &tool.output_schema {
                jsonschema::validator_for(output_schema).map_err(|e| {
                    Error::invalid_argument(format!(
                        "tool '{}' output_schema does not compile: {e}",
                        capability.name
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Append one event to the log and broadcast it
    ///
    /// Called with the entries write lock held, which serializes sequence
    /// assignment with the mutation itself.
    fn publish(&self, change: RegistryChange, capability: &Arc<Capability>) {
        let seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let event = RegistryEvent {
            seq,
            change,
            kind: capability.kind(),
            name: capability.name.clone(),
            capability: Arc::clone(capability),
            at: Utc::now(),
        };

        let mut log = self.event_log.write().expect("registry lock poisoned");
        if log.len() == EVENT_LOG_CAPACITY {
            log.pop_front();
        }
        log.push_back(event.clone());
        // Broadcast under the log lock; see subscribe() for why. No
        // receivers is fine, the backlog still records the event.
        let _ = self.feed.send(event);
    }
}
