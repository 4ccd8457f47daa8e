//! Embedding value objects
//!
//! The embedding vector itself plus the index record kept for every
//! searchable catalog entry. `(item_type, name)` is the unique index key.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Semantic text embedding
///
/// Vectors are assumed unit-norm by the cosine-similarity index; providers
/// normalize on the way out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Embedding {
    /// The embedding vector values
    pub vector: Vec<f32>,
    /// Name of the model that generated this embedding
    pub model: String,
    /// Dimensionality of the embedding vector
    pub dimensions: usize,
}

impl Embedding {
    /// Scale the vector to unit length; zero vectors stay zero
    pub fn normalized(mut self) -> Self {
        let norm: f32 = self.vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut self.vector {
                *x /= norm;
            }
        }
        self
    }
}

/// Type of an indexed item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    /// Tool capability
    Tool,
    /// Prompt capability
    Prompt,
    /// Resource capability
    Resource,
    /// Free-standing metadata entry
    Metadata,
}

impl ItemType {
    /// Stable lowercase label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tool => "tool",
            Self::Prompt => "prompt",
            Self::Resource => "resource",
            Self::Metadata => "metadata",
        }
    }
}

impl std::fmt::Display for ItemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Index record for one searchable entity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingRecord {
    /// Item type; unique together with `name`
    pub item_type: ItemType,
    /// Item name; unique together with `item_type`
    pub name: String,
    /// Grouping label, filterable
    pub category: String,
    /// Description text the embedding was computed from
    pub description: String,
    /// The embedding vector
    pub embedding: Embedding,
    /// Search keywords
    pub keywords: Vec<String>,
    /// Free-form metadata; carries the source definition hash
    pub metadata: HashMap<String, serde_json::Value>,
    /// Record creation time
    pub created_at: DateTime<Utc>,
    /// Last update time
    pub updated_at: DateTime<Utc>,
}

impl EmbeddingRecord {
    /// Definition hash of the capability this record was built from, if set
    pub fn source_hash(&self) -> Option<&str> {
        self.metadata.get("definition_hash").and_then(|v| v.as_str())
    }
}

/// Filter predicate for index searches and stats
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexFilter {
    /// Restrict to a single item type
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<ItemType>,
    /// Restrict to a category
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Free-form metadata equality constraints
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl IndexFilter {
    /// Filter on item type only
    pub fn for_item_type(item_type: ItemType) -> Self {
        Self {
            item_type: Some(item_type),
            ..Self::default()
        }
    }

    /// Whether a record satisfies the filter
    pub fn matches(&self, record: &EmbeddingRecord) -> bool {
        if let Some(item_type) = self.item_type {
            if record.item_type != item_type {
                return false;
            }
        }
        if let Some(category) = &self.category {
            if &record.category != category {
                return false;
            }
        }
        self.metadata
            .iter()
            .all(|(k, v)| record.metadata.get(k) == Some(v))
    }
}

/// Aggregate counts returned by the index
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IndexStats {
    /// Records matching the filter
    pub total: u64,
    /// Records per item type
    pub by_item_type: HashMap<String, u64>,
}
