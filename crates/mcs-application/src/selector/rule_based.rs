//! Rule-based catalog ranking
//!
//! The non-embedding fallback: substring and tokenized keyword matching
//! over name, category, keywords, and description, with a BM25-like
//! saturating score normalized to [0, 1]. Used when embeddings are
//! unavailable or the semantic path exceeds its budget.

use std::sync::Arc;

use mcs_domain::capability::Capability;
use mcs_domain::value_objects::SearchHit;

/// Field weights; name hits dominate, description hits break ties
const WEIGHT_NAME: f64 = 3.0;
const WEIGHT_KEYWORD: f64 = 2.5;
const WEIGHT_CATEGORY: f64 = 1.5;
const WEIGHT_DESCRIPTION: f64 = 1.0;

/// Saturation constant for score normalization
const SATURATION: f64 = 2.0;

/// Lowercase alphanumeric tokens of a text
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Raw (unsaturated) match weight of one capability against query tokens
fn raw_score(capability: &Capability, query: &str, query_tokens: &[String]) -> f64 {
    let name = capability.name.to_lowercase();
    let category = capability.category.to_lowercase();
    let description_tokens = tokenize(&capability.description);
    let name_tokens = tokenize(&capability.name);
    let keyword_tokens: Vec<String> = capability
        .keywords
        .iter()
        .flat_map(|k| tokenize(k))
        .collect();

    let mut score = 0.0;
    for token in query_tokens {
        if name_tokens.iter().any(|t| t == token) {
            score += WEIGHT_NAME;
        } else if name.contains(token.as_str()) {
            score += WEIGHT_NAME / 2.0;
        }
        if keyword_tokens.iter().any(|t| t == token) {
            score += WEIGHT_KEYWORD;
        }
        if category.contains(token.as_str()) {
            score += WEIGHT_CATEGORY;
        }
        if description_tokens.iter().any(|t| t == token) {
            score += WEIGHT_DESCRIPTION;
        }
    }

    // Whole-query substring of the name is a strong signal
    let query_lower = query.trim().to_lowercase();
    if !query_lower.is_empty() && name.contains(&query_lower) {
        score += WEIGHT_NAME;
    }

    score
}

/// Rank a catalog snapshot against a query
///
/// Scores saturate into [0, 1); zero-score entries are omitted. The caller
/// applies `k` truncation and the score floor.
pub fn rank(snapshot: &[Arc<Capability>], query: &str) -> Vec<SearchHit> {
    let query_tokens = tokenize(query);
    let mut hits: Vec<SearchHit> = snapshot
        .iter()
        .filter_map(|capability| {
            let raw = raw_score(capability, query, &query_tokens);
            if raw <= 0.0 {
                return None;
            }
            Some(SearchHit {
                kind: capability.kind(),
                name: capability.name.clone(),
                category: capability.category.clone(),
                description: capability.description.clone(),
                score: raw / (raw + SATURATION),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use mcs_domain::capability::{Capability, CapabilityDescriptor};
    use serde_json::json;

    fn tool(name: &str, description: &str, keywords: &[&str]) -> Arc<Capability> {
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
        Arc::new(Capability::from_descriptor(descriptor).unwrap())
    }

    #[test]
    fn name_token_match_ranks_first() {
        let snapshot = vec![
            tool("web_fetch", "Fetch a web page over HTTP", &["http", "download"]),
            tool("data_query", "Query structured data", &["sql"]),
            tool("memory_store", "Store a memory", &["remember"]),
        ];
        let hits = rank(&snapshot, "fetch a page");
        assert_eq!(hits[0].name, "web_fetch");
        assert!(hits[0].score > 0.0 && hits[0].score < 1.0);
    }

    #[test]
    fn unrelated_entries_score_zero_and_drop() {
        let snapshot = vec![tool("memory_store", "Store a memory", &[])];
        let hits = rank(&snapshot, "quantum chromodynamics");
        assert!(hits.is_empty());
    }

    #[test]
    fn keyword_hits_count() {
        let snapshot = vec![
            tool("alpha", "does something", &["resize", "image"]),
            tool("beta", "does something else", &[]),
        ];
        let hits = rank(&snapshot, "resize image");
        assert_eq!(hits[0].name, "alpha");
    }
}
