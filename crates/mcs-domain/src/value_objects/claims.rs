//! Caller claims
//!
//! Verified attributes of the caller, supplied by the identity layer in
//! front of this process. Claims are parsed from a trusted header; they are
//! never read from message bodies.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Verified caller attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Caller identity, when known
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Whether the caller passed authentication upstream
    #[serde(default)]
    pub authenticated: bool,
    /// Whether the caller holds the privileged claim
    #[serde(default)]
    pub privileged: bool,
    /// Additional verified key/value claims
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl Claims {
    /// Anonymous caller with no claims
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Privileged caller, as used by trusted local surfaces and tests
    pub fn privileged() -> Self {
        Self {
            subject: Some("local-admin".to_string()),
            authenticated: true,
            privileged: true,
            extra: HashMap::new(),
        }
    }

    /// Parse the `X-Claims` header format
    ///
    /// Comma-separated items; `key=value` pairs set named claims, bare
    /// `privileged` / `authenticated` flags set the booleans. Unknown pairs
    /// land in `extra`.
    pub fn parse_header(header: &str) -> Self {
        let mut claims = Self::default();
        for item in header.split(',') {
            let item = item.trim();
            if item.is_empty() {
                continue;
            }
            match item.split_once('=') {
                Some(("subject", v)) => claims.subject = Some(v.trim().to_string()),
                Some(("privileged", v)) => claims.privileged = v.trim() == "true",
                Some(("authenticated", v)) => claims.authenticated = v.trim() == "true",
                Some((k, v)) => {
                    claims
                        .extra
                        .insert(k.trim().to_string(), v.trim().to_string());
                }
                None => match item {
                    "privileged" => {
                        claims.privileged = true;
                        claims.authenticated = true;
                    }
                    "authenticated" => claims.authenticated = true,
                    other => {
                        claims.extra.insert(other.to_string(), "true".to_string());
                    }
                },
            }
        }
        claims
    }

    /// Subject label for logs; `anonymous` when unset
    pub fn subject_label(&self) -> &str {
        self.subject.as_deref().unwrap_or("anonymous")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags_and_pairs() {
        let claims = Claims::parse_header("subject=alice, privileged, team=core");
        assert_eq!(claims.subject.as_deref(), Some("alice"));
        assert!(claims.privileged);
        assert!(claims.authenticated);
        assert_eq!(claims.extra.get("team").map(String::as_str), Some("core"));
    }

    #[test]
    fn explicit_false_is_not_privileged() {
        let claims = Claims::parse_header("privileged=false,authenticated=true");
        assert!(!claims.privileged);
        assert!(claims.authenticated);
    }

    #[test]
    fn empty_header_is_anonymous() {
        let claims = Claims::parse_header("");
        assert_eq!(claims, Claims::anonymous());
    }
}
