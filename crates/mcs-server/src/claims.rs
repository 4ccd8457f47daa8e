//! Claims extraction
//!
//! Pulls verified caller claims out of transport metadata. The identity
//! layer in front of this process verifies callers and forwards their
//! claims in the `X-Claims` header; this module only parses, never
//! verifies.

use axum::http::HeaderMap;

use mcs_domain::value_objects::Claims;

/// Header carrying verified claims
pub const CLAIMS_HEADER: &str = "x-claims";

/// Header carrying the client session identifier
pub const SESSION_HEADER: &str = "mcp-session-id";

/// Claims of an HTTP caller
///
/// Absent or unreadable headers yield the anonymous caller.
pub fn claims_from_headers(headers: &HeaderMap) -> Claims {
    headers
        .get(CLAIMS_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(Claims::parse_header)
        .unwrap_or_else(Claims::anonymous)
}

/// Session identifier of an HTTP caller, or a fallback label
pub fn session_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| "http".to_string())
}

/// Claims of the local stdio session
///
/// Stdio is only reachable by whoever started the process, so the local
/// operator gets the privileged claim set.
pub fn stdio_claims() -> Claims {
    Claims::privileged()
}
