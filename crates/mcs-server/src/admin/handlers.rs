//! Admin endpoint handlers

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use mcs_application::dispatcher::RequestMeta;
use mcs_domain::capability::{CapabilityKind, CapabilitySummary};
use mcs_domain::error::{Error, ErrorKind};
use mcs_domain::value_objects::{Claims, IndexFilter, InvocationOutcome, SelectionRequest};
use mcs_infrastructure::AppContext;

use crate::claims::claims_from_headers;
use crate::views;

/// Session label for admin-surface requests
const ADMIN_SESSION: &str = "admin";

/// HTTP status for a taxonomy kind
fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::InvalidArgument | ErrorKind::NotFound | ErrorKind::Cancelled => {
            StatusCode::BAD_REQUEST
        }
        ErrorKind::Denied => StatusCode::FORBIDDEN,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Overloaded | ErrorKind::BudgetExhausted => StatusCode::TOO_MANY_REQUESTS,
        ErrorKind::TimedOut => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::UpstreamUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Shape a domain error as an HTTP response
fn error_response(error: &Error) -> Response {
    let status = status_for(error.kind());
    let mut body = json!({
        "error": {
            "kind": error.kind().as_str(),
            "message": error.to_string(),
        }
    });
    if let Error::Overloaded {
        retry_after_ms: Some(retry_after_ms),
        ..
    } = error
    {
        body["error"]["retry_after_ms"] = json!(retry_after_ms);
    }
    (status, Json(body)).into_response()
}

/// Require the privileged claim on an admin request
fn require_privileged(headers: &HeaderMap) -> Result<Claims, Response> {
    let claims = claims_from_headers(headers);
    if claims.privileged {
        return Ok(claims);
    }
    let status = if claims.authenticated {
        StatusCode::FORBIDDEN
    } else {
        StatusCode::UNAUTHORIZED
    };
    Err((
        status,
        Json(json!({
            "error": {
                "kind": "denied",
                "message": "admin endpoints require the privileged claim",
            }
        })),
    )
        .into_response())
}

/// GET /health
pub async fn health(State(app): State<Arc<AppContext>>) -> Response {
    let report = app.health.report().await;
    (StatusCode::OK, Json(report)).into_response()
}

/// GET /ready
pub async fn ready(State(app): State<Arc<AppContext>>) -> Response {
    let report = app.health.report().await;
    let status = if report.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": report.status }))).into_response()
}

/// GET /live
pub async fn live(State(app): State<Arc<AppContext>>) -> Response {
    let report = app.health.report().await;
    let status = if report.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "status": report.status }))).into_response()
}

/// Catalog snapshot for one kind, with payload details
fn catalog_snapshot(app: &AppContext, kind: CapabilityKind) -> Vec<Value> {
    app.registry
        .list(Some(kind), &Default::default())
        .iter()
        .map(|capability| {
            let mut entry = serde_json::to_value(CapabilitySummary::from(capability.as_ref()))
                .unwrap_or_else(|_| json!({}));
            let detail = match kind {
                CapabilityKind::Tool => views::tool_summary(capability),
                CapabilityKind::Prompt => views::prompt_summary(capability),
                CapabilityKind::Resource => views::resource_summary(capability),
            };
            if let (Some(entry_map), Some(detail_map)) = (entry.as_object_mut(), detail.as_object())
            {
                entry_map.insert("definition".to_string(), json!(detail_map));
            }
            entry
        })
        .collect()
}

/// GET /admin/tools
pub async fn admin_tools(State(app): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }
    Json(json!({ "tools": catalog_snapshot(&app, CapabilityKind::Tool) })).into_response()
}

/// GET /admin/prompts
pub async fn admin_prompts(State(app): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }
    Json(json!({ "prompts": catalog_snapshot(&app, CapabilityKind::Prompt) })).into_response()
}

/// GET /admin/resources
pub async fn admin_resources(State(app): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }
    Json(json!({ "resources": catalog_snapshot(&app, CapabilityKind::Resource) })).into_response()
}

/// Body of POST /admin/call-tool
#[derive(Debug, Deserialize)]
pub struct CallToolBody {
    /// Tool name
    pub name: String,
    /// Invocation arguments
    #[serde(default)]
    pub arguments: Value,
    /// Optional deadline override in milliseconds
    #[serde(default)]
    pub deadline_ms: Option<u64>,
}

/// POST /admin/call-tool
pub async fn admin_call_tool(
    State(app): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<CallToolBody>,
) -> Response {
    let claims = match require_privileged(&headers) {
        Ok(claims) => claims,
        Err(denied) => return denied,
    };

    let mut meta = RequestMeta::for_session(ADMIN_SESSION)
        .with_parent_cancel(app.shutdown.child_token());
    if let Some(deadline_ms) = body.deadline_ms {
        meta = meta.with_deadline(Duration::from_millis(deadline_ms));
    }

    let arguments = if body.arguments.is_null() {
        json!({})
    } else {
        body.arguments
    };
    let result = app
        .dispatcher
        .invoke_tool(&body.name, arguments, &claims, meta)
        .await;

    match result.outcome {
        InvocationOutcome::Ok => {
            let value = result.value.unwrap_or(Value::Null);
            Json(json!({
                "request_id": result.request_id,
                "content": views::tool_content(&value),
                "is_error": false,
                "latency_ms": result.latency_ms,
            }))
            .into_response()
        }
        _ => error_response(
            &result
                .error
                .unwrap_or_else(|| Error::internal("invocation failed")),
        ),
    }
}

/// POST /admin/refresh
pub async fn admin_refresh(State(app): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }
    let report = app.discovery.run().await;
    Json(json!({ "report": report })).into_response()
}

/// Body of POST /admin/search
#[derive(Debug, Deserialize)]
pub struct SearchBody {
    /// Free-form intent
    pub query: String,
    /// Optional filters
    #[serde(default)]
    pub filters: Option<SearchFilters>,
    /// Result count
    #[serde(default)]
    pub k: Option<usize>,
}

/// Filters of POST /admin/search
#[derive(Debug, Default, Deserialize)]
pub struct SearchFilters {
    /// Restrict to one capability kind
    pub kind: Option<CapabilityKind>,
    /// Restrict to a category
    pub category: Option<String>,
}

/// POST /admin/search
pub async fn admin_search(
    State(app): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<SearchBody>,
) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }

    let filters = body.filters.unwrap_or_default();
    let request = SelectionRequest {
        query: body.query,
        kind: filters.kind,
        category: filters.category,
        k: body.k.unwrap_or(5),
    };
    match app.selector.select(request).await {
        Ok(hits) => Json(json!({ "results": hits })).into_response(),
        Err(e) => error_response(&e),
    }
}

/// GET /admin/stats
pub async fn admin_stats(State(app): State<Arc<AppContext>>, headers: HeaderMap) -> Response {
    if let Err(denied) = require_privileged(&headers) {
        return denied;
    }

    let registry = &app.registry;
    let by_kind = json!({
        "tools": registry.list(Some(CapabilityKind::Tool), &Default::default()).len(),
        "prompts": registry.list(Some(CapabilityKind::Prompt), &Default::default()).len(),
        "resources": registry.list(Some(CapabilityKind::Resource), &Default::default()).len(),
    });
    let index_stats = app
        .vector_index
        .stats(&IndexFilter::default())
        .await
        .unwrap_or_default();

    Json(json!({
        "catalog": {
            "total": registry.len(),
            "by_kind": by_kind,
            "change_feed_seq": registry.last_seq(),
        },
        "index": index_stats,
        "dispatcher": {
            "queued": app.dispatcher.queued(),
            "recent_invocations": app.dispatcher.recent_invocations(20),
        },
        "indexing": {
            "dropped": app.indexing.dropped(),
        },
        "instance_id": app.instance_id(),
    }))
    .into_response()
}
