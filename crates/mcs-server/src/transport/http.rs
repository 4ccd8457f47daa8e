//! HTTP transport
//!
//! Serves MCP as JSON-RPC over `POST /mcp` and mounts the admin surface
//! on the same listener. The server reads one frame, dispatches it, and
//! answers on the same connection; slow handlers never stall other
//! sessions because every request runs as its own task.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tracing::{debug, info};
use uuid::Uuid;

use mcs_application::dispatcher::RequestMeta;
use mcs_domain::capability::CapabilityKind;
use mcs_domain::error::Error;
use mcs_domain::value_objects::{Claims, InvocationOutcome, SelectionRequest};
use mcs_infrastructure::AppContext;

use crate::admin;
use crate::claims::{claims_from_headers, session_from_headers};
use crate::transport::types::{McpRequest, McpResponse};
use crate::views;

/// Shared state of the HTTP MCP endpoint
#[derive(Clone)]
pub struct HttpTransportState {
    app: Arc<AppContext>,
}

/// Build the complete HTTP router: MCP endpoint plus admin surface
pub fn build_router(app: Arc<AppContext>) -> Router {
    let mcp = Router::new()
        .route("/mcp", post(handle_mcp_post))
        .with_state(HttpTransportState {
            app: Arc::clone(&app),
        });

    mcp.merge(admin::admin_router(app)).layer(CorsLayer::permissive())
}

/// Serve the HTTP surface until the shutdown token fires
pub async fn serve_http(
    app: Arc<AppContext>,
    addr: SocketAddr,
    shutdown: CancellationToken,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let router = build_router(app);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "HTTP transport listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;
    info!("HTTP transport finished");
    Ok(())
}

/// Handle one JSON-RPC frame
async fn handle_mcp_post(
    State(state): State<HttpTransportState>,
    headers: HeaderMap,
    Json(request): Json<McpRequest>,
) -> Json<McpResponse> {
    let claims = claims_from_headers(&headers);
    let session_id = session_from_headers(&headers);
    let id = request.id.clone();

    debug!(method = %request.method, session = %session_id, "mcp request");
    let response = dispatch_method(&state.app, &request, &claims, &session_id).await;
    Json(match response {
        Ok(result) => McpResponse::success(id, result),
        Err(MethodError::UnknownMethod(method)) => {
            McpResponse::error(id, -32601, format!("Unknown method: {method}"))
        }
        Err(MethodError::Domain(e)) => McpResponse::from_domain_error(id, &e),
    })
}

/// Dispatch failure modes
enum MethodError {
    UnknownMethod(String),
    Domain(Error),
}

impl From<Error> for MethodError {
    fn from(e: Error) -> Self {
        Self::Domain(e)
    }
}

/// Route one method to the owning subsystem
async fn dispatch_method(
    app: &Arc<AppContext>,
    request: &McpRequest,
    claims: &Claims,
    session_id: &str,
) -> Result<Value, MethodError> {
    let params = request.params.clone().unwrap_or_else(|| json!({}));
    let request_id = request
        .id
        .as_ref()
        .map(id_to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    match request.method.as_str() {
        "initialize" => Ok(initialize_result(app)),
        "ping" => Ok(json!({})),

        "list_tools" | "tools/list" => Ok(list_tools(app, &params)),
        "call_tool" | "tools/call" => {
            call_tool(app, &params, claims, session_id, request_id).await
        }

        "list_prompts" | "prompts/list" => Ok(list_prompts(app, &params)),
        "get_prompt" | "render_prompt" | "prompts/get" => {
            get_prompt(app, &params, claims, session_id, request_id).await
        }

        "list_resources" | "resources/list" => Ok(list_resources(app, &params)),
        "read_resource" | "resources/read" => {
            read_resource(app, &params, claims, session_id, request_id).await
        }

        "search_catalog" => search_catalog(app, &params).await,
        "cancel" => cancel(app, &params),

        other => Err(MethodError::UnknownMethod(other.to_string())),
    }
}

/// Render a JSON-RPC id as the request correlation id
fn id_to_string(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Category filter from optional `{filter: {category}}` params
fn category_filter(params: &Value) -> mcs_application::ListFilter {
    mcs_application::ListFilter {
        category: params
            .get("filter")
            .and_then(|f| f.get("category"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

fn initialize_result(app: &Arc<AppContext>) -> Value {
    json!({
        "protocolVersion": "2024-11-05",
        "serverInfo": {
            "name": app.config.server.service_name,
            "version": env!("CARGO_PKG_VERSION"),
        },
        "capabilities": {
            "tools": {"listChanged": true},
            "prompts": {"listChanged": true},
            "resources": {"listChanged": true},
        },
    })
}

fn list_tools(app: &Arc<AppContext>, params: &Value) -> Value {
    let tools: Vec<Value> = app
        .registry
        .list(Some(CapabilityKind::Tool), &category_filter(params))
        .iter()
        .map(|capability| views::tool_summary(capability))
        .collect();
    json!({ "tools": tools })
}

async fn call_tool(
    app: &Arc<AppContext>,
    params: &Value,
    claims: &Claims,
    session_id: &str,
    request_id: String,
) -> Result<Value, MethodError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("call_tool requires a 'name'"))?;
    let arguments = params.get("arguments").cloned().unwrap_or_else(|| json!({}));

    let mut meta = RequestMeta::for_session(session_id)
        .with_request_id(request_id)
        .with_parent_cancel(app.shutdown.child_token());
    if let Some(deadline_ms) = params.get("deadline_ms").and_then(Value::as_u64) {
        meta = meta.with_deadline(Duration::from_millis(deadline_ms));
    }

    let result = app.dispatcher.invoke_tool(name, arguments, claims, meta).await;
    match result.outcome {
        InvocationOutcome::Ok => {
            let value = result.value.unwrap_or(Value::Null);
            Ok(json!({
                "content": views::tool_content(&value),
                "is_error": false,
            }))
        }
        InvocationOutcome::Failed
            if result.error.as_ref().is_some_and(|e| {
                matches!(
                    e.kind(),
                    mcs_domain::ErrorKind::Internal
                        | mcs_domain::ErrorKind::UpstreamUnavailable
                        | mcs_domain::ErrorKind::BudgetExhausted
                )
            }) =>
        {
            // Handler failures surface as tool error content, not protocol
            // errors, so agents can read them
            let message = result
                .error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "invocation failed".to_string());
            Ok(json!({
                "content": [{"type": "text", "text": message}],
                "is_error": true,
            }))
        }
        _ => Err(result
            .error
            .unwrap_or_else(|| Error::internal("invocation failed"))
            .into()),
    }
}

fn list_prompts(app: &Arc<AppContext>, params: &Value) -> Value {
    let prompts: Vec<Value> = app
        .registry
        .list(Some(CapabilityKind::Prompt), &category_filter(params))
        .iter()
        .map(|capability| views::prompt_summary(capability))
        .collect();
    json!({ "prompts": prompts })
}

async fn get_prompt(
    app: &Arc<AppContext>,
    params: &Value,
    claims: &Claims,
    session_id: &str,
    request_id: String,
) -> Result<Value, MethodError> {
    let name = params
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("get_prompt requires a 'name'"))?;
    let arguments = params
        .get("arguments")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default();

    let meta = RequestMeta::for_session(session_id).with_request_id(request_id);
    let text = app
        .dispatcher
        .render_prompt(name, &arguments, claims, meta)
        .await?;

    Ok(json!({
        "messages": [{
            "role": "user",
            "content": {"type": "text", "text": text},
        }],
    }))
}

fn list_resources(app: &Arc<AppContext>, params: &Value) -> Value {
    let resources: Vec<Value> = app
        .registry
        .list(Some(CapabilityKind::Resource), &category_filter(params))
        .iter()
        .map(|capability| views::resource_summary(capability))
        .collect();
    json!({ "resources": resources })
}

async fn read_resource(
    app: &Arc<AppContext>,
    params: &Value,
    claims: &Claims,
    session_id: &str,
    request_id: String,
) -> Result<Value, MethodError> {
    let uri = params
        .get("uri")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("read_resource requires a 'uri'"))?;

    let meta = RequestMeta::for_session(session_id).with_request_id(request_id);
    let (capability, body) = app.dispatcher.read_resource(uri, claims, meta).await?;
    Ok(views::resource_contents(&capability, &body))
}

async fn search_catalog(app: &Arc<AppContext>, params: &Value) -> Result<Value, MethodError> {
    let request: SelectionRequest = serde_json::from_value(flatten_search_params(params))
        .map_err(|e| Error::invalid_argument(format!("invalid search params: {e}")))?;
    let hits = app.selector.select(request).await?;
    Ok(json!({ "results": hits }))
}

/// Accept both `{query, filters: {kind, category}, k}` and the flat form
fn flatten_search_params(params: &Value) -> Value {
    let mut flat = params.clone();
    if let Some(filters) = params.get("filters").cloned() {
        if let Some(object) = flat.as_object_mut() {
            object.remove("filters");
            if let Some(kind) = filters.get("kind") {
                object.insert("kind".to_string(), kind.clone());
            }
            if let Some(category) = filters.get("category") {
                object.insert("category".to_string(), category.clone());
            }
        }
    }
    flat
}

fn cancel(app: &Arc<AppContext>, params: &Value) -> Result<Value, MethodError> {
    let request_id = params
        .get("request_id")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::invalid_argument("cancel requires a 'request_id'"))?;

    let found = app.dispatcher.cancel(request_id);
    debug!(request_id, found, "cancel requested");
    Ok(json!({}))
}
