//! Tests of the admin HTTP surface: claims enforcement, catalog
//! snapshots, tool invocation, refresh, search, and stats.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use mcs_application::discovery::{DiscoveryConfig, DiscoverySource};
use mcs_server::transport::build_router;

use common::{register_echo, register_search_catalog_fixture, test_app};

const PRIVILEGED: &str = "subject=ops,privileged";

async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    claims: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(claims) = claims {
        builder = builder.header("x-claims", claims);
    }
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

#[tokio::test]
async fn probes_report_operational() {
    let app = test_app(false, DiscoveryConfig::default());
    let router = build_router(app);

    let (status, body) = send(&router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(&router, "GET", "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&router, "GET", "/live", None, None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn admin_endpoints_enforce_the_privileged_claim() {
    let app = test_app(false, DiscoveryConfig::default());
    register_echo(&app);
    let router = build_router(app);

    // No claims at all
    let (status, body) = send(&router, "GET", "/admin/tools", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["kind"], "denied");

    // Authenticated but not privileged
    let (status, _) = send(
        &router,
        "GET",
        "/admin/tools",
        Some("subject=dev,authenticated"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Privileged caller sees the catalog
    let (status, body) = send(&router, "GET", "/admin/tools", Some(PRIVILEGED), None).await;
    assert_eq!(status, StatusCode::OK);
    let tools = body["tools"].as_array().unwrap();
    assert!(tools.iter().any(|tool| tool["name"] == "echo"));
    // Snapshot entries carry counters and hash
    let echo = tools.iter().find(|tool| tool["name"] == "echo").unwrap();
    assert!(echo["definition_hash"].is_string());
    assert!(echo["counters"]["invocations"].is_u64());
}

#[tokio::test]
async fn admin_call_tool_invokes_and_validates() {
    let app = test_app(false, DiscoveryConfig::default());
    register_echo(&app);
    let router = build_router(app);

    let (status, body) = send(
        &router,
        "POST",
        "/admin/call-tool",
        Some(PRIVILEGED),
        Some(json!({"name": "echo", "arguments": {"msg": "hi"}})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_error"], false);
    assert_eq!(body["content"][0]["text"], "hi");

    let (status, body) = send(
        &router,
        "POST",
        "/admin/call-tool",
        Some(PRIVILEGED),
        Some(json!({"name": "echo", "arguments": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "invalid_argument");

    let (status, body) = send(
        &router,
        "POST",
        "/admin/call-tool",
        Some(PRIVILEGED),
        Some(json!({"name": "ghost", "arguments": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], "not_found");
}

#[tokio::test]
async fn admin_refresh_runs_discovery() {
    let discovery = DiscoveryConfig {
        sources: vec![DiscoverySource::ExplicitList {
            capabilities: vec![serde_json::from_value(json!({
                "kind": "tool",
                "name": "late_arrival",
                "description": "Registered by refresh",
                "tool": {
                    "input_schema": {"type": "object"},
                    "handler_ref": "builtin.echo"
                }
            }))
            .unwrap()],
        }],
        ..DiscoveryConfig::default()
    };
    let app = test_app(false, discovery);
    let router = build_router(app.clone());

    // Not present before the refresh
    let (_, body) = send(&router, "GET", "/admin/tools", Some(PRIVILEGED), None).await;
    assert!(!body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .any(|tool| tool["name"] == "late_arrival"));

    let (status, body) = send(&router, "POST", "/admin/refresh", Some(PRIVILEGED), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["report"]["accepted"].as_array().unwrap().len(), 1);

    let (_, body) = send(&router, "GET", "/admin/tools", Some(PRIVILEGED), None).await;
    assert!(body["tools"]
        .as_array()
        .unwrap()
        .iter()
        .any(|tool| tool["name"] == "late_arrival"));

    // A second refresh skips the identical definition
    let (_, body) = send(&router, "POST", "/admin/refresh", Some(PRIVILEGED), None).await;
    assert_eq!(body["report"]["skipped"], 1);
}

#[tokio::test]
async fn admin_search_returns_ranked_results() {
    let app = test_app(true, DiscoveryConfig::default());
    register_search_catalog_fixture(&app);
    let router = build_router(app);

    let (status, body) = send(
        &router,
        "POST",
        "/admin/search",
        Some(PRIVILEGED),
        Some(json!({"query": "fetch a page", "k": 2})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["name"], "web_fetch");

    // Search requires the privileged claim like every admin endpoint
    let (status, _) = send(
        &router,
        "POST",
        "/admin/search",
        None,
        Some(json!({"query": "fetch", "k": 1})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_stats_summarize_the_instance() {
    let app = test_app(false, DiscoveryConfig::default());
    register_echo(&app);
    let router = build_router(app);

    let (status, body) = send(&router, "GET", "/admin/stats", Some(PRIVILEGED), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["catalog"]["total"].as_u64().unwrap() >= 1);
    assert_eq!(body["catalog"]["by_kind"]["tools"], 1);
    assert!(body["instance_id"].as_str().unwrap().contains("capability-server"));
}
