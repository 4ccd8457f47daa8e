//! Admin HTTP surface
//!
//! JSON over HTTP for the management portal: health and probe endpoints,
//! catalog snapshots, tool invocation, discovery refresh, and catalog
//! search. Every `/admin/*` endpoint requires the privileged claim in
//! `X-Claims`.

pub mod handlers;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;

use mcs_infrastructure::AppContext;

use handlers::{
    admin_call_tool, admin_prompts, admin_refresh, admin_resources, admin_search, admin_stats,
    admin_tools, health, live, ready,
};

/// Create the admin API router
///
/// Routes:
/// - GET /health - liveness + readiness with per-dependency details
/// - GET /ready - readiness probe
/// - GET /live - liveness probe
/// - GET /admin/tools - tool catalog snapshot
/// - GET /admin/prompts - prompt catalog snapshot
/// - GET /admin/resources - resource catalog snapshot
/// - POST /admin/call-tool - invoke a tool
/// - POST /admin/refresh - trigger a discovery pass
/// - POST /admin/search - semantic catalog search
/// - GET /admin/stats - catalog, index, and dispatch statistics
pub fn admin_router(app: Arc<AppContext>) -> Router {
    Router::new()
        // Health and probes
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/live", get(live))
        // Catalog snapshots
        .route("/admin/tools", get(admin_tools))
        .route("/admin/prompts", get(admin_prompts))
        .route("/admin/resources", get(admin_resources))
        // Operations
        .route("/admin/call-tool", post(admin_call_tool))
        .route("/admin/refresh", post(admin_refresh))
        .route("/admin/search", post(admin_search))
        .route("/admin/stats", get(admin_stats))
        .with_state(app)
}
