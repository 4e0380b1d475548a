use crate::infra::{AppState, MemoryApi};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use enrollment_intake::auth::{require_basic_auth, BasicCredentials};
use enrollment_intake::workflows::enrollment::enrollment_router;
use serde_json::json;
use std::sync::Arc;

/// API routes, gated by basic auth when credentials are configured, plus the
/// unauthenticated probe and metrics endpoints.
pub(crate) fn with_enrollment_routes(
    api: MemoryApi,
    credentials: Option<BasicCredentials>,
) -> axum::Router {
    let mut router = enrollment_router(api);
    if let Some(credentials) = credentials {
        router = router.route_layer(axum::middleware::from_fn_with_state(
            Arc::new(credentials),
            require_basic_auth,
        ));
    }

    router
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}
