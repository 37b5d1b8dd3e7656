//! Top-level HTTP router.
//!
//! Mounts every module router under its prefix and applies request tracing
//! and a request timeout to all of them.

use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use super::dto::HealthResponse;
use super::extraction::{extraction_router, ExtractionAppState};
use super::rate_limits::{rate_limit_router, RateLimitAdminState};
use super::webhook::{webhook_router, WebhookAppState};

/// State for every HTTP module.
#[derive(Clone)]
pub struct AppState {
    pub webhook: WebhookAppState,
    pub rate_limits: RateLimitAdminState,
    pub extraction: ExtractionAppState,
}

/// GET /health - Liveness
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(HealthResponse::ok()))
}

/// Builds the complete application router.
///
/// # Routes
///
/// - `GET /health`
/// - `POST /webhooks/messages`
/// - `GET|DELETE /admin/rate-limits/:target[/:sender]`
/// - `POST /internal/extraction/batch`
/// - `POST /internal/extraction/conversations/:id`
pub fn app_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(health))
        .nest("/webhooks", webhook_router(state.webhook))
        .nest("/admin/rate-limits", rate_limit_router(state.rate_limits))
        .nest("/internal/extraction", extraction_router(state.extraction))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(request_timeout))
}
