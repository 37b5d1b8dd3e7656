//! HTTP handlers for rate limit administration.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::dto::ErrorResponse;
use crate::application::handlers::RateLimiter;
use crate::ports::CounterStoreError;

use super::dto::ResetResponse;

/// Application state for rate limit administration.
#[derive(Clone)]
pub struct RateLimitAdminState {
    pub limiter: Arc<RateLimiter>,
}

// ════════════════════════════════════════════════════════════════════════════
// Queries
// ════════════════════════════════════════════════════════════════════════════

/// GET /admin/rate-limits/:target/:sender - Quota view for one sender
pub async fn get_sender_status(
    State(state): State<RateLimitAdminState>,
    Path((target, sender)): Path<(String, String)>,
) -> Response {
    match state.limiter.status(&target, &sender).await {
        Ok(status) => (StatusCode::OK, Json(status)).into_response(),
        Err(e) => handle_counter_error(e),
    }
}

/// GET /admin/rate-limits/:target - Current window statistics for a target
pub async fn get_target_statistics(
    State(state): State<RateLimitAdminState>,
    Path(target): Path<String>,
) -> Response {
    match state.limiter.statistics(&target).await {
        Ok(stats) => (StatusCode::OK, Json(stats)).into_response(),
        Err(e) => handle_counter_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Resets
// ════════════════════════════════════════════════════════════════════════════

/// DELETE /admin/rate-limits/:target - Clear every counter of a target
pub async fn reset_target(
    State(state): State<RateLimitAdminState>,
    Path(target): Path<String>,
) -> Response {
    reset(state, target, None).await
}

/// DELETE /admin/rate-limits/:target/:sender - Clear one sender's counters
pub async fn reset_sender(
    State(state): State<RateLimitAdminState>,
    Path((target, sender)): Path<(String, String)>,
) -> Response {
    reset(state, target, Some(sender)).await
}

async fn reset(state: RateLimitAdminState, target: String, sender: Option<String>) -> Response {
    match state.limiter.reset(&target, sender.as_deref()).await {
        Ok(deleted) => {
            tracing::info!(target_id = %target, sender = ?sender, deleted, "Rate limit counters reset");
            let response = ResetResponse {
                target,
                sender,
                deleted,
            };
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(e) => handle_counter_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn handle_counter_error(error: CounterStoreError) -> Response {
    tracing::warn!(error = %error, "Rate limit administration failed");
    match error {
        CounterStoreError::Unavailable(message) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorResponse::unavailable(format!(
                "Counter store unavailable: {}",
                message
            ))),
        )
            .into_response(),
        CounterStoreError::Corrupt { key, reason } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(
                ErrorResponse::internal(format!("Corrupt counter: {}", reason))
                    .with_details(serde_json::json!({ "key": key })),
            ),
        )
            .into_response(),
    }
}
