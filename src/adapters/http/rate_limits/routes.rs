//! Axum router for rate limit administration.

use axum::{routing::get, Router};

use super::handlers::{
    get_sender_status, get_target_statistics, reset_sender, reset_target, RateLimitAdminState,
};

/// Routes relative to `/admin/rate-limits`.
///
/// - `GET /:target` - Window statistics
/// - `DELETE /:target` - Reset all counters of the target
/// - `GET /:target/:sender` - Sender quota
/// - `DELETE /:target/:sender` - Reset one sender
pub fn rate_limit_routes() -> Router<RateLimitAdminState> {
    Router::new()
        .route("/:target", get(get_target_statistics).delete(reset_target))
        .route("/:target/:sender", get(get_sender_status).delete(reset_sender))
}

pub fn rate_limit_router(state: RateLimitAdminState) -> Router {
    rate_limit_routes().with_state(state)
}
