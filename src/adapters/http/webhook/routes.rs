//! Axum router for the inbound message webhook.

use axum::{routing::post, Router};

use super::handlers::{receive_message, WebhookAppState};

/// Routes relative to the webhook mount point.
///
/// - `POST /messages` - Inbound customer message
pub fn webhook_routes() -> Router<WebhookAppState> {
    Router::new().route("/messages", post(receive_message))
}

/// Webhook router with state applied, suitable for mounting at `/webhooks`.
pub fn webhook_router(state: WebhookAppState) -> Router {
    webhook_routes().with_state(state)
}
