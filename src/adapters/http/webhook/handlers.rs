//! HTTP handlers for the inbound message webhook.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::dto::ErrorResponse;
use crate::application::handlers::{InboundMessage, IngestMessageHandler};

use super::signature::{SignatureVerifier, SIGNATURE_HEADER};

/// Application state for the webhook endpoint.
#[derive(Clone)]
pub struct WebhookAppState {
    pub ingest: Arc<IngestMessageHandler>,
    /// `None` accepts unsigned deliveries.
    pub verifier: Option<SignatureVerifier>,
}

impl WebhookAppState {
    pub fn new(ingest: Arc<IngestMessageHandler>, verifier: Option<SignatureVerifier>) -> Self {
        Self { ingest, verifier }
    }
}

/// POST /webhooks/messages - Handle one inbound customer message.
///
/// Always answers 200 with a reply once the payload is authentic and well formed;
/// internal failures surface as the fallback reply.
pub async fn receive_message(
    State(state): State<WebhookAppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(verifier) = &state.verifier {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|value| value.to_str().ok());
        if let Err(err) = verifier.verify(&body, signature) {
            tracing::warn!(error = %err, "Rejected webhook delivery");
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse::unauthorized(err.to_string())),
            )
                .into_response();
        }
    }

    let message: InboundMessage = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(err) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(format!("Invalid payload: {}", err))),
            )
                .into_response();
        }
    };

    let reply = state.ingest.handle(message).await;
    (StatusCode::OK, Json(reply)).into_response()
}
