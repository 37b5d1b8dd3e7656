//! HTTP handlers for lead extraction.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::dto::ErrorResponse;
use crate::application::handlers::{
    BatchScheduler, ExtractLeadCommand, ExtractionError, LeadExtractor,
};
use crate::domain::foundation::{ConversationId, DomainError};
use crate::ports::AIError;

use super::dto::{BatchQuery, ExtractQuery};

/// Application state for extraction endpoints.
#[derive(Clone)]
pub struct ExtractionAppState {
    pub extractor: Arc<LeadExtractor>,
    pub scheduler: Arc<BatchScheduler>,
}

/// POST /internal/extraction/batch - Run one scheduler pass
pub async fn run_batch(
    State(state): State<ExtractionAppState>,
    Query(query): Query<BatchQuery>,
) -> Response {
    match state.scheduler.run_batch(query.max).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(e) => handle_store_error(e),
    }
}

/// POST /internal/extraction/conversations/:id - Extract a single conversation
pub async fn extract_conversation(
    State(state): State<ExtractionAppState>,
    Path(id): Path<String>,
    Query(query): Query<ExtractQuery>,
) -> Response {
    let conversation_id: ConversationId = match id.parse() {
        Ok(id) => id,
        Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorResponse::bad_request(format!(
                    "Invalid conversation id: {}",
                    id
                ))),
            )
                .into_response();
        }
    };

    let cmd = if query.force {
        ExtractLeadCommand::forced(conversation_id)
    } else {
        ExtractLeadCommand::new(conversation_id)
    };

    match state.extractor.extract(cmd).await {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(e) => handle_extraction_error(e),
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Error handling
// ════════════════════════════════════════════════════════════════════════════

fn extraction_status(error: &ExtractionError) -> StatusCode {
    match error {
        ExtractionError::ConversationNotFound(_) => StatusCode::NOT_FOUND,
        ExtractionError::EmptyTranscript(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ExtractionError::Model(AIError::Timeout { .. }) => StatusCode::GATEWAY_TIMEOUT,
        ExtractionError::Model(_) | ExtractionError::NonConforming(_) => StatusCode::BAD_GATEWAY,
        ExtractionError::Store(e) => store_status(e),
    }
}

fn handle_extraction_error(error: ExtractionError) -> Response {
    let status = extraction_status(&error);
    let body = ErrorResponse::new(error.code(), error.to_string());
    (status, Json(body)).into_response()
}

fn store_status(error: &DomainError) -> StatusCode {
    if error.is_infrastructure() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

fn handle_store_error(error: DomainError) -> Response {
    tracing::error!(error = %error, "Extraction batch failed");
    let status = store_status(&error);
    let body = ErrorResponse::new(error.code.to_string(), error.message.clone());
    (status, Json(body)).into_response()
}
