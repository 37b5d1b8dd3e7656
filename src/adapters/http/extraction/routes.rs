//! Axum router for lead extraction endpoints.

use axum::{routing::post, Router};

use super::handlers::{extract_conversation, run_batch, ExtractionAppState};

/// Routes relative to `/internal/extraction`.
///
/// - `POST /batch?max=N` - One bounded scheduler pass
/// - `POST /conversations/:id?force=bool` - Single conversation
pub fn extraction_routes() -> Router<ExtractionAppState> {
    Router::new()
        .route("/batch", post(run_batch))
        .route("/conversations/:id", post(extract_conversation))
}

pub fn extraction_router(state: ExtractionAppState) -> Router {
    extraction_routes().with_state(state)
}
