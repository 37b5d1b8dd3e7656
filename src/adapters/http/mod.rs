//! HTTP adapters - REST API implementations.
//!
//! Each concern has its own module with handlers, routes and DTOs;
//! [`app_router`] assembles them.

pub mod dto;
pub mod extraction;
pub mod rate_limits;
pub mod router;
pub mod webhook;

pub use dto::{ErrorResponse, HealthResponse};
pub use extraction::{extraction_router, ExtractionAppState};
pub use rate_limits::{rate_limit_router, RateLimitAdminState};
pub use router::{app_router, AppState};
pub use webhook::{webhook_router, SignatureVerifier, WebhookAppState};
