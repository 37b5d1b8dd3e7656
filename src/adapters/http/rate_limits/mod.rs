//! Rate limit administration HTTP adapter.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use dto::ResetResponse;
pub use handlers::RateLimitAdminState;
pub use routes::rate_limit_router;
