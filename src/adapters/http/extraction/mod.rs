//! Lead extraction HTTP adapter - internal endpoints for schedulers and operators.

pub mod dto;
pub mod handlers;
pub mod routes;

pub use handlers::ExtractionAppState;
pub use routes::extraction_router;
