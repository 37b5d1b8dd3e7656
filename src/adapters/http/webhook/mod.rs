//! Webhook HTTP adapter - inbound messages from the transport provider.

pub mod handlers;
pub mod routes;
pub mod signature;

pub use handlers::WebhookAppState;
pub use routes::webhook_router;
pub use signature::{SignatureError, SignatureVerifier, SIGNATURE_HEADER};
