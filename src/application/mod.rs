//! Application layer - services and handlers.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;

pub use handlers::{
    BatchReport, BatchScheduler, ConversationGateway, ExtractLeadCommand, ExtractionError,
    ExtractionOutcome, InboundMessage, InboundReply, IngestMessageHandler, IngestSettings,
    LeadExtractor, MessageLedger, RateLimitDecision, RateLimiter, ReplyDisposition,
};
