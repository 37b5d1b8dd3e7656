//! Application handlers.
//!
//! Services and command handlers that orchestrate domain operations over the ports.

pub mod conversation;
pub mod extraction;
pub mod intake;
pub mod rate_limit;

pub use conversation::{ConversationGateway, ConversationHandle, ConversationOrigin, MessageLedger};
pub use extraction::{
    run_scheduler, BatchItem, BatchItemStatus, BatchReport, BatchScheduler, ExtractLeadCommand,
    ExtractionError, ExtractionOutcome, LeadExtractor,
};
pub use intake::{
    InboundMessage, InboundReply, IngestMessageHandler, IngestSettings, ReplyDisposition,
};
pub use rate_limit::{
    RateLimitDecision, RateLimitReason, RateLimiter, SenderCount, SenderStatus, TargetStatistics,
};
