//! Rate limiting for inbound messages.

mod rate_limiter;

pub use rate_limiter::{
    RateLimitDecision, RateLimitReason, RateLimiter, SenderCount, SenderStatus, TargetStatistics,
};
