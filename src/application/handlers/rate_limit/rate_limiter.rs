//! RateLimiter - per-sender and per-target message quotas.
//!
//! Fixed windows of `window_secs` aligned to the Unix epoch. Each window gets
//! its own counter keys, so counters reset at bucket boundaries and expire on
//! their own:
//!
//! - `ratelimit:{target}:sender:{sender}:{window_start}`
//! - `ratelimit:{target}:total:{window_start}`
//!
//! A check takes a slot speculatively (increment first) and hands it back when
//! a ceiling is exceeded. Admitted requests never give their slot back, so the
//! number of admissions per window can never exceed either ceiling, even with
//! concurrent callers across processes.
//!
//! If the counter store fails, the check fails open.

use serde::Serialize;
use std::fmt;
use std::sync::Arc;

use crate::config::RateLimitConfig;
use crate::domain::foundation::Timestamp;
use crate::ports::{CounterStore, CounterStoreError};

const KEY_PREFIX: &str = "ratelimit";

/// Why a request was denied, or why it was allowed without counting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RateLimitReason {
    /// The sender used up its own quota for this target.
    PerSenderLimit { limit: u64, window_secs: u64 },
    /// The target's quota across all senders is used up.
    GlobalLimit { limit: u64, window_secs: u64 },
    /// Counter store unreachable; allowed without counting.
    BackendUnavailable { message: String },
}

impl fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitReason::PerSenderLimit { limit, window_secs } => write!(
                f,
                "per-sender limit of {} messages per {}s reached",
                limit, window_secs
            ),
            RateLimitReason::GlobalLimit { limit, window_secs } => write!(
                f,
                "global limit of {} messages per {}s reached",
                limit, window_secs
            ),
            RateLimitReason::BackendUnavailable { message } => {
                write!(f, "rate limiter unavailable, request allowed: {}", message)
            }
        }
    }
}

/// Outcome of [`RateLimiter::check`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Min of per-sender and global headroom after this request.
    pub remaining: u64,
    /// End of the current window.
    pub reset_at: Timestamp,
    pub reason: Option<RateLimitReason>,
}

impl RateLimitDecision {
    pub fn is_fail_open(&self) -> bool {
        matches!(self.reason, Some(RateLimitReason::BackendUnavailable { .. }))
    }
}

/// Read-only quota view for one sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderStatus {
    pub target: String,
    pub sender: String,
    pub sender_count: u64,
    pub sender_limit: u64,
    pub global_count: u64,
    pub global_limit: u64,
    pub remaining: u64,
    pub window_start: Timestamp,
    pub reset_at: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SenderCount {
    pub sender: String,
    pub count: u64,
}

/// All open per-sender counters of a target in the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetStatistics {
    pub target: String,
    pub global_count: u64,
    pub global_limit: u64,
    pub sender_limit: u64,
    pub window_start: Timestamp,
    pub reset_at: Timestamp,
    /// Busiest senders first.
    pub senders: Vec<SenderCount>,
}

/// Message quota enforcement over a [`CounterStore`].
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    config: RateLimitConfig,
}

#[derive(Debug, Clone, Copy)]
struct Window {
    start: u64,
    end: u64,
}

impl Window {
    fn containing(now: u64, length: u64) -> Self {
        let length = length.max(1);
        let start = now - now % length;
        Self {
            start,
            end: start + length,
        }
    }

    fn ttl_from(&self, now: u64) -> u64 {
        self.end.saturating_sub(now).max(1)
    }
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: RateLimitConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Checks and, if allowed, counts one message from `sender` to `target`.
    pub async fn check(&self, target: &str, sender: &str) -> RateLimitDecision {
        self.check_at(target, sender, Timestamp::now()).await
    }

    /// [`check`](Self::check) at an explicit instant.
    pub async fn check_at(&self, target: &str, sender: &str, now: Timestamp) -> RateLimitDecision {
        let now_secs = now.as_unix_secs();
        let window = Window::containing(now_secs, self.config.window_secs);
        let reset_at = Timestamp::from_unix_secs(window.end);
        let ttl = window.ttl_from(now_secs);

        match self.take_slot(target, sender, window, ttl).await {
            Ok(Slot::Admitted {
                sender_count,
                global_count,
            }) => {
                let remaining = self.headroom(sender_count, global_count);
                tracing::debug!(target_id = %target, sender = %sender, remaining, "message admitted");
                RateLimitDecision {
                    allowed: true,
                    remaining,
                    reset_at,
                    reason: None,
                }
            }
            Ok(Slot::Denied(reason)) => {
                tracing::info!(target_id = %target, sender = %sender, %reason, "message rate limited");
                RateLimitDecision {
                    allowed: false,
                    remaining: 0,
                    reset_at,
                    reason: Some(reason),
                }
            }
            Err(err) => {
                tracing::warn!(
                    target_id = %target,
                    sender = %sender,
                    error = %err,
                    "counter store failed, allowing message"
                );
                RateLimitDecision {
                    allowed: true,
                    remaining: self.config.per_sender_limit.min(self.config.global_limit),
                    reset_at,
                    reason: Some(RateLimitReason::BackendUnavailable {
                        message: err.to_string(),
                    }),
                }
            }
        }
    }

    async fn take_slot(
        &self,
        target: &str,
        sender: &str,
        window: Window,
        ttl: u64,
    ) -> Result<Slot, CounterStoreError> {
        let sender_key = sender_key(target, sender, window.start);
        let global_key = global_key(target, window.start);

        let sender_count = self.store.increment_and_get(&sender_key, ttl).await?;
        if sender_count > self.config.per_sender_limit {
            self.give_back(&sender_key).await;
            return Ok(Slot::Denied(RateLimitReason::PerSenderLimit {
                limit: self.config.per_sender_limit,
                window_secs: self.config.window_secs,
            }));
        }

        let global_count = match self.store.increment_and_get(&global_key, ttl).await {
            Ok(count) => count,
            Err(err) => {
                self.give_back(&sender_key).await;
                return Err(err);
            }
        };
        if global_count > self.config.global_limit {
            self.give_back(&global_key).await;
            self.give_back(&sender_key).await;
            return Ok(Slot::Denied(RateLimitReason::GlobalLimit {
                limit: self.config.global_limit,
                window_secs: self.config.window_secs,
            }));
        }

        Ok(Slot::Admitted {
            sender_count,
            global_count,
        })
    }

    async fn give_back(&self, key: &str) {
        if let Err(err) = self.store.decrement(key).await {
            tracing::warn!(key, error = %err, "failed to release rate limit slot");
        }
    }

    fn headroom(&self, sender_count: u64, global_count: u64) -> u64 {
        let sender_left = self.config.per_sender_limit.saturating_sub(sender_count);
        let global_left = self.config.global_limit.saturating_sub(global_count);
        sender_left.min(global_left)
    }

    /// Current quota usage for one sender; does not count as a message.
    pub async fn status(&self, target: &str, sender: &str) -> Result<SenderStatus, CounterStoreError> {
        let now = Timestamp::now().as_unix_secs();
        let window = Window::containing(now, self.config.window_secs);

        let sender_count = self.store.get(&sender_key(target, sender, window.start)).await?;
        let global_count = self.store.get(&global_key(target, window.start)).await?;

        Ok(SenderStatus {
            target: target.to_string(),
            sender: sender.to_string(),
            sender_count,
            sender_limit: self.config.per_sender_limit,
            global_count,
            global_limit: self.config.global_limit,
            remaining: self.headroom(sender_count, global_count),
            window_start: Timestamp::from_unix_secs(window.start),
            reset_at: Timestamp::from_unix_secs(window.end),
        })
    }

    /// Deletes counters for one sender, or every counter of the target.
    ///
    /// Returns the number of counters removed.
    pub async fn reset(&self, target: &str, sender: Option<&str>) -> Result<u64, CounterStoreError> {
        let prefix = match sender {
            Some(sender) => sender_prefix(target, sender),
            None => target_prefix(target),
        };
        let removed = self.store.delete_by_prefix(&prefix).await?;
        tracing::info!(target_id = %target, sender = ?sender, removed, "rate limit counters reset");
        Ok(removed)
    }

    /// Lists open per-sender counters of the current window.
    pub async fn statistics(&self, target: &str) -> Result<TargetStatistics, CounterStoreError> {
        let now = Timestamp::now().as_unix_secs();
        let window = Window::containing(now, self.config.window_secs);
        let sender_prefix = format!("{}sender:", target_prefix(target));

        let mut senders: Vec<SenderCount> = self
            .store
            .scan_prefix(&sender_prefix)
            .await?
            .into_iter()
            .filter_map(|(key, count)| {
                let rest = key.strip_prefix(&sender_prefix)?;
                let (sender, window_start) = rest.rsplit_once(':')?;
                (window_start.parse::<u64>().ok()? == window.start && count > 0).then(|| {
                    SenderCount {
                        sender: decode_part(sender),
                        count,
                    }
                })
            })
            .collect();
        senders.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.sender.cmp(&b.sender)));

        let global_count = self.store.get(&global_key(target, window.start)).await?;

        Ok(TargetStatistics {
            target: target.to_string(),
            global_count,
            global_limit: self.config.global_limit,
            sender_limit: self.config.per_sender_limit,
            window_start: Timestamp::from_unix_secs(window.start),
            reset_at: Timestamp::from_unix_secs(window.end),
            senders,
        })
    }
}

enum Slot {
    Admitted { sender_count: u64, global_count: u64 },
    Denied(RateLimitReason),
}

fn target_prefix(target: &str) -> String {
    format!("{}:{}:", KEY_PREFIX, encode_part(target))
}

fn sender_prefix(target: &str, sender: &str) -> String {
    format!("{}sender:{}:", target_prefix(target), encode_part(sender))
}

fn sender_key(target: &str, sender: &str, window_start: u64) -> String {
    format!("{}{}", sender_prefix(target, sender), window_start)
}

fn global_key(target: &str, window_start: u64) -> String {
    format!("{}total:{}", target_prefix(target), window_start)
}

/// Keeps `:` out of key segments so prefixes stay unambiguous.
fn encode_part(raw: &str) -> String {
    raw.replace('%', "%25").replace(':', "%3A")
}

fn decode_part(encoded: &str) -> String {
    encoded.replace("%3A", ":").replace("%25", "%")
}
