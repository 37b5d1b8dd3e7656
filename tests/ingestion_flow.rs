//! Integration tests for the inbound message path.
//!
//! Drives `IngestMessageHandler` end to end with the in-memory conversation
//! store, in-memory counters and the mock language model:
//! 1. Rate limiting (including many concurrent deliveries)
//! 2. Tenant resolution and conversation find-or-create
//! 3. Message persistence and reply generation

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;

use leadflow::adapters::ai::{LlmResponseGenerator, MockAIProvider};
use leadflow::adapters::counter_store::InMemoryCounterStore;
use leadflow::adapters::memory::InMemoryConversationStore;
use leadflow::application::handlers::{
    ConversationGateway, InboundMessage, IngestMessageHandler, IngestSettings, RateLimiter,
    ReplyDisposition,
};
use leadflow::config::RateLimitConfig;
use leadflow::domain::conversation::Sender;
use leadflow::domain::foundation::CustomerId;
use leadflow::domain::lead::{LeadStatus, LeadType};
use leadflow::ports::{AIError, ConversationStore};

// =============================================================================
// Test Infrastructure
// =============================================================================

const TARGET: &str = "+15550001";
const FALLBACK: &str = "Thanks! We'll get back to you shortly.";

struct Harness {
    store: Arc<InMemoryConversationStore>,
    provider: Arc<MockAIProvider>,
    limiter: Arc<RateLimiter>,
    handler: Arc<IngestMessageHandler>,
}

async fn harness(provider: MockAIProvider, rate_limit: RateLimitConfig) -> Harness {
    let store = Arc::new(InMemoryConversationStore::new());
    store.add_tenant("Nile Bakery", TARGET).await;

    let provider = Arc::new(provider);
    let limiter = Arc::new(RateLimiter::new(
        Arc::new(InMemoryCounterStore::new()),
        rate_limit,
    ));
    let handler = Arc::new(IngestMessageHandler::new(
        limiter.clone(),
        store.clone(),
        Arc::new(LlmResponseGenerator::new(provider.clone())),
        IngestSettings {
            reply_timeout: Duration::from_secs(2),
            fallback_reply: FALLBACK.to_string(),
        },
    ));

    Harness {
        store,
        provider,
        limiter,
        handler,
    }
}

fn inbound(sender: &str, body: &str) -> InboundMessage {
    InboundMessage {
        target: TARGET.to_string(),
        sender: sender.to_string(),
        body: body.to_string(),
    }
}

// =============================================================================
// Ingestion
// =============================================================================

#[tokio::test]
async fn first_message_creates_conversation_lead_and_reply() {
    let h = harness(
        MockAIProvider::new().with_response("Hi! Yes, we deliver within Cairo."),
        RateLimitConfig::default(),
    )
    .await;

    let reply = h
        .handler
        .handle(inbound("+201234567890", "Do you deliver to Zamalek?"))
        .await;

    assert_eq!(reply.disposition, ReplyDisposition::Replied);
    assert_eq!(reply.reply, "Hi! Yes, we deliver within Cairo.");
    let conversation_id = reply.conversation_id.expect("conversation id");

    let transcript = h.store.load_transcript(conversation_id).await.unwrap();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].sender, Sender::Customer);
    assert_eq!(transcript[0].content, "Do you deliver to Zamalek?");
    assert_eq!(transcript[1].sender, Sender::Bot);

    let lead = h
        .store
        .find_lead_by_conversation(conversation_id)
        .await
        .unwrap()
        .expect("seeded lead");
    assert_eq!(lead.customer_name, "Unknown");
    assert_eq!(lead.customer_phone, "+201234567890");
    assert_eq!(lead.lead_type, LeadType::Inquiry);
    assert_eq!(lead.status, LeadStatus::New);
    assert_eq!(lead.details, "Do you deliver to Zamalek?");
}

#[tokio::test]
async fn follow_up_messages_reuse_the_open_conversation() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;

    let first = h.handler.handle(inbound("+201234567890", "Hello")).await;
    let second = h.handler.handle(inbound("+201234567890", "Are you open today?")).await;

    assert_eq!(first.conversation_id, second.conversation_id);
    assert_eq!(h.store.conversation_count().await, 1);
    assert_eq!(h.store.lead_count().await, 1);
    assert_eq!(h.provider.call_count(), 2);
}

#[tokio::test]
async fn unknown_target_gets_fallback_and_stores_nothing() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;

    let reply = h
        .handler
        .handle(InboundMessage {
            target: "+19999999".to_string(),
            sender: "+201234567890".to_string(),
            body: "Hello".to_string(),
        })
        .await;

    assert_eq!(reply.disposition, ReplyDisposition::Fallback);
    assert_eq!(reply.reply, FALLBACK);
    assert_eq!(h.store.conversation_count().await, 0);
    assert_eq!(h.provider.call_count(), 0);
}

#[tokio::test]
async fn model_failure_falls_back_but_keeps_customer_message() {
    let h = harness(
        MockAIProvider::new().with_error(AIError::unavailable("upstream 503")),
        RateLimitConfig::default(),
    )
    .await;

    let reply = h.handler.handle(inbound("+201234567890", "Hello")).await;

    assert_eq!(reply.disposition, ReplyDisposition::Fallback);
    assert_eq!(reply.reply, FALLBACK);
    let transcript = h
        .store
        .load_transcript(reply.conversation_id.expect("conversation id"))
        .await
        .unwrap();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender, Sender::Customer);
}

// =============================================================================
// Rate Limiting
// =============================================================================

#[tokio::test]
async fn sixth_message_in_window_is_rate_limited_and_not_stored() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;

    for i in 0..5 {
        let reply = h.handler.handle(inbound("+201234567890", &format!("msg {}", i))).await;
        assert_eq!(reply.disposition, ReplyDisposition::Replied);
    }
    let limited = h.handler.handle(inbound("+201234567890", "one more")).await;

    assert_eq!(limited.disposition, ReplyDisposition::RateLimited);
    assert!(limited.reply.contains("UTC"));

    let customer = CustomerId::new("+201234567890").unwrap();
    let tenant = h.store.resolve_tenant(TARGET).await.unwrap().unwrap();
    let conversation = h
        .store
        .find_open_conversation(tenant.id, &customer)
        .await
        .unwrap()
        .unwrap();
    let transcript = h.store.load_transcript(conversation.id()).await.unwrap();
    let customer_messages = transcript
        .iter()
        .filter(|m| m.sender == Sender::Customer)
        .count();
    assert_eq!(customer_messages, 5);
}

#[tokio::test]
async fn concurrent_checks_from_one_sender_never_exceed_the_ceiling() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;

    let decisions = join_all((0..20).map(|_| {
        let limiter = h.limiter.clone();
        async move { limiter.check(TARGET, "+201234567890").await }
    }))
    .await;

    let allowed = decisions.iter().filter(|d| d.allowed).count();
    assert_eq!(allowed, 5);
}

#[tokio::test]
async fn concurrent_senders_share_the_global_ceiling() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;

    let decisions = join_all((0..40).map(|i| {
        let limiter = h.limiter.clone();
        async move { limiter.check(TARGET, &format!("+2012345678{:02}", i)).await }
    }))
    .await;

    let allowed = decisions.iter().filter(|d| d.allowed).count();
    assert_eq!(allowed, 30);

    let stats = h.limiter.statistics(TARGET).await.unwrap();
    assert_eq!(stats.global_count, 30);
}

// =============================================================================
// Conversation Find-or-Create
// =============================================================================

#[tokio::test]
async fn concurrent_first_messages_create_one_conversation() {
    let h = harness(MockAIProvider::new(), RateLimitConfig::default()).await;
    let tenant = h.store.resolve_tenant(TARGET).await.unwrap().unwrap();
    let gateway = Arc::new(ConversationGateway::new(h.store.clone()));
    let customer = CustomerId::new("+201234567890").unwrap();

    let handles = join_all((0..25).map(|i| {
        let gateway = gateway.clone();
        let customer = customer.clone();
        async move {
            gateway
                .find_or_create(tenant.id, &customer, &format!("hello {}", i))
                .await
                .unwrap()
        }
    }))
    .await;

    let first = handles[0].conversation.id();
    assert!(handles.iter().all(|h| h.conversation.id() == first));
    assert_eq!(h.store.conversation_count().await, 1);
    assert_eq!(h.store.lead_count().await, 1);
}

#[tokio::test]
async fn concurrent_webhook_deliveries_for_one_customer_share_a_conversation() {
    let h = harness(
        MockAIProvider::new(),
        RateLimitConfig {
            per_sender_limit: 100,
            global_limit: 100,
            ..RateLimitConfig::default()
        },
    )
    .await;

    let replies = join_all((0..10).map(|i| {
        let handler = h.handler.clone();
        async move { handler.handle(inbound("+201234567890", &format!("part {}", i))).await }
    }))
    .await;

    let ids: std::collections::HashSet<_> =
        replies.iter().filter_map(|r| r.conversation_id).collect();
    assert_eq!(ids.len(), 1);
    assert_eq!(h.store.conversation_count().await, 1);
}
