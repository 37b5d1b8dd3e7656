//! Leadflow server binary.
//!
//! Wires configuration, storage, rate limiting, the language model provider and
//! the extraction scheduler into one axum server.

use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use leadflow::adapters::ai::{LlmResponseGenerator, OpenAIConfig, OpenAIProvider};
use leadflow::adapters::counter_store::{InMemoryCounterStore, RedisCounterStore};
use leadflow::adapters::http::{
    app_router, AppState, ExtractionAppState, RateLimitAdminState, SignatureVerifier,
    WebhookAppState,
};
use leadflow::adapters::memory::InMemoryConversationStore;
use leadflow::adapters::postgres::PostgresConversationStore;
use leadflow::application::handlers::{
    run_scheduler, BatchScheduler, IngestMessageHandler, IngestSettings, LeadExtractor,
    RateLimiter,
};
use leadflow::config::{AiConfig, AppConfig, CounterBackend, LogFormat};
use leadflow::ports::{AIProvider, ConversationStore, CounterStore};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let store = conversation_store(&config).await?;
    let counters = counter_store(&config).await?;

    let reply_provider = openai_provider(&config.ai, &config.ai.reply_model)?;
    let extraction_provider = openai_provider(&config.ai, &config.ai.extraction_model)?;
    let extraction_info = extraction_provider.provider_info();
    tracing::info!(
        provider = %extraction_info.name,
        reply_model = %reply_provider.provider_info().model,
        extraction_model = %extraction_info.model,
        structured_output = extraction_info.supports_structured_output,
        "Language model configured"
    );

    let limiter = Arc::new(RateLimiter::new(counters, config.rate_limit.clone()));
    let ingest = Arc::new(IngestMessageHandler::new(
        limiter.clone(),
        store.clone(),
        Arc::new(LlmResponseGenerator::new(reply_provider)),
        IngestSettings::from(&config.webhook),
    ));
    let extractor = Arc::new(LeadExtractor::new(store.clone(), extraction_provider));
    let scheduler = Arc::new(BatchScheduler::new(
        store,
        extractor.clone(),
        config.extraction.trigger(),
        config.extraction.batch_size,
        config.extraction.time_budget(),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_task = config.extraction.scheduler_enabled.then(|| {
        tokio::spawn(run_scheduler(
            scheduler.clone(),
            config.extraction.poll_interval(),
            shutdown_rx,
        ))
    });

    let state = AppState {
        webhook: WebhookAppState::new(
            ingest,
            config.webhook.signing_secret().map(SignatureVerifier::new),
        ),
        rate_limits: RateLimitAdminState { limiter },
        extraction: ExtractionAppState {
            extractor,
            scheduler,
        },
    };
    let app = app_router(state, config.server.request_timeout());

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, environment = ?config.server.environment, "Leadflow listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = scheduler_task {
        if let Err(err) = task.await {
            tracing::error!(error = %err, "Extraction scheduler task failed");
        }
    }

    tracing::info!("Leadflow stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = if config.server.log_format() == LogFormat::Json {
        tracing::subscriber::set_global_default(builder.json().finish())
    } else {
        tracing::subscriber::set_global_default(builder.finish())
    };
    if let Err(err) = result {
        eprintln!("tracing already initialised: {err}");
    }
}

async fn conversation_store(config: &AppConfig) -> Result<Arc<dyn ConversationStore>, BoxError> {
    let db = &config.database;
    if !db.is_configured() {
        tracing::warn!("No database configured, using the in-memory conversation store");
        return Ok(Arc::new(InMemoryConversationStore::new()));
    }

    let pool = PgPoolOptions::new()
        .min_connections(db.min_connections)
        .max_connections(db.max_connections)
        .acquire_timeout(db.acquire_timeout())
        .idle_timeout(db.idle_timeout())
        .connect(&db.url)
        .await?;

    if db.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("Database migrations applied");
    }

    Ok(Arc::new(PostgresConversationStore::new(pool)))
}

async fn counter_store(config: &AppConfig) -> Result<Arc<dyn CounterStore>, BoxError> {
    match config.rate_limit.backend {
        CounterBackend::Memory => Ok(Arc::new(InMemoryCounterStore::new())),
        CounterBackend::Redis => {
            let store = tokio::time::timeout(
                config.redis.timeout(),
                RedisCounterStore::connect(&config.redis.url),
            )
            .await
            .map_err(|_| "timed out connecting to Redis")??;
            tracing::info!("Rate limit counters stored in Redis");
            Ok(Arc::new(store))
        }
    }
}

fn openai_provider(ai: &AiConfig, model: &str) -> Result<Arc<dyn AIProvider>, BoxError> {
    let api_key = ai.api_key.clone().unwrap_or_default();
    let provider = OpenAIProvider::new(
        OpenAIConfig::new(api_key)
            .with_model(model)
            .with_base_url(&ai.base_url)
            .with_timeout(ai.timeout())
            .with_max_retries(ai.max_retries),
    )?;
    Ok(Arc::new(provider))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    tracing::info!("Shutdown signal received");
}
