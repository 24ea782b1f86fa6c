//! sonic-ev - Audio Evaluation Microservice
//!
//! Accepts raw audio, fingerprints it, transcribes and classifies it into
//! timed segments, and fans one scoring job per registered evaluator persona
//! out onto the runtime. Results live in a TTL-bounded store; progress is
//! streamed over SSE.

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sonic_common::events::EventBus;
use sonic_ev::config::EvConfig;
use sonic_ev::registry::EvaluatorRegistry;
use sonic_ev::services::classifier::HttpClassifier;
use sonic_ev::services::dispatcher::JobTracker;
use sonic_ev::services::ingest::IngestPipeline;
use sonic_ev::services::llm::{LlmChannel, LlmClient};
use sonic_ev::services::store::ResultStore;
use sonic_ev::services::transcription::HttpTranscriber;
use sonic_ev::AppState;

/// Interval between expired-entry sweeps of the result store
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting sonic-ev (Audio Evaluation) microservice");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = EvConfig::load()?;

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create data folder: {}", parent.display()))?;
    }
    info!("Database: {}", db_path.display());

    let db_pool = sonic_ev::db::init_database_pool(&db_path).await?;
    info!("Database connection established");

    let store = ResultStore::new(db_pool.clone(), config.record_ttl(), config.summary_ttl());

    let event_bus = EventBus::new(100);

    let registry = Arc::new(EvaluatorRegistry::builtin());
    info!("Registered evaluators: {}", registry.ids().join(", "));

    // Both collaborators are required; without them ingestion cannot run.
    let transcriber_endpoint = config
        .transcriber_endpoint
        .clone()
        .context("transcriber_endpoint is not configured")?;
    let classifier_endpoint = config
        .classifier_endpoint
        .clone()
        .context("classifier_endpoint is not configured")?;

    let transcriber = Arc::new(HttpTranscriber::new(transcriber_endpoint)?);
    let classifier = Arc::new(HttpClassifier::new(classifier_endpoint)?);
    let ingest = Arc::new(IngestPipeline::new(transcriber, classifier, store.clone()));

    let llm: Option<Arc<dyn LlmChannel>> = match LlmClient::from_config(&config.llm) {
        Some(client) => {
            info!("LLM channel enabled (deployment: {})", config.llm.deployment);
            Some(Arc::new(client))
        }
        None => {
            info!("LLM channel not configured; evaluators run rule-only");
            None
        }
    };

    let state = AppState {
        db: db_pool,
        store: store.clone(),
        event_bus,
        registry,
        ingest,
        llm,
        tracker: JobTracker::new(),
        top_segment_count: config.top_segment_count,
        worst_segment_count: config.worst_segment_count,
        startup_time: chrono::Utc::now(),
        last_error: Arc::new(RwLock::new(None)),
    };

    // Background sweep of expired store entries
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(PURGE_INTERVAL);
        loop {
            interval.tick().await;
            match store.purge_expired().await {
                Ok(0) => {}
                Ok(n) => tracing::debug!(purged = n, "Purged expired store entries"),
                Err(e) => tracing::warn!(error = %e, "Store purge failed"),
            }
        }
    });

    let app = sonic_ev::build_router(state);

    let addr = format!("127.0.0.1:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on http://{}", addr);
    info!("Health check: http://{}/health", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
