//! sonic-ev library interface for testing
//!
//! Exposes public APIs for integration testing

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod registry;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::registry::EvaluatorRegistry;
use crate::services::dispatcher::{JobDispatcher, JobTracker};
use crate::services::ingest::IngestPipeline;
use crate::services::llm::LlmChannel;
use crate::services::store::ResultStore;
use sonic_common::events::EventBus;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// TTL-bounded result store over the pool
    pub store: ResultStore,
    /// Event bus for SSE broadcasting
    pub event_bus: EventBus,
    /// Registered evaluators, fixed at startup
    pub registry: Arc<EvaluatorRegistry>,
    /// Transcription + classification pipeline
    pub ingest: Arc<IngestPipeline>,
    /// LLM channel; `None` runs every evaluator rule-only
    pub llm: Option<Arc<dyn LlmChannel>>,
    /// Per-job status for polling
    pub tracker: JobTracker,
    /// Segments surfaced in top/worst rankings
    pub top_segment_count: usize,
    pub worst_segment_count: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last error for diagnostic purposes
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    /// Dispatcher over this state's store, LLM channel, and tracker.
    pub fn dispatcher(&self) -> JobDispatcher {
        JobDispatcher::new(
            self.store.clone(),
            self.llm.clone(),
            self.event_bus.clone(),
            self.tracker.clone(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .merge(api::evaluate_routes())
        .merge(api::summary_routes())
        .merge(api::segment_routes())
        .merge(api::job_routes())
        .merge(api::evaluator_routes())
        .merge(api::health_routes())
        .route("/events", get(api::event_stream))
        .with_state(state)
}
