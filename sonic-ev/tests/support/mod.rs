//! Shared test fixtures: scripted collaborator doubles and app construction
#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use sonic_common::events::EventBus;
use sonic_common::{Error, Result};
use sonic_ev::models::{
    Classification, EvaluationRecord, ScoringChannel, Segment, TranscriptSegment,
};
use sonic_ev::registry::{
    Evaluator, EvaluatorDefinition, EvaluatorRegistry, PreferenceProfile,
};
use sonic_ev::services::classifier::Classifier;
use sonic_ev::services::dispatcher::JobTracker;
use sonic_ev::services::ingest::IngestPipeline;
use sonic_ev::services::store::ResultStore;
use sonic_ev::services::transcription::Transcriber;
use sonic_ev::AppState;

/// Transcriber double: one 15-second segment per scripted text
pub struct ScriptedTranscriber {
    pub texts: Vec<&'static str>,
}

#[async_trait]
impl Transcriber for ScriptedTranscriber {
    async fn transcribe(&self, _bytes: &[u8]) -> Result<Vec<TranscriptSegment>> {
        Ok(self
            .texts
            .iter()
            .enumerate()
            .map(|(i, text)| TranscriptSegment {
                start: i as f64 * 15.0,
                end: (i + 1) as f64 * 15.0,
                text: text.to_string(),
            })
            .collect())
    }
}

pub struct FailingTranscriber;

#[async_trait]
impl Transcriber for FailingTranscriber {
    async fn transcribe(&self, _bytes: &[u8]) -> Result<Vec<TranscriptSegment>> {
        Err(Error::Upstream("transcription service unavailable".to_string()))
    }
}

/// Classifier double: keyword-driven topic, always Neutral tone
pub struct ScriptedClassifier;

#[async_trait]
impl Classifier for ScriptedClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let topic = if text.contains("tech") {
            "Technology"
        } else if text.contains("food") {
            "Food"
        } else {
            "Entertainment"
        };
        Ok(Classification {
            topic: topic.to_string(),
            tone: "Neutral".to_string(),
        })
    }
}

/// Evaluator double scoring each segment index from a fixed table
pub struct FixedEvaluator {
    definition: EvaluatorDefinition,
    scores: Vec<i64>,
}

impl FixedEvaluator {
    pub fn new(id: &str, scores: Vec<i64>) -> Self {
        Self {
            definition: EvaluatorDefinition {
                id: id.to_string(),
                display_name: id.to_string(),
                description: format!("fixed-score evaluator {}", id),
                profile: PreferenceProfile::default(),
                llm_chain: None,
            },
            scores,
        }
    }
}

impl Evaluator for FixedEvaluator {
    fn definition(&self) -> &EvaluatorDefinition {
        &self.definition
    }

    fn evaluate(&self, fingerprint: &str, segment: &Segment) -> EvaluationRecord {
        let score = self.scores[segment.index % self.scores.len()];
        EvaluationRecord {
            evaluator_id: self.definition.id.clone(),
            fingerprint: fingerprint.to_string(),
            segment_index: segment.index,
            score,
            confidence: 0.9,
            opinion: format!("fixed opinion for segment {}", segment.index),
            rationale: format!("fixed score {}", score),
            note: String::new(),
            channel: ScoringChannel::Rule,
            created_at: Utc::now(),
        }
    }
}

/// Build an AppState over an in-memory database with scripted collaborators.
pub async fn test_state(
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn Classifier>,
    registry: EvaluatorRegistry,
    top_n: usize,
    worst_n: usize,
) -> AppState {
    // One connection: each pooled connection of an in-memory database would
    // otherwise see its own empty schema
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("Failed to create in-memory database");
    sonic_ev::db::init_tables(&pool)
        .await
        .expect("Failed to initialize schema");

    let store = ResultStore::new(
        pool.clone(),
        Duration::from_secs(300),
        Duration::from_secs(300),
    );

    AppState {
        db: pool,
        store: store.clone(),
        event_bus: EventBus::new(100),
        registry: Arc::new(registry),
        ingest: Arc::new(IngestPipeline::new(transcriber, classifier, store)),
        llm: None,
        tracker: JobTracker::new(),
        top_segment_count: top_n,
        worst_segment_count: worst_n,
        startup_time: Utc::now(),
        last_error: Arc::new(RwLock::new(None)),
    }
}

/// Default app: three-segment transcript, built-in persona registry.
pub async fn default_test_state() -> AppState {
    test_state(
        Arc::new(ScriptedTranscriber {
            texts: vec!["tech intro", "food review", "tech outro"],
        }),
        Arc::new(ScriptedClassifier),
        EvaluatorRegistry::builtin(),
        3,
        2,
    )
    .await
}
