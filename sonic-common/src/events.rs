//! Event types for the SonicLayer event system
//!
//! Provides shared event definitions and EventBus for all SonicLayer services.
//! Events are broadcast via EventBus and can be serialized for SSE transmission.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// SonicLayer event types
///
/// One central enum for type safety and exhaustive matching across services.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SonicEvent {
    /// Ingestion accepted a new audio payload and started the pipeline
    IngestStarted {
        fingerprint: String,
        byte_count: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Transcription + classification finished; evaluation jobs dispatched
    IngestCompleted {
        fingerprint: String,
        segment_count: usize,
        jobs_dispatched: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One evaluator job was enqueued on the execution pool
    EvaluationJobQueued {
        job_id: Uuid,
        evaluator_id: String,
        fingerprint: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One evaluator job started scoring segments
    EvaluationJobStarted {
        job_id: Uuid,
        evaluator_id: String,
        fingerprint: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// A single segment was scored (rule-based or LLM channel)
    SegmentScored {
        job_id: Uuid,
        evaluator_id: String,
        fingerprint: String,
        segment_index: usize,
        score: i64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One evaluator job finished scoring all segments
    EvaluationJobCompleted {
        job_id: Uuid,
        evaluator_id: String,
        fingerprint: String,
        segments_scored: usize,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// One evaluator job failed before completing its segment list
    EvaluationJobFailed {
        job_id: Uuid,
        evaluator_id: String,
        fingerprint: String,
        error: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl SonicEvent {
    /// Event type name for SSE `event:` field routing
    pub fn event_type(&self) -> &str {
        match self {
            SonicEvent::IngestStarted { .. } => "IngestStarted",
            SonicEvent::IngestCompleted { .. } => "IngestCompleted",
            SonicEvent::EvaluationJobQueued { .. } => "EvaluationJobQueued",
            SonicEvent::EvaluationJobStarted { .. } => "EvaluationJobStarted",
            SonicEvent::SegmentScored { .. } => "SegmentScored",
            SonicEvent::EvaluationJobCompleted { .. } => "EvaluationJobCompleted",
            SonicEvent::EvaluationJobFailed { .. } => "EvaluationJobFailed",
        }
    }
}

/// Broadcast event bus shared by pipeline components and SSE handlers
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SonicEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    ///
    /// Events emitted before subscription are not received.
    pub fn subscribe(&self) -> broadcast::Receiver<SonicEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(
        &self,
        event: SonicEvent,
    ) -> Result<usize, broadcast::error::SendError<SonicEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    ///
    /// Pipeline progress events are non-critical; it is acceptable if no
    /// component is currently listening.
    pub fn emit_lossy(&self, event: SonicEvent) {
        let _ = self.tx.send(event);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
