//! Pipeline data model
//!
//! Everything downstream of ingestion is keyed by the audio fingerprint
//! (lowercase hex SHA-256 of the raw payload). Segment indices are contiguous
//! and identical across the transcript, classification, and every evaluator's
//! records for one fingerprint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Raw transcription collaborator output: one time-bounded transcript slice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// Start time in seconds
    pub start: f64,
    /// End time in seconds
    pub end: f64,
    /// Transcribed text
    pub text: String,
}

/// Topic/tone classification for one segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub topic: String,
    pub tone: String,
}

impl Classification {
    /// Sentinel for a failed classification; never aborts the pipeline
    pub fn unknown() -> Self {
        Self {
            topic: "Unknown".to_string(),
            tone: "Unknown".to_string(),
        }
    }
}

/// Transcript slice merged with its classification; the unit evaluators score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Segment {
    /// Contiguous 0-based index within the fingerprint
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub text: String,
    pub topic: String,
    pub tone: String,
    /// Content flags ("repetition", "profanity", ...)
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Which channel produced an evaluation verdict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringChannel {
    /// Preference-profile rule baseline
    Rule,
    /// Structured LLM verdict superseding the baseline
    Llm,
}

/// One evaluator's scored opinion of one segment
///
/// Overwritten on re-evaluation; expires via the result store TTL.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub evaluator_id: String,
    pub fingerprint: String,
    pub segment_index: usize,
    /// Always within [1, 5]
    pub score: i64,
    /// Always within [0.0, 1.0]; 0.0 signals a degraded (fallback) verdict
    pub confidence: f64,
    pub opinion: String,
    pub rationale: String,
    pub note: String,
    pub channel: ScoringChannel,
    pub created_at: DateTime<Utc>,
}

/// Per-evaluator aggregate statistics for one fingerprint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonaSummary {
    /// Mean over present scores only (missing segments excluded)
    pub avg_score: f64,
    /// Histogram over exactly {"1".."5"}
    pub score_distribution: BTreeMap<String, usize>,
    pub avg_confidence: f64,
    /// Up to N highest-scoring indices at or above the mean, ties by ascending index
    pub top_segments: Vec<usize>,
    /// Up to M lowest-scoring indices at or below the mean, ties by ascending index
    pub worst_segments: Vec<usize>,
}

/// Derived statistics over all evaluation records for one fingerprint
///
/// Contains only evaluators with at least one record; fewer evaluators than
/// registered signals "still processing", never an error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateSummary {
    pub fingerprint: String,
    pub segment_count: usize,
    pub per_evaluator: BTreeMap<String, PersonaSummary>,
}

/// Segment enriched with every evaluator's record, keyed by evaluator id
///
/// Absence of an evaluator key means "not yet evaluated".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichedSegment {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    pub transcript: String,
    pub topic: String,
    pub tone: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// evaluator_id -> record for this segment
    pub evaluations: BTreeMap<String, EvaluationRecord>,
}

/// Lifecycle of one evaluator job on the execution pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

/// Handle returned to the caller for per-job status polling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobHandle {
    pub job_id: Uuid,
    pub evaluator_id: String,
}

/// Tracked status of one dispatched evaluator job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatus {
    pub job_id: Uuid,
    pub evaluator_id: String,
    pub fingerprint: String,
    pub state: JobState,
    /// Populated only when state == Failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enriched_segment_omits_absent_evaluators() {
        let segment = EnrichedSegment {
            index: 0,
            start: 0.0,
            end: 15.0,
            transcript: "hello".to_string(),
            topic: "Technology".to_string(),
            tone: "Excited".to_string(),
            tags: vec![],
            note: None,
            evaluations: BTreeMap::new(),
        };
        let json = serde_json::to_value(&segment).unwrap();
        // Not-yet-evaluated must serialize as an empty map, never an error field
        assert!(json["evaluations"].as_object().unwrap().is_empty());
        assert!(json.get("note").is_none());
    }

    #[test]
    fn test_job_state_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&JobState::Running).unwrap(),
            "\"running\""
        );
    }
}
