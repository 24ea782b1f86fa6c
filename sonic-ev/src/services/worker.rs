//! Evaluator worker
//!
//! Scores every segment for one evaluator, sequentially by index. The only
//! suspension point is the bounded-timeout LLM call; everything else is local
//! work. A failure on segment K never prevents scoring segment K+1, and all
//! writes stay inside the worker's own key namespace.

use crate::models::{EvaluationRecord, ScoringChannel, Segment};
use crate::registry::Evaluator;
use crate::services::llm::LlmChannel;
use crate::services::store::ResultStore;
use sonic_common::events::{EventBus, SonicEvent};
use sonic_common::Result;
use std::sync::Arc;
use uuid::Uuid;

/// Confidence assigned when the LLM channel fails and the rule baseline stands
const DEGRADED_CONFIDENCE: f64 = 0.0;

pub struct EvaluatorWorker {
    store: ResultStore,
    llm: Option<Arc<dyn LlmChannel>>,
    event_bus: EventBus,
}

impl EvaluatorWorker {
    pub fn new(store: ResultStore, llm: Option<Arc<dyn LlmChannel>>, event_bus: EventBus) -> Self {
        Self {
            store,
            llm,
            event_bus,
        }
    }

    /// Score all segments for one evaluator and persist the records.
    ///
    /// Every segment is guaranteed a record: the LLM verdict when the channel
    /// succeeds, otherwise the rule-based baseline with degraded confidence
    /// and the failure reason appended to the rationale.
    pub async fn run(
        &self,
        job_id: Uuid,
        evaluator: &Arc<dyn Evaluator>,
        fingerprint: &str,
        segments: &[Segment],
    ) -> Result<Vec<EvaluationRecord>> {
        let evaluator_id = evaluator.id().to_string();
        tracing::info!(
            evaluator = %evaluator_id,
            fingerprint = %fingerprint,
            segments = segments.len(),
            "Evaluator worker starting"
        );

        let mut records = Vec::with_capacity(segments.len());

        for segment in segments {
            let record = self.score_segment(evaluator, fingerprint, segment).await;

            // A persist failure on this segment must not stop the next one
            if let Err(e) = self.store.put_record(&record).await {
                tracing::error!(
                    evaluator = %evaluator_id,
                    fingerprint = %fingerprint,
                    segment = segment.index,
                    error = %e,
                    "Failed to persist evaluation record, continuing"
                );
            }

            self.event_bus.emit_lossy(SonicEvent::SegmentScored {
                job_id,
                evaluator_id: evaluator_id.clone(),
                fingerprint: fingerprint.to_string(),
                segment_index: segment.index,
                score: record.score,
                timestamp: chrono::Utc::now(),
            });

            records.push(record);
        }

        // Bulk record of the full list, after all segments
        self.store.put_bulk(&evaluator_id, fingerprint, &records).await?;

        tracing::info!(
            evaluator = %evaluator_id,
            fingerprint = %fingerprint,
            records = records.len(),
            "Evaluator worker finished"
        );
        Ok(records)
    }

    /// Score one segment: rule baseline, optionally superseded by the LLM verdict
    async fn score_segment(
        &self,
        evaluator: &Arc<dyn Evaluator>,
        fingerprint: &str,
        segment: &Segment,
    ) -> EvaluationRecord {
        let baseline = evaluator.evaluate(fingerprint, segment);

        let (Some(chain), Some(llm)) = (evaluator.llm_chain(), self.llm.as_ref()) else {
            return baseline;
        };

        match llm.evaluate(chain, segment).await {
            Ok(verdict) => EvaluationRecord {
                score: verdict.score,
                confidence: verdict.confidence,
                opinion: verdict.opinion,
                rationale: verdict.rationale,
                channel: ScoringChannel::Llm,
                ..baseline
            },
            Err(e) => {
                tracing::warn!(
                    evaluator = %evaluator.id(),
                    segment = segment.index,
                    error = %e,
                    "LLM channel failed, falling back to rule baseline"
                );
                EvaluationRecord {
                    confidence: DEGRADED_CONFIDENCE,
                    rationale: format!("{} (LLM fallback: {})", baseline.rationale, e),
                    ..baseline
                }
            }
        }
    }
}
