//! Retrieval/enrichment boundary
//!
//! Merges stored segments with every evaluator's record, keyed by evaluator
//! id. Absence of an evaluator key means "not yet evaluated" and is never an
//! error; the dashboard polls until the evaluators it cares about appear.

use crate::models::{EnrichedSegment, Segment};
use crate::registry::EvaluatorRegistry;
use crate::services::store::ResultStore;
use sonic_common::Result;
use std::collections::BTreeMap;

pub struct Enricher {
    store: ResultStore,
}

impl Enricher {
    pub fn new(store: ResultStore) -> Self {
        Self { store }
    }

    /// Enrich all segments for a fingerprint.
    ///
    /// Returns `Ok(None)` when the fingerprint has no stored segments.
    pub async fn enrich(
        &self,
        fingerprint: &str,
        registry: &EvaluatorRegistry,
    ) -> Result<Option<Vec<EnrichedSegment>>> {
        let Some(segments) = self.store.get_segments(fingerprint).await? else {
            return Ok(None);
        };

        let mut enriched = Vec::with_capacity(segments.len());
        let mut previous_topic: Option<String> = None;

        for segment in &segments {
            let mut evaluations = BTreeMap::new();
            for evaluator in registry.iter() {
                if let Some(record) = self
                    .store
                    .get_record(evaluator.id(), fingerprint, segment.index)
                    .await?
                {
                    evaluations.insert(evaluator.id().to_string(), record);
                }
            }

            enriched.push(EnrichedSegment {
                index: segment.index,
                start: segment.start,
                end: segment.end,
                transcript: segment.text.clone(),
                topic: segment.topic.clone(),
                tone: segment.tone.clone(),
                tags: segment.tags.clone(),
                note: repeated_theme_note(segment, previous_topic.as_deref()),
                evaluations,
            });
            previous_topic = Some(segment.topic.clone());
        }

        Ok(Some(enriched))
    }
}

/// Flag segments that repeat the previous segment's topic
fn repeated_theme_note(segment: &Segment, previous_topic: Option<&str>) -> Option<String> {
    match previous_topic {
        Some(prev) if prev == segment.topic => Some("Repeated theme".to_string()),
        _ => None,
    }
}
