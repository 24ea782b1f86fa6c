//! Ingestion pipeline
//!
//! Transcribes the payload, classifies every segment, derives content tags,
//! and persists the segment list under the fingerprint. Transcription failure
//! aborts the whole ingestion (no partial transcript is timing-consistent);
//! a classification failure on one segment yields the Unknown sentinel and
//! does not abort the others.

use crate::models::{Classification, Segment, TranscriptSegment};
use crate::services::classifier::Classifier;
use crate::services::store::ResultStore;
use crate::services::transcription::Transcriber;
use sonic_common::Result;
use std::sync::Arc;

pub struct IngestPipeline {
    transcriber: Arc<dyn Transcriber>,
    classifier: Arc<dyn Classifier>,
    store: ResultStore,
}

impl IngestPipeline {
    pub fn new(
        transcriber: Arc<dyn Transcriber>,
        classifier: Arc<dyn Classifier>,
        store: ResultStore,
    ) -> Self {
        Self {
            transcriber,
            classifier,
            store,
        }
    }

    /// Transcribe, classify, and persist the segment list for a fingerprint.
    ///
    /// Returns the classified segments ready for evaluator dispatch.
    pub async fn run(&self, fingerprint: &str, bytes: &[u8]) -> Result<Vec<Segment>> {
        let transcript = self.transcriber.transcribe(bytes).await?;
        tracing::info!(
            fingerprint = %fingerprint,
            segments = transcript.len(),
            "Transcription complete"
        );

        let segments = self.classify_segments(&transcript).await;

        self.store.put_transcript(fingerprint, &transcript).await?;
        self.store.put_segments(fingerprint, &segments).await?;
        tracing::info!(
            fingerprint = %fingerprint,
            segments = segments.len(),
            "Stored transcript and classification"
        );

        Ok(segments)
    }

    /// Classify each transcript segment, falling back to the Unknown sentinel
    /// per segment, and derive content tags.
    async fn classify_segments(&self, transcript: &[TranscriptSegment]) -> Vec<Segment> {
        let mut segments = Vec::with_capacity(transcript.len());
        let mut previous_topic: Option<String> = None;

        for (index, slice) in transcript.iter().enumerate() {
            let classification = match self.classifier.classify(&slice.text).await {
                Ok(c) => c,
                Err(e) => {
                    tracing::warn!(
                        segment = index,
                        error = %e,
                        "Classification failed, using Unknown sentinel"
                    );
                    Classification::unknown()
                }
            };

            let tags = derive_tags(&classification, previous_topic.as_deref());
            previous_topic = Some(classification.topic.clone());

            segments.push(Segment {
                index,
                start: slice.start,
                end: slice.end,
                text: slice.text.clone(),
                topic: classification.topic,
                tone: classification.tone,
                tags,
            });
        }

        segments
    }
}

/// Content tags derived from classification context.
///
/// A segment repeating the previous segment's topic is tagged "repetition";
/// Unknown-topic repeats are not, so failed classifications never penalize
/// the rule baseline.
fn derive_tags(classification: &Classification, previous_topic: Option<&str>) -> Vec<String> {
    let mut tags = Vec::new();
    if classification.topic != "Unknown"
        && previous_topic.is_some_and(|prev| prev == classification.topic)
    {
        tags.push("repetition".to_string());
    }
    tags
}
