//! Transcription collaborator boundary
//!
//! Transcription is consumed as an opaque collaborator with a fixed contract:
//! `transcribe(bytes) -> ordered [{start, end, text}]`. A collaborator failure
//! aborts the whole ingestion since no partial transcript is timing-consistent.

use crate::models::TranscriptSegment;
use async_trait::async_trait;
use serde::Deserialize;
use sonic_common::{Error, Result};
use std::time::Duration;

/// Words-per-second estimate used when a collaborator returns plain text
const WORDS_PER_SECOND: f64 = 2.5;

/// Transcription collaborator contract
#[async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, bytes: &[u8]) -> Result<Vec<TranscriptSegment>>;
}

/// Transcription endpoint response: either timed segments or plain text
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TranscriberResponse {
    Segments { segments: Vec<TranscriptSegment> },
    PlainText { text: String },
}

/// HTTP transcription collaborator
///
/// POSTs the raw audio bytes to the configured endpoint. Accepts either
/// `{"segments": [{start, end, text}, ...]}` or `{"text": "..."}`; plain text
/// is normalized into fixed-duration windows.
pub struct HttpTranscriber {
    client: reqwest::Client,
    endpoint: String,
    segment_duration: f64,
}

impl HttpTranscriber {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            endpoint,
            segment_duration: 15.0,
        })
    }
}

#[async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, bytes: &[u8]) -> Result<Vec<TranscriptSegment>> {
        tracing::debug!(bytes = bytes.len(), endpoint = %self.endpoint, "Transcribing payload");

        let response = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Transcription request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Transcription endpoint returned {}",
                response.status()
            )));
        }

        let parsed: TranscriberResponse = response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Malformed transcription response: {}", e)))?;

        let segments = match parsed {
            TranscriberResponse::Segments { segments } => segments,
            TranscriberResponse::PlainText { text } => {
                segment_text(&text, self.segment_duration)
            }
        };

        tracing::info!(segments = segments.len(), "Transcription complete");
        Ok(segments)
    }
}

/// Break a plain-text transcript into fixed-duration segments,
/// estimating timing at ~2.5 words per second.
pub fn segment_text(transcript: &str, segment_duration: f64) -> Vec<TranscriptSegment> {
    let words: Vec<&str> = transcript.split_whitespace().collect();
    let words_per_segment = (segment_duration * WORDS_PER_SECOND) as usize;
    if words_per_segment == 0 || words.is_empty() {
        return Vec::new();
    }

    let round2 = |v: f64| (v * 100.0).round() / 100.0;
    words
        .chunks(words_per_segment)
        .enumerate()
        .map(|(i, chunk)| {
            let start_word = i * words_per_segment;
            TranscriptSegment {
                start: round2(start_word as f64 / WORDS_PER_SECOND),
                end: round2((start_word + words_per_segment) as f64 / WORDS_PER_SECOND),
                text: chunk.join(" "),
            }
        })
        .collect()
}
