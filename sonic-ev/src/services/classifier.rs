//! Classification collaborator boundary
//!
//! `classify(text) -> {topic, tone}` with a fixed label set. A failure on one
//! segment yields the `{Unknown, Unknown}` sentinel and never aborts the rest
//! of the pipeline; the call site handles the fallback so scripted test
//! doubles can exercise both paths.

use crate::models::Classification;
use async_trait::async_trait;
use sonic_common::{Error, Result};
use std::time::Duration;

/// Topic labels produced by the zero-shot classifier collaborator
pub const TOPIC_LABELS: &[&str] = &[
    "Health",
    "Entertainment",
    "Politics",
    "Technology",
    "Food",
    "Education",
];

/// Tone labels produced by the zero-shot classifier collaborator
pub const TONE_LABELS: &[&str] = &[
    "Informative",
    "Humorous",
    "Excited",
    "Neutral",
    "Controversial",
];

/// Classification collaborator contract
#[async_trait]
pub trait Classifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<Classification>;
}

/// HTTP classification collaborator
pub struct HttpClassifier {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpClassifier {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(&self, text: &str) -> Result<Classification> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "text": text,
                "topic_labels": TOPIC_LABELS,
                "tone_labels": TONE_LABELS,
            }))
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Classification request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Upstream(format!(
                "Classification endpoint returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Malformed classification response: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_sentinel() {
        let sentinel = Classification::unknown();
        assert_eq!(sentinel.topic, "Unknown");
        assert_eq!(sentinel.tone, "Unknown");
    }

    #[test]
    fn test_label_sets_are_fixed() {
        assert_eq!(TOPIC_LABELS.len(), 6);
        assert_eq!(TONE_LABELS.len(), 5);
        assert!(TOPIC_LABELS.contains(&"Technology"));
        assert!(TONE_LABELS.contains(&"Humorous"));
    }
}
