//! LLM refinement channel
//!
//! Evaluators with a configured prompt chain attempt a bounded-timeout call to
//! a chat-completions endpoint. The response is schema-validated at the
//! boundary: any timeout, transport failure, non-JSON payload, missing field,
//! or out-of-range value is an `LlmError` and the worker falls back to the
//! rule-based baseline. A parse failure is never silently-wrong data.

use crate::config::LlmConfig;
use crate::models::Segment;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// LLM channel errors (EvaluatorCallFailure taxonomy)
#[derive(Debug, Error)]
pub enum LlmError {
    /// Call exceeded the configured timeout
    #[error("LLM call timed out")]
    Timeout,

    /// Transport-level failure
    #[error("LLM request failed: {0}")]
    Network(String),

    /// Endpoint returned a non-success status
    #[error("LLM endpoint returned {0}")]
    Status(u16),

    /// Response body did not match the verdict schema
    #[error("Malformed LLM response: {0}")]
    Malformed(String),

    /// Schema-valid response with out-of-range values
    #[error("LLM verdict out of range: {0}")]
    OutOfRange(String),

    /// Evaluator references a chain with no registered prompts
    #[error("Unknown prompt chain: {0}")]
    UnknownChain(String),
}

/// Structured verdict returned by the LLM channel
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmVerdict {
    pub score: i64,
    pub opinion: String,
    pub rationale: String,
    pub confidence: f64,
}

impl LlmVerdict {
    /// Enforce the record invariants before the verdict supersedes a baseline
    pub fn validate(self) -> Result<Self, LlmError> {
        if !(1..=5).contains(&self.score) {
            return Err(LlmError::OutOfRange(format!(
                "score {} outside [1,5]",
                self.score
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(LlmError::OutOfRange(format!(
                "confidence {} outside [0,1]",
                self.confidence
            )));
        }
        Ok(self)
    }
}

/// LLM scoring channel seam; workers hold `Arc<dyn LlmChannel>`
#[async_trait]
pub trait LlmChannel: Send + Sync {
    async fn evaluate(&self, chain: &str, segment: &Segment) -> Result<LlmVerdict, LlmError>;
}

/// System/user prompt pair for one persona chain
struct ChainPrompts {
    system: &'static str,
    user_template: &'static str,
}

/// Prompt chains for LLM-refined personas
fn chain_prompts(chain: &str) -> Option<ChainPrompts> {
    match chain {
        "genz" => Some(ChainPrompts {
            system: "You are a Gen Z content evaluator. You love humorous, exciting, \
                     and pop-culture-related content. You dislike boring, overly formal, \
                     or outdated references.",
            user_template: "Evaluate this audio segment from a Gen Z perspective:\n\n\
                            Text: \"{text}\"\nTopic: {topic}\nTone: {tone}\n\n\
                            Rate this segment on a scale of 1-5 (5 being best) and provide:\n\
                            1. score (1-5)\n\
                            2. opinion (brief reaction, use Gen Z slang if appropriate)\n\
                            3. rationale (why you gave this score)\n\
                            4. confidence (0.0-1.0, how confident you are in this rating)\n\n\
                            Respond ONLY with JSON:\n\
                            {\"score\": <number>, \"opinion\": \"<text>\", \"rationale\": \"<text>\", \"confidence\": <number>}",
        }),
        "advertiser" => Some(ChainPrompts {
            system: "You are a brand safety evaluator for advertisers. You favor \
                     commercial-friendly, positive, and non-controversial content. You \
                     penalize profanity, negativity, and controversial topics.",
            user_template: "Evaluate this audio segment from an advertiser/brand safety perspective:\n\n\
                            Text: \"{text}\"\nTopic: {topic}\nTone: {tone}\n\n\
                            Rate this segment on a scale of 1-5 (5 being brand-safe) and provide:\n\
                            1. score (1-5)\n\
                            2. opinion (brief assessment from advertiser perspective)\n\
                            3. rationale (why you gave this score)\n\
                            4. confidence (0.0-1.0, how confident you are in this rating)\n\n\
                            Respond ONLY with JSON:\n\
                            {\"score\": <number>, \"opinion\": \"<text>\", \"rationale\": \"<text>\", \"confidence\": <number>}",
        }),
        _ => None,
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    messages: Vec<ChatMessage>,
    temperature: f64,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Chat-completions client for the refinement channel (Azure-style endpoint)
pub struct LlmClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Build the client; `None` when the channel is not configured
    pub fn from_config(config: &LlmConfig) -> Option<Self> {
        let endpoint = config.endpoint.as_deref()?.trim();
        let api_key = config.api_key.as_deref()?.trim();
        if endpoint.is_empty() || api_key.is_empty() {
            return None;
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()
            .ok()?;

        Some(Self {
            client,
            config: config.clone(),
        })
    }

    fn completion_url(&self) -> String {
        let endpoint = self
            .config
            .endpoint
            .as_deref()
            .unwrap_or_default()
            .trim_end_matches('/');
        format!(
            "{}/openai/deployments/{}/chat/completions?api-version={}",
            endpoint, self.config.deployment, self.config.api_version
        )
    }
}

#[async_trait]
impl LlmChannel for LlmClient {
    async fn evaluate(&self, chain: &str, segment: &Segment) -> Result<LlmVerdict, LlmError> {
        let prompts =
            chain_prompts(chain).ok_or_else(|| LlmError::UnknownChain(chain.to_string()))?;

        let user_prompt = prompts
            .user_template
            .replace("{text}", &segment.text)
            .replace("{topic}", &segment.topic)
            .replace("{tone}", &segment.tone);

        let request = ChatRequest {
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: prompts.system.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt,
                },
            ],
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        };

        let response = self
            .client
            .post(self.completion_url())
            .header("api-key", self.config.api_key.as_deref().unwrap_or_default())
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LlmError::Timeout
                } else {
                    LlmError::Network(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            return Err(LlmError::Status(response.status().as_u16()));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Malformed(e.to_string()))?;

        let content = chat
            .choices
            .first()
            .map(|c| c.message.content.trim())
            .ok_or_else(|| LlmError::Malformed("empty choices".to_string()))?;

        let verdict: LlmVerdict = serde_json::from_str(content)
            .map_err(|e| LlmError::Malformed(format!("{}: {}", e, content)))?;

        verdict.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verdict_validation_rejects_out_of_range() {
        let bad_score = LlmVerdict {
            score: 7,
            opinion: String::new(),
            rationale: String::new(),
            confidence: 0.5,
        };
        assert!(matches!(bad_score.validate(), Err(LlmError::OutOfRange(_))));

        let bad_confidence = LlmVerdict {
            score: 3,
            opinion: String::new(),
            rationale: String::new(),
            confidence: 1.5,
        };
        assert!(matches!(
            bad_confidence.validate(),
            Err(LlmError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_verdict_schema_rejects_missing_fields() {
        // A field missing from the JSON payload fails deserialization
        // instead of defaulting.
        let result: Result<LlmVerdict, _> =
            serde_json::from_str(r#"{"score": 4, "opinion": "nice"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_known_chains_have_prompts() {
        assert!(chain_prompts("genz").is_some());
        assert!(chain_prompts("advertiser").is_some());
        assert!(chain_prompts("tradies").is_none());
    }

    #[test]
    fn test_client_disabled_without_key() {
        let config = LlmConfig {
            endpoint: Some("https://llm.test".to_string()),
            api_key: None,
            ..Default::default()
        };
        assert!(LlmClient::from_config(&config).is_none());
    }
}
