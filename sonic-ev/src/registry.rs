//! Evaluator registry
//!
//! Evaluators are a polymorphic capability: the dispatcher and aggregator only
//! see `Arc<dyn Evaluator>`, so new personas register an implementation plus
//! metadata with no change to pipeline code.

use crate::models::{EvaluationRecord, ScoringChannel, Segment};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Preference profile driving the rule-based scoring baseline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreferenceProfile {
    /// Tones that earn +1 (matched case-insensitively)
    #[serde(default)]
    pub preferred_tones: Vec<String>,
    /// Topics that earn +1
    #[serde(default)]
    pub preferred_topics: Vec<String>,
    /// Tags that cost -2 each
    #[serde(default)]
    pub disliked_tags: Vec<String>,
    /// Tones that cost -2
    #[serde(default)]
    pub disliked_tones: Vec<String>,
}

/// Static metadata for one registered evaluator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluatorDefinition {
    /// Used in result store keys and job tracking
    pub id: String,
    /// Shown in the dashboard
    pub display_name: String,
    pub description: String,
    pub profile: PreferenceProfile,
    /// Prompt chain name; absent means rule-based scoring only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llm_chain: Option<String>,
}

/// A scoring unit: preference profile plus optional LLM refinement channel
///
/// `evaluate` must always produce a record with score in [1,5] and confidence
/// in [0,1]; it is the rule-based baseline the worker falls back to when the
/// LLM channel fails.
pub trait Evaluator: Send + Sync {
    fn definition(&self) -> &EvaluatorDefinition;

    fn id(&self) -> &str {
        &self.definition().id
    }

    fn llm_chain(&self) -> Option<&str> {
        self.definition().llm_chain.as_deref()
    }

    /// Rule-based baseline verdict for one segment
    fn evaluate(&self, fingerprint: &str, segment: &Segment) -> EvaluationRecord;
}

/// Profile-driven evaluator: the standard persona implementation
pub struct PersonaEvaluator {
    definition: EvaluatorDefinition,
}

impl PersonaEvaluator {
    pub fn new(definition: EvaluatorDefinition) -> Self {
        Self { definition }
    }

    /// Rule baseline: start neutral (3), +1 per matched preferred tone/topic,
    /// -2 per matched disliked tag, -2 for a disliked tone, clamp to [1,5].
    fn rule_score(&self, segment: &Segment) -> i64 {
        let profile = &self.definition.profile;
        let tone = segment.tone.to_lowercase();
        let topic = segment.topic.to_lowercase();

        let mut score: i64 = 3;
        if profile.preferred_tones.iter().any(|t| t.eq_ignore_ascii_case(&tone)) {
            score += 1;
        }
        if profile.preferred_topics.iter().any(|t| t.eq_ignore_ascii_case(&topic)) {
            score += 1;
        }
        if profile.disliked_tones.iter().any(|t| t.eq_ignore_ascii_case(&tone)) {
            score -= 2;
        }
        for tag in &segment.tags {
            if profile.disliked_tags.iter().any(|t| t.eq_ignore_ascii_case(tag)) {
                score -= 2;
            }
        }
        score.clamp(1, 5)
    }

    /// Rule-channel confidence grows with distance from neutral
    fn estimate_confidence(score: i64) -> f64 {
        let raw = 0.5 + ((score - 3).abs() as f64) / 4.0;
        (raw * 100.0).round() / 100.0
    }

    fn opinion(&self, score: i64, segment: &Segment) -> String {
        if score >= 4 {
            format!(
                "Engaging and well-targeted segment on {} with a {} tone.",
                segment.topic, segment.tone
            )
        } else if score == 3 {
            format!(
                "Acceptable segment on {}, but could be more engaging.",
                segment.topic
            )
        } else {
            format!(
                "Segment on {} felt misaligned with expected tone ({}).",
                segment.topic, segment.tone
            )
        }
    }

    fn rationale(&self, score: i64, segment: &Segment) -> String {
        format!(
            "Rated {} because the segment was '{}', covered the topic '{}', \
             and was matched against the {} preference profile.",
            score, segment.tone, segment.topic, self.definition.display_name
        )
    }

    fn note(&self, segment: &Segment) -> String {
        if segment.tags.iter().any(|t| t == "repetition") {
            "Repeated theme from previous segment.".to_string()
        } else if segment.tags.iter().any(|t| t == "profanity") {
            "Contains potentially offensive language.".to_string()
        } else {
            String::new()
        }
    }
}

impl Evaluator for PersonaEvaluator {
    fn definition(&self) -> &EvaluatorDefinition {
        &self.definition
    }

    fn evaluate(&self, fingerprint: &str, segment: &Segment) -> EvaluationRecord {
        let score = self.rule_score(segment);
        EvaluationRecord {
            evaluator_id: self.definition.id.clone(),
            fingerprint: fingerprint.to_string(),
            segment_index: segment.index,
            score,
            confidence: Self::estimate_confidence(score),
            opinion: self.opinion(score, segment),
            rationale: self.rationale(score, segment),
            note: self.note(segment),
            channel: ScoringChannel::Rule,
            created_at: Utc::now(),
        }
    }
}

/// Read-only set of registered evaluators during pipeline execution
#[derive(Clone)]
pub struct EvaluatorRegistry {
    evaluators: Vec<Arc<dyn Evaluator>>,
}

impl EvaluatorRegistry {
    pub fn new(evaluators: Vec<Arc<dyn Evaluator>>) -> Self {
        Self { evaluators }
    }

    pub fn empty() -> Self {
        Self { evaluators: Vec::new() }
    }

    /// The built-in persona set
    pub fn builtin() -> Self {
        Self::new(
            builtin_definitions()
                .into_iter()
                .map(|d| Arc::new(PersonaEvaluator::new(d)) as Arc<dyn Evaluator>)
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Evaluator>> {
        self.evaluators.iter()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn Evaluator>> {
        self.evaluators.iter().find(|e| e.id() == id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.evaluators.iter().map(|e| e.id().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.evaluators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.evaluators.is_empty()
    }

    /// Registry restricted to the requested ids; unknown ids are dropped
    pub fn subset(&self, ids: &[String]) -> Self {
        Self::new(
            self.evaluators
                .iter()
                .filter(|e| ids.iter().any(|id| id == e.id()))
                .cloned()
                .collect(),
        )
    }
}

fn profile(
    preferred_tones: &[&str],
    preferred_topics: &[&str],
    disliked_tags: &[&str],
    disliked_tones: &[&str],
) -> PreferenceProfile {
    let own = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
    PreferenceProfile {
        preferred_tones: own(preferred_tones),
        preferred_topics: own(preferred_topics),
        disliked_tags: own(disliked_tags),
        disliked_tones: own(disliked_tones),
    }
}

/// Built-in persona definitions
///
/// To add a persona: add a definition here (and a prompt chain in the LLM
/// client if it should use the refinement channel). Dispatcher and aggregator
/// pick it up automatically.
pub fn builtin_definitions() -> Vec<EvaluatorDefinition> {
    vec![
        EvaluatorDefinition {
            id: "genz".to_string(),
            display_name: "Gen Z".to_string(),
            description: "Gen Z listener aged 18-25 who values authenticity, humor, and cultural relevance".to_string(),
            profile: profile(
                &["humorous", "excited", "casual"],
                &["entertainment", "technology", "lifestyle", "food"],
                &["repetition", "formal"],
                &["formal", "academic"],
            ),
            llm_chain: Some("genz".to_string()),
        },
        EvaluatorDefinition {
            id: "advertiser".to_string(),
            display_name: "Advertiser".to_string(),
            description: "Commercial sponsor evaluating content for brand safety and engagement potential".to_string(),
            profile: profile(
                &["excited", "informative", "positive"],
                &["technology", "food", "lifestyle", "health", "entertainment"],
                &["profanity", "controversial", "negative"],
                &["controversial", "negative", "depressing"],
            ),
            llm_chain: Some("advertiser".to_string()),
        },
        EvaluatorDefinition {
            id: "business_owner".to_string(),
            display_name: "Business Owner".to_string(),
            description: "Small business owner listening for practical, credible content".to_string(),
            profile: profile(
                &["informative", "neutral"],
                &["technology", "politics", "education"],
                &["profanity"],
                &[],
            ),
            llm_chain: None,
        },
        EvaluatorDefinition {
            id: "stay_at_home_mum".to_string(),
            display_name: "Stay At Home Mum".to_string(),
            description: "Stay-at-home parent listening during the day with kids around".to_string(),
            profile: profile(
                &["informative", "humorous"],
                &["food", "health", "education"],
                &["profanity", "controversial"],
                &["controversial"],
            ),
            llm_chain: None,
        },
        EvaluatorDefinition {
            id: "tradies".to_string(),
            display_name: "Tradies".to_string(),
            description: "Tradespeople listening on the job site".to_string(),
            profile: profile(
                &["humorous", "casual"],
                &["entertainment", "food"],
                &["formal"],
                &["formal"],
            ),
            llm_chain: None,
        },
    ]
}
