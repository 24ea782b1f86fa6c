//! Aggregate statistics over evaluation records
//!
//! A pure reduction over whatever records currently exist for a fingerprint:
//! per evaluator with at least one record, the mean score over present
//! segments (missing segments excluded, not zero-filled), the 1..=5 histogram,
//! the mean confidence, and top/worst segment rankings. Cached under its own
//! TTL and safely recomputable on a miss.

use crate::models::{AggregateSummary, PersonaSummary};
use crate::registry::EvaluatorRegistry;
use crate::services::store::ResultStore;
use sonic_common::Result;
use std::collections::BTreeMap;

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Histogram over exactly {1,2,3,4,5}
pub fn score_distribution(scores: impl Iterator<Item = i64>) -> BTreeMap<String, usize> {
    let mut distribution: BTreeMap<String, usize> =
        (1..=5).map(|s| (s.to_string(), 0)).collect();
    for score in scores {
        if let Some(count) = distribution.get_mut(&score.to_string()) {
            *count += 1;
        }
    }
    distribution
}

/// Indices of the `n` highest scores; ties broken by ascending original index
pub fn top_n_segments(scored: &[(usize, i64)], n: usize) -> Vec<usize> {
    let mut ranked = scored.to_vec();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(idx, _)| idx).collect()
}

/// Indices of the `n` lowest scores; ties broken by ascending original index
pub fn worst_n_segments(scored: &[(usize, i64)], n: usize) -> Vec<usize> {
    let mut ranked = scored.to_vec();
    ranked.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    ranked.into_iter().take(n).map(|(idx, _)| idx).collect()
}

/// Reduce one evaluator's present records into a summary.
///
/// `scored` holds `(segment_index, score)` pairs, `confidences` the matching
/// confidence values. Returns `None` when no records are present.
///
/// Rankings are mean-relative: top candidates score at or above the mean,
/// worst candidates at or below it. A fully tied evaluator therefore lists
/// the same leading indices in both rankings, while a segment above the mean
/// never appears among the worst.
pub fn summarize(
    scored: &[(usize, i64)],
    confidences: &[f64],
    top_n: usize,
    worst_n: usize,
) -> Option<PersonaSummary> {
    if scored.is_empty() {
        return None;
    }

    let avg_score = scored.iter().map(|(_, s)| *s as f64).sum::<f64>() / scored.len() as f64;
    let avg_confidence = if confidences.is_empty() {
        0.0
    } else {
        confidences.iter().sum::<f64>() / confidences.len() as f64
    };

    let top_candidates: Vec<(usize, i64)> = scored
        .iter()
        .filter(|(_, s)| *s as f64 >= avg_score)
        .copied()
        .collect();
    let worst_candidates: Vec<(usize, i64)> = scored
        .iter()
        .filter(|(_, s)| *s as f64 <= avg_score)
        .copied()
        .collect();

    Some(PersonaSummary {
        avg_score: round2(avg_score),
        score_distribution: score_distribution(scored.iter().map(|(_, s)| *s)),
        avg_confidence: round2(avg_confidence),
        top_segments: top_n_segments(&top_candidates, top_n),
        worst_segments: worst_n_segments(&worst_candidates, worst_n),
    })
}

/// Builds and caches AggregateSummary values for fingerprints
pub struct SummaryAggregator {
    store: ResultStore,
    top_n: usize,
    worst_n: usize,
}

impl SummaryAggregator {
    pub fn new(store: ResultStore, top_n: usize, worst_n: usize) -> Self {
        Self {
            store,
            top_n,
            worst_n,
        }
    }

    /// Aggregate all evaluators' records for a fingerprint.
    ///
    /// Returns `Ok(None)` when the fingerprint has no stored segments (never
    /// processed or expired). Evaluators with zero records are silently
    /// excluded; zero segments yields an empty per-evaluator map.
    pub async fn build(
        &self,
        fingerprint: &str,
        registry: &EvaluatorRegistry,
    ) -> Result<Option<AggregateSummary>> {
        if let Some(cached) = self.store.get_summary(fingerprint).await? {
            tracing::debug!(fingerprint = %fingerprint, "Summary cache hit");
            return Ok(Some(cached));
        }

        let Some(segments) = self.store.get_segments(fingerprint).await? else {
            return Ok(None);
        };
        let segment_count = segments.len();

        let mut per_evaluator = BTreeMap::new();
        for evaluator in registry.iter() {
            let mut scored = Vec::new();
            let mut confidences = Vec::new();

            for index in 0..segment_count {
                if let Some(record) = self
                    .store
                    .get_record(evaluator.id(), fingerprint, index)
                    .await?
                {
                    scored.push((index, record.score));
                    confidences.push(record.confidence);
                }
            }

            if let Some(summary) = summarize(&scored, &confidences, self.top_n, self.worst_n) {
                per_evaluator.insert(evaluator.id().to_string(), summary);
            }
        }

        let summary = AggregateSummary {
            fingerprint: fingerprint.to_string(),
            segment_count,
            per_evaluator,
        };

        self.store.put_summary(&summary).await?;
        tracing::info!(
            fingerprint = %fingerprint,
            evaluators = summary.per_evaluator.len(),
            "Aggregate summary computed and cached"
        );
        Ok(Some(summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EvaluationRecord, ScoringChannel};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    fn scored(scores: &[i64]) -> Vec<(usize, i64)> {
        scores.iter().copied().enumerate().collect()
    }

    #[test]
    fn test_ranking_fixture() {
        let s = scored(&[2, 4, 3, 5, 1, 5, 3]);
        assert_eq!(top_n_segments(&s, 2), vec![3, 5]);
        assert_eq!(worst_n_segments(&s, 1), vec![4]);
    }

    #[test]
    fn test_full_tie_breaks_by_ascending_index() {
        let s = scored(&[3, 3, 3]);
        assert_eq!(top_n_segments(&s, 2), vec![0, 1]);
        assert_eq!(worst_n_segments(&s, 2), vec![0, 1]);
    }

    #[test]
    fn test_ranking_with_empty_input() {
        assert!(top_n_segments(&[], 3).is_empty());
        assert!(worst_n_segments(&[], 2).is_empty());
    }

    #[test]
    fn test_distribution_counts_each_bucket() {
        let distribution = score_distribution([4, 2, 5, 4].into_iter());
        assert_eq!(distribution["1"], 0);
        assert_eq!(distribution["2"], 1);
        assert_eq!(distribution["4"], 2);
        assert_eq!(distribution["5"], 1);
    }

    #[test]
    fn test_summarize_means_present_scores_only() {
        // Indices 0 and 2 scored; index 1 missing and excluded
        let summary = summarize(&[(0, 4), (2, 5)], &[0.8, 0.6], 3, 2).unwrap();
        assert_eq!(summary.avg_score, 4.5);
        assert_eq!(summary.avg_confidence, 0.7);
        // Mean-relative: only index 2 sits at or above the 4.5 mean
        assert_eq!(summary.top_segments, vec![2]);
        assert_eq!(summary.worst_segments, vec![0]);
    }

    #[test]
    fn test_summarize_mean_relative_rankings() {
        // [4, 2, 5]: mean 3.67, so index 1 is the only worst candidate
        let summary = summarize(&[(0, 4), (1, 2), (2, 5)], &[0.8, 0.8, 0.8], 2, 2).unwrap();
        assert_eq!(summary.avg_score, 3.67);
        assert_eq!(summary.top_segments, vec![2, 0]);
        assert_eq!(summary.worst_segments, vec![1]);

        // Fully tied: every segment is both a top and a worst candidate
        let tied = summarize(&[(0, 3), (1, 3), (2, 3)], &[0.5, 0.5, 0.5], 2, 2).unwrap();
        assert_eq!(tied.avg_score, 3.0);
        assert_eq!(tied.top_segments, vec![0, 1]);
        assert_eq!(tied.worst_segments, vec![0, 1]);
    }

    #[test]
    fn test_summarize_empty_is_none() {
        assert!(summarize(&[], &[], 3, 2).is_none());
    }

    async fn test_store() -> ResultStore {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        crate::db::init_tables(&pool).await.unwrap();
        ResultStore::new(pool, Duration::from_secs(60), Duration::from_secs(60))
    }

    fn record(evaluator: &str, fingerprint: &str, index: usize, score: i64) -> EvaluationRecord {
        EvaluationRecord {
            evaluator_id: evaluator.to_string(),
            fingerprint: fingerprint.to_string(),
            segment_index: index,
            score,
            confidence: 0.8,
            opinion: String::new(),
            rationale: String::new(),
            note: String::new(),
            channel: ScoringChannel::Rule,
            created_at: chrono::Utc::now(),
        }
    }

    fn segments(n: usize) -> Vec<crate::models::Segment> {
        (0..n)
            .map(|i| crate::models::Segment {
                index: i,
                start: 0.0,
                end: 15.0,
                text: String::new(),
                topic: "Health".to_string(),
                tone: "Neutral".to_string(),
                tags: vec![],
            })
            .collect()
    }

    #[tokio::test]
    async fn test_unknown_fingerprint_is_none() {
        let aggregator = SummaryAggregator::new(test_store().await, 3, 2);
        let registry = EvaluatorRegistry::builtin();
        assert!(aggregator.build("nope", &registry).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evaluators_without_records_are_excluded() {
        let store = test_store().await;
        store.put_segments("fp", &segments(2)).await.unwrap();
        store.put_record(&record("genz", "fp", 0, 4)).await.unwrap();
        store.put_record(&record("genz", "fp", 1, 2)).await.unwrap();

        let aggregator = SummaryAggregator::new(store, 3, 2);
        let registry = EvaluatorRegistry::builtin();
        let summary = aggregator.build("fp", &registry).await.unwrap().unwrap();

        // Only genz has records; the other four registered personas are absent
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.per_evaluator.len(), 1);
        assert!(summary.per_evaluator.contains_key("genz"));
        assert_eq!(summary.per_evaluator["genz"].avg_score, 3.0);
    }

    #[tokio::test]
    async fn test_zero_segments_is_empty_map_not_error() {
        let store = test_store().await;
        store.put_segments("fp", &[]).await.unwrap();

        let aggregator = SummaryAggregator::new(store, 3, 2);
        let summary = aggregator
            .build("fp", &EvaluatorRegistry::builtin())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.segment_count, 0);
        assert!(summary.per_evaluator.is_empty());
    }

    #[tokio::test]
    async fn test_summary_is_cached() {
        let store = test_store().await;
        store.put_segments("fp", &segments(1)).await.unwrap();
        store.put_record(&record("genz", "fp", 0, 5)).await.unwrap();

        let aggregator = SummaryAggregator::new(store.clone(), 3, 2);
        let registry = EvaluatorRegistry::builtin();
        aggregator.build("fp", &registry).await.unwrap().unwrap();

        // New records do not change the cached aggregate until it expires
        store.put_record(&record("advertiser", "fp", 0, 1)).await.unwrap();
        let cached = aggregator.build("fp", &registry).await.unwrap().unwrap();
        assert_eq!(cached.per_evaluator.len(), 1);
    }
}
