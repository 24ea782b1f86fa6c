//! End-to-end pipeline tests: ingest, dispatch, poll, aggregate

mod support;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::util::ServiceExt;

use sonic_ev::models::{EvaluationRecord, Segment};
use sonic_ev::registry::{Evaluator, EvaluatorDefinition, EvaluatorRegistry};
use support::{test_state, FixedEvaluator, ScriptedClassifier, ScriptedTranscriber};

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Poll a job handle until it reaches the `completed` state.
async fn wait_for_completion(app: &Router, job_id: &str) {
    for _ in 0..500 {
        let (status, json) = get_json(app, &format!("/jobs/{}", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        match json["state"].as_str() {
            Some("completed") => return,
            Some("failed") => panic!("job {} failed: {}", job_id, json),
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("job {} did not complete in time", job_id);
}

/// Poll a job handle until it reaches the `failed` state.
async fn wait_for_failure(app: &Router, job_id: &str) -> serde_json::Value {
    for _ in 0..500 {
        let (status, json) = get_json(app, &format!("/jobs/{}", job_id)).await;
        assert_eq!(status, StatusCode::OK);
        match json["state"].as_str() {
            Some("failed") => return json,
            Some("completed") => panic!("job {} completed instead of failing", job_id),
            _ => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    panic!("job {} never reached a terminal state", job_id);
}

/// Two fixed evaluators over a three-segment transcript.
async fn fixture_app() -> Router {
    let registry = EvaluatorRegistry::new(vec![
        Arc::new(FixedEvaluator::new("a", vec![4, 2, 5])),
        Arc::new(FixedEvaluator::new("b", vec![3, 3, 3])),
    ]);
    let state = test_state(
        Arc::new(ScriptedTranscriber {
            texts: vec!["tech intro", "food review", "tech outro"],
        }),
        Arc::new(ScriptedClassifier),
        registry,
        2,
        2,
    )
    .await;
    sonic_ev::build_router(state)
}

async fn submit(app: &Router, payload: &'static [u8]) -> serde_json::Value {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/evaluate")
                .header("content-type", "audio/wav")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    body_json(response).await
}

#[tokio::test]
async fn test_end_to_end_summary_fixture() {
    let app = fixture_app().await;

    let accepted = submit(&app, b"fixture audio").await;
    let fp = accepted["fingerprint"].as_str().unwrap().to_string();
    let handles = accepted["job_handles"].as_object().unwrap().clone();
    assert_eq!(handles.len(), 2);

    for handle in handles.values() {
        wait_for_completion(&app, handle["job_id"].as_str().unwrap()).await;
    }

    let (status, summary) = get_json(&app, &format!("/summary/{}", fp)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["segment_count"], 3);

    let a = &summary["per_evaluator"]["a"];
    assert_eq!(a["avg_score"], 3.67);
    assert_eq!(a["score_distribution"]["2"], 1);
    assert_eq!(a["score_distribution"]["4"], 1);
    assert_eq!(a["score_distribution"]["5"], 1);
    assert_eq!(a["top_segments"], serde_json::json!([2, 0]));
    assert_eq!(a["worst_segments"], serde_json::json!([1]));

    let b = &summary["per_evaluator"]["b"];
    assert_eq!(b["avg_score"], 3.0);
    assert_eq!(b["score_distribution"]["3"], 3);
    // Fully tied scores rank by ascending index in both directions
    assert_eq!(b["top_segments"], serde_json::json!([0, 1]));
    assert_eq!(b["worst_segments"], serde_json::json!([0, 1]));
}

#[tokio::test]
async fn test_enriched_segments_carry_all_evaluations() {
    let app = fixture_app().await;

    let accepted = submit(&app, b"enrichment audio").await;
    let fp = accepted["fingerprint"].as_str().unwrap().to_string();

    for handle in accepted["job_handles"].as_object().unwrap().values() {
        wait_for_completion(&app, handle["job_id"].as_str().unwrap()).await;
    }

    let (status, json) = get_json(&app, &format!("/segments/{}", fp)).await;
    assert_eq!(status, StatusCode::OK);

    let segments = json["segments"].as_array().unwrap();
    assert_eq!(segments.len(), 3);
    for (index, segment) in segments.iter().enumerate() {
        let evaluations = segment["evaluations"].as_object().unwrap();
        assert_eq!(evaluations.len(), 2, "segment {} missing evaluations", index);
        assert_eq!(evaluations["a"]["segment_index"], index);
        assert_eq!(evaluations["b"]["channel"], "rule");
    }
    // Scripted scores come through unchanged
    assert_eq!(segments[1]["evaluations"]["a"]["score"], 2);
}

/// Evaluator double that panics on every segment it is asked to score
struct PanickingEvaluator {
    definition: EvaluatorDefinition,
}

impl PanickingEvaluator {
    fn new() -> Self {
        Self {
            definition: EvaluatorDefinition {
                id: "panicky".to_string(),
                display_name: "Panicky".to_string(),
                description: "always panics mid-run".to_string(),
                profile: Default::default(),
                llm_chain: None,
            },
        }
    }
}

impl Evaluator for PanickingEvaluator {
    fn definition(&self) -> &EvaluatorDefinition {
        &self.definition
    }

    fn evaluate(&self, _fingerprint: &str, segment: &Segment) -> EvaluationRecord {
        panic!("scoring segment {} blew up", segment.index);
    }
}

#[tokio::test]
async fn test_failing_evaluator_does_not_poison_others() {
    let registry = EvaluatorRegistry::new(vec![
        Arc::new(FixedEvaluator::new("healthy", vec![4, 4, 4])),
        Arc::new(PanickingEvaluator::new()),
    ]);
    let state = test_state(
        Arc::new(ScriptedTranscriber {
            texts: vec!["one", "two", "three"],
        }),
        Arc::new(ScriptedClassifier),
        registry,
        2,
        2,
    )
    .await;
    let app = sonic_ev::build_router(state);

    let accepted = submit(&app, b"isolation audio").await;
    let fp = accepted["fingerprint"].as_str().unwrap().to_string();
    let handles = accepted["job_handles"].as_object().unwrap().clone();
    assert_eq!(handles.len(), 2);

    wait_for_completion(&app, handles["healthy"]["job_id"].as_str().unwrap()).await;

    // The panicked job terminates as failed instead of running forever
    let failed = wait_for_failure(&app, handles["panicky"]["job_id"].as_str().unwrap()).await;
    assert_eq!(failed["error"], "evaluator task panicked");

    // The healthy evaluator's results are complete and aggregable; the
    // panicked one simply never contributes records
    let (status, summary) = get_json(&app, &format!("/summary/{}", fp)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(summary["per_evaluator"]["healthy"].is_object());
    assert!(summary["per_evaluator"].get("panicky").is_none());
    assert_eq!(summary["per_evaluator"]["healthy"]["avg_score"], 4.0);
}

#[tokio::test]
async fn test_re_evaluation_refreshes_summary() {
    let app = fixture_app().await;

    let accepted = submit(&app, b"refresh audio").await;
    let fp = accepted["fingerprint"].as_str().unwrap().to_string();
    for handle in accepted["job_handles"].as_object().unwrap().values() {
        wait_for_completion(&app, handle["job_id"].as_str().unwrap()).await;
    }

    // Prime the cached summary
    let (status, first) = get_json(&app, &format!("/summary/{}", fp)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["per_evaluator"].as_object().unwrap().len(), 2);

    // Re-dispatch; the cached summary is invalidated and rebuilt on read
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/re-evaluate/{}", fp))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let redispatched = body_json(response).await;
    for handle in redispatched["job_handles"].as_object().unwrap().values() {
        wait_for_completion(&app, handle["job_id"].as_str().unwrap()).await;
    }

    let (status, second) = get_json(&app, &format!("/summary/{}", fp)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["per_evaluator"]["a"]["avg_score"], 3.67);
}
