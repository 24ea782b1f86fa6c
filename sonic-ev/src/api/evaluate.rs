//! Evaluation submission handlers
//!
//! POST /evaluate accepts a raw audio payload, fingerprints it, and runs the
//! ingestion pipeline followed by one job per registered evaluator. A payload
//! whose fingerprint already has stored segments short-circuits without
//! re-transcribing. POST /re-evaluate/:fingerprint re-dispatches evaluator
//! jobs over already-ingested segments.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::models::JobHandle;
use crate::services::fingerprint::{fingerprint, is_audio_payload};
use crate::services::store::summary_key;
use crate::AppState;
use sonic_common::events::SonicEvent;

#[derive(Debug, Deserialize)]
pub struct EvaluateQuery {
    pub filename: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EvaluateResponse {
    pub fingerprint: String,
    /// "processing" or "already_processed"
    pub status: String,
    pub segment_count: usize,
    pub job_handles: HashMap<String, JobHandle>,
}

/// POST /re-evaluate/:fingerprint request; empty body means all evaluators
#[derive(Debug, Default, Deserialize)]
pub struct ReEvaluateRequest {
    #[serde(default)]
    pub evaluator_ids: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ReEvaluateResponse {
    pub fingerprint: String,
    pub status: String,
    pub job_handles: HashMap<String, JobHandle>,
}

/// POST /evaluate
///
/// Returns 202 Accepted with the fingerprint and one job handle per
/// evaluator. Rejects empty or non-audio payloads with 400 before any
/// pipeline work starts.
pub async fn evaluate(
    State(state): State<AppState>,
    Query(query): Query<EvaluateQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<EvaluateResponse>)> {
    if body.is_empty() {
        return Err(ApiError::BadRequest("Empty request body".to_string()));
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    if !is_audio_payload(content_type, &body) {
        return Err(ApiError::BadRequest(
            "Payload is not recognized as audio".to_string(),
        ));
    }

    let fp = fingerprint(&body).await?;

    if let Some(filename) = query.filename.as_deref() {
        state.store.put_filename(&fp, filename).await?;
    }

    // Fingerprint gate: a payload whose segments are already stored skips
    // transcription, classification, and dispatch entirely.
    if let Some(segments) = state.store.get_segments(&fp).await? {
        tracing::info!(fingerprint = %fp, "Duplicate payload, skipping ingestion");
        return Ok((
            StatusCode::OK,
            Json(EvaluateResponse {
                fingerprint: fp,
                status: "already_processed".to_string(),
                segment_count: segments.len(),
                job_handles: HashMap::new(),
            }),
        ));
    }

    state.event_bus.emit_lossy(SonicEvent::IngestStarted {
        fingerprint: fp.clone(),
        byte_count: body.len(),
        timestamp: Utc::now(),
    });

    let segments = state.ingest.run(&fp, &body).await.map_err(|e| {
        tracing::error!(fingerprint = %fp, error = %e, "Ingestion failed");
        e
    })?;
    let segment_count = segments.len();

    let job_handles = state
        .dispatcher()
        .dispatch(&fp, Arc::new(segments), &state.registry)
        .await;

    state.event_bus.emit_lossy(SonicEvent::IngestCompleted {
        fingerprint: fp.clone(),
        segment_count,
        jobs_dispatched: job_handles.len(),
        timestamp: Utc::now(),
    });

    tracing::info!(
        fingerprint = %fp,
        segments = segment_count,
        jobs = job_handles.len(),
        "Evaluation accepted"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(EvaluateResponse {
            fingerprint: fp,
            status: "processing".to_string(),
            segment_count,
            job_handles,
        }),
    ))
}

/// POST /re-evaluate/:fingerprint
///
/// Re-dispatches evaluator jobs over already-ingested segments. 404 for an
/// unknown fingerprint; 400 when none of the requested evaluator ids is
/// registered. The cached aggregate summary is invalidated so the next
/// summary read reflects the new records.
pub async fn re_evaluate(
    State(state): State<AppState>,
    Path(fp): Path<String>,
    body: Option<Json<ReEvaluateRequest>>,
) -> ApiResult<(StatusCode, Json<ReEvaluateResponse>)> {
    let segments = state
        .store
        .get_segments(&fp)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No ingested audio for {}", fp)))?;

    let request = body.map(|Json(r)| r).unwrap_or_default();
    let registry = if request.evaluator_ids.is_empty() {
        (*state.registry).clone()
    } else {
        let subset = state.registry.subset(&request.evaluator_ids);
        if subset.is_empty() {
            return Err(ApiError::BadRequest(format!(
                "No registered evaluator among: {}",
                request.evaluator_ids.join(", ")
            )));
        }
        subset
    };

    state.store.delete(&summary_key(&fp)).await?;

    let job_handles = state
        .dispatcher()
        .dispatch(&fp, Arc::new(segments), &registry)
        .await;

    tracing::info!(
        fingerprint = %fp,
        jobs = job_handles.len(),
        "Re-evaluation dispatched"
    );

    Ok((
        StatusCode::ACCEPTED,
        Json(ReEvaluateResponse {
            fingerprint: fp,
            status: "processing".to_string(),
            job_handles,
        }),
    ))
}

/// Build evaluation routes
pub fn evaluate_routes() -> Router<AppState> {
    Router::new()
        .route("/evaluate", post(evaluate))
        .route("/re-evaluate/:fingerprint", post(re_evaluate))
}
