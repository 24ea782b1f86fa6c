//! Enriched segment listing handler

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use serde::Serialize;

use crate::error::{ApiError, ApiResult};
use crate::models::EnrichedSegment;
use crate::services::enrichment::Enricher;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct SegmentsResponse {
    pub fingerprint: String,
    pub segment_count: usize,
    pub segments: Vec<EnrichedSegment>,
}

/// GET /segments/:fingerprint
///
/// Returns the classified segments joined with whatever evaluation records
/// are currently stored. Evaluations still in flight simply do not appear
/// yet; 404 only when the fingerprint was never ingested.
pub async fn get_segments(
    State(state): State<AppState>,
    Path(fp): Path<String>,
) -> ApiResult<Json<SegmentsResponse>> {
    let enricher = Enricher::new(state.store.clone());

    let segments = enricher
        .enrich(&fp, &state.registry)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No ingested audio for {}", fp)))?;

    Ok(Json(SegmentsResponse {
        fingerprint: fp,
        segment_count: segments.len(),
        segments,
    }))
}

/// Build segment routes
pub fn segment_routes() -> Router<AppState> {
    Router::new().route("/segments/:fingerprint", get(get_segments))
}
