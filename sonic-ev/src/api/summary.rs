//! Aggregate summary handler

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::error::{ApiError, ApiResult};
use crate::models::AggregateSummary;
use crate::services::aggregator::SummaryAggregator;
use crate::AppState;

/// GET /summary/:fingerprint
///
/// Returns the per-evaluator statistical summary, computing and caching it
/// on demand. 404 when the fingerprint was never ingested. Evaluators whose
/// records have all expired are absent from the response; callers poll.
pub async fn get_summary(
    State(state): State<AppState>,
    Path(fp): Path<String>,
) -> ApiResult<Json<AggregateSummary>> {
    let aggregator = SummaryAggregator::new(
        state.store.clone(),
        state.top_segment_count,
        state.worst_segment_count,
    );

    let summary = aggregator
        .build(&fp, &state.registry)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("No ingested audio for {}", fp)))?;

    Ok(Json(summary))
}

/// Build summary routes
pub fn summary_routes() -> Router<AppState> {
    Router::new().route("/summary/:fingerprint", get(get_summary))
}
