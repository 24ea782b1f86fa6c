//! Per-job status polling handler

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::models::JobStatus;
use crate::AppState;

/// GET /jobs/:job_id
///
/// Poll-per-job path; there is no joint completion barrier across
/// evaluators, callers poll each handle independently.
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatus>> {
    let status = state
        .tracker
        .get(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Unknown job: {}", job_id)))?;

    Ok(Json(status))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new().route("/jobs/:job_id", get(get_job))
}
