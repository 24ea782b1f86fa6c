//! Evaluator registry listing handler

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::registry::EvaluatorDefinition;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EvaluatorsResponse {
    pub count: usize,
    pub evaluators: Vec<EvaluatorDefinition>,
}

/// GET /evaluators
pub async fn list_evaluators(State(state): State<AppState>) -> Json<EvaluatorsResponse> {
    let evaluators: Vec<EvaluatorDefinition> = state
        .registry
        .iter()
        .map(|e| e.definition().clone())
        .collect();

    Json(EvaluatorsResponse {
        count: evaluators.len(),
        evaluators,
    })
}

/// Build evaluator routes
pub fn evaluator_routes() -> Router<AppState> {
    Router::new().route("/evaluators", get(list_evaluators))
}
