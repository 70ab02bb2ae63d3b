//! HTTP handlers for the claim API

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    Json,
};
use std::sync::Arc;
use tracing::info;

use crate::error::ApiError;
use crate::models::*;
use crate::state::AppState;

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let orchestrator = &state.orchestrator;
    let store = orchestrator.store();

    Json(HealthResponse {
        status: "ok".to_string(),
        passages: store.len(),
        dimension: store.dimension(),
        embedding_model_id: store.embedding_model_id().to_string(),
        classifier_model_id: orchestrator.classifier().model_id().to_string(),
    })
}

/// Claim search endpoint
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<Json<SearchResponse>, ApiError> {
    let Json(request) = payload.map_err(|e| ApiError::InvalidRequest(e.body_text()))?;
    info!("Claim search: {} chars, top_k={}", request.claim.len(), request.top_k);

    let results = state
        .orchestrator
        .search_claim(&request.claim, request.top_k)
        .await?;

    Ok(Json(SearchResponse {
        claim: request.claim,
        results,
    }))
}

/// Passage lookup by id
pub async fn get_passage(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<PassageResponse>, ApiError> {
    let id: u64 = id
        .parse()
        .map_err(|_| ApiError::InvalidRequest(format!("Invalid passage id: {}", id)))?;
    let passage = state.orchestrator.store().get(id)?;
    Ok(Json(PassageResponse::from(passage)))
}
