use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use std::sync::Arc;
use std::time::Instant;

use crate::error::ApiError;
use crate::metrics::{REQUEST_LATENCY, REQUEST_TOTAL};
use crate::models::{BatchGenerateRequest, BatchGenerateResponse, GenerateRequest, GenerateResponse};
use crate::state::AppState;

pub async fn generate_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> Result<Json<GenerateResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::Validation)?;

    let start_time = Instant::now();
    let response = state.orchestrator.generate(&payload).await?;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(response))
}

pub async fn generate_batch_handler(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchGenerateRequest>, JsonRejection>,
) -> Result<Json<BatchGenerateResponse>, ApiError> {
    REQUEST_TOTAL.inc();
    let Json(payload) = payload?;
    payload.validate().map_err(ApiError::Validation)?;

    let start_time = Instant::now();
    let response = state.orchestrator.generate_batch(&payload).await?;
    REQUEST_LATENCY.observe(start_time.elapsed().as_secs_f64());

    Ok(Json(response))
}
