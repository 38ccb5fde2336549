use axum::{Json, extract::State, response::IntoResponse};
use std::sync::Arc;

use crate::state::AppState;

// health handler
pub async fn health_handler(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let backend = state.orchestrator.backend();
    let model_status = if backend.is_ready() { "ok" } else { "unavailable" };

    let store_alive = match &state.store {
        Some(store) => store.ping().await,
        None => false,
    };
    let store_status = if store_alive { "ok" } else { "disconnected" };
    let cache_status = if state.orchestrator.cache().has_store() { "ok" } else { "no cache" };
    let api_key_status = if state.api_key_is_default() { "default" } else { "configured" };

    Json(serde_json::json!({
        "status": "ok",
        "model": backend.model(),
        "model_status": model_status,
        "store_status": store_status,
        "cache_status": cache_status,
        "api_key_status": api_key_status,
        "environment": state.environment,
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}
