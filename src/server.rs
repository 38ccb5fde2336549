use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::auth::{API_KEY_HEADER, require_api_key};
use crate::config::{Args, Environment};
use crate::handlers::{generate_batch_handler, generate_handler, health_handler, metrics_handler};
use crate::state::AppState;

/// Builds the router: public health/metrics plus key-protected generation routes.
pub fn router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/api/generate", post(generate_handler))
        .route("/api/generate_batch", post(generate_batch_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(api_routes)
        .with_state(state)
}

// Any origin in development, only the configured ones in production
pub fn cors_layer(args: &Args) -> CorsLayer {
    match args.environment {
        Environment::Development => CorsLayer::permissive(),
        Environment::Production => {
            let origins: Vec<HeaderValue> = args
                .origins()
                .iter()
                .filter_map(|origin| match origin.parse() {
                    Ok(value) => Some(value),
                    Err(_) => {
                        warn!(origin = %origin, "ignoring invalid CORS origin");
                        None
                    }
                })
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([header::CONTENT_TYPE, header::HeaderName::from_static(API_KEY_HEADER)])
        }
    }
}
