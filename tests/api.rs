use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tower::ServiceExt;

use textgen_gateway::backend::Backend;
use textgen_gateway::cache::ResultCache;
use textgen_gateway::error::BackendError;
use textgen_gateway::history::HistoryStore;
use textgen_gateway::orchestrator::{Orchestrator, UNAVAILABLE_OUTPUT};
use textgen_gateway::server::router;
use textgen_gateway::state::AppState;
use textgen_gateway::store::{MemoryStore, SharedStore};

const API_KEY: &str = "test-key";

struct StubBackend {
    calls: AtomicUsize,
    available: bool,
}

#[async_trait]
impl Backend for StubBackend {
    async fn generate(&self, prompts: &[String], _max_length: u32) -> Result<Vec<String>, BackendError> {
        if !self.available {
            return Err(BackendError::Unavailable);
        }
        Ok(prompts
            .iter()
            .map(|_| format!("Response {}", self.calls.fetch_add(1, Ordering::SeqCst) + 1))
            .collect())
    }

    fn is_ready(&self) -> bool {
        self.available
    }

    fn model(&self) -> &str {
        "stub"
    }
}

struct TestApp {
    router: Router,
    backend: Arc<StubBackend>,
    store: Arc<MemoryStore>,
}

fn app(available: bool) -> TestApp {
    let backend = Arc::new(StubBackend {
        calls: AtomicUsize::new(0),
        available,
    });
    let store = Arc::new(MemoryStore::new());
    let shared: Arc<dyn SharedStore> = store.clone();

    let orchestrator = Orchestrator::new(
        backend.clone(),
        ResultCache::new(Some(shared.clone()), 100, Duration::from_secs(600)),
        HistoryStore::new(Some(shared.clone())),
    );
    let state = Arc::new(AppState {
        orchestrator,
        store: Some(shared),
        api_key: API_KEY.to_string(),
        environment: "development".to_string(),
    });

    TestApp {
        router: router(state),
        backend,
        store,
    }
}

fn post(uri: &str, body: Value, api_key: Option<&str>) -> Request<Body> {
    post_raw(uri, &body.to_string(), api_key)
}

fn post_raw(uri: &str, body: &str, api_key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(key) = api_key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

#[tokio::test]
async fn missing_or_wrong_api_key_is_unauthorized() {
    let app = app(true);

    let (status, body) = send(&app.router, post("/api/generate", json!({"prompt": "Hi"}), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "invalid API key");

    let (status, _) = send(
        &app.router,
        post("/api/generate_batch", json!({"prompts": ["Hi"]}), Some("wrong")),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn valid_request_returns_generated_output() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post("/api/generate", json!({"prompt": "Hello, world!"}), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["input"], "Hello, world!");
    assert_eq!(body["output"], "Response 1");
    assert_eq!(body["history"], json!([]));
}

#[tokio::test]
async fn invalid_mode_names_every_valid_mode() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post("/api/generate", json!({"prompt": "Test", "mode": "invalid_mode"}), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let error = body["error"].as_str().unwrap();
    for mode in ["general", "recommendation", "support", "ecommerce"] {
        assert!(error.contains(mode), "{error}");
    }
}

#[tokio::test]
async fn out_of_range_max_length_is_unprocessable() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post("/api/generate", json!({"prompt": "Test", "max_length": 5}), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["detail"][0]["loc"], json!(["max_length"]));
}

#[tokio::test]
async fn malformed_batch_body_is_unprocessable() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post("/api/generate_batch", json!({"prompts": "not a list"}), Some(API_KEY)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn truncated_json_body_is_unprocessable() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post_raw("/api/generate", r#"{"prompt": "#, Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let error = body["error"].as_str().unwrap();
    assert!(error.starts_with("invalid request body"), "{error}");
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn repeated_request_is_served_from_shared_cache() {
    let app = app(true);
    let request = || post("/api/generate", json!({"prompt": "Test", "mode": "general"}), Some(API_KEY));

    let (_, first) = send(&app.router, request()).await;
    let (_, second) = send(&app.router, request()).await;

    assert_eq!(first["output"], second["output"]);
    assert_eq!(app.backend.calls.load(Ordering::SeqCst), 1);
    assert!(app.store.get("cache:Test:general:100").await.unwrap().is_some());
}

#[tokio::test]
async fn user_history_is_returned_and_persisted() {
    let app = app(true);
    app.store
        .set("test-user", json!(["User: Hello."]).to_string().as_bytes())
        .await
        .unwrap();

    let (status, body) = send(
        &app.router,
        post("/api/generate", json!({"prompt": "How are you?", "user_id": "test-user"}), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let expected = json!(["User: Hello.", "User: How are you?", "AI: Response 1"]);
    assert_eq!(body["history"], expected);

    let stored: Value = serde_json::from_slice(&app.store.get("test-user").await.unwrap().unwrap()).unwrap();
    assert_eq!(stored, expected);
}

#[tokio::test]
async fn batch_returns_outputs_in_order() {
    let app = app(true);
    let (status, body) = send(
        &app.router,
        post(
            "/api/generate_batch",
            json!({"prompts": ["Prompt 1", "Prompt 2"], "user_id": "u1"}),
            Some(API_KEY),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inputs"], json!(["Prompt 1", "Prompt 2"]));
    assert_eq!(body["outputs"], json!(["Response 1", "Response 2"]));
    assert_eq!(
        body["history"],
        json!(["User: Prompt 1", "User: Prompt 2", "AI: Response 1", "AI: Response 2"])
    );
}

#[tokio::test]
async fn unavailable_backend_still_succeeds() {
    let app = app(false);
    let (status, body) = send(
        &app.router,
        post("/api/generate", json!({"prompt": "Hello"}), Some(API_KEY)),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["output"], UNAVAILABLE_OUTPUT);
}

#[tokio::test]
async fn health_is_public_and_reports_components() {
    let app = app(false);
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&app.router, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model"], "stub");
    assert_eq!(body["model_status"], "unavailable");
    assert_eq!(body["store_status"], "ok");
    assert_eq!(body["cache_status"], "ok");
    assert_eq!(body["api_key_status"], "configured");
}

#[tokio::test]
async fn metrics_endpoint_exposes_counters() {
    let app = app(true);
    send(&app.router, post("/api/generate", json!({"prompt": "count me"}), Some(API_KEY))).await;

    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let text = String::from_utf8(to_bytes(response.into_body(), usize::MAX).await.unwrap().to_vec()).unwrap();
    assert!(text.contains("textgen_requests_total"));
}
