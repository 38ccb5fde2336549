use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::load_balancer::LoadBalancer;

/// A text generation backend.
///
/// Receives fully rendered prompts and returns one completion per prompt, in
/// the same order.
// prompts + history + mode go through Orchestrator::generate_texts
#[async_trait]
pub trait Backend: Send + Sync {
    async fn generate(&self, prompts: &[String], max_length: u32) -> Result<Vec<String>, BackendError>;

    /// Whether the backend can currently serve requests.
    fn is_ready(&self) -> bool;

    fn model(&self) -> &str;
}

// Ollama API request format
#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

// Ollama API response format
#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

pub struct OllamaBackend {
    client: reqwest::Client,
    load_balancer: Arc<LoadBalancer>,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(
        client: reqwest::Client,
        load_balancer: Arc<LoadBalancer>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            load_balancer,
            model: model.into(),
            timeout,
        }
    }

    async fn generate_one(&self, prompt: &str, max_length: u32) -> Result<String, BackendError> {
        let upstream = self.load_balancer.next_healthy().ok_or(BackendError::Unavailable)?;
        debug!(upstream = %upstream.url, model = %self.model, "calling model server");

        let body = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: OllamaOptions { num_predict: max_length },
        };

        let res = self
            .client
            .post(format!("{}/api/generate", upstream.url))
            .timeout(self.timeout)
            .json(&body)
            .send()
            .await
            .inspect_err(|e| {
                // unreachable upstreams stay out of rotation until the next health check
                upstream.set_healthy(false);
                warn!(upstream = %upstream.url, error = %e, "upstream failed, marked unhealthy");
            })?;

        if !res.status().is_success() {
            return Err(BackendError::Status(res.status().as_u16()));
        }

        let parsed: OllamaResponse = res
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl Backend for OllamaBackend {
    async fn generate(&self, prompts: &[String], max_length: u32) -> Result<Vec<String>, BackendError> {
        let mut outputs = Vec::with_capacity(prompts.len());
        for prompt in prompts {
            outputs.push(self.generate_one(prompt, max_length).await?);
        }
        Ok(outputs)
    }

    fn is_ready(&self) -> bool {
        self.load_balancer.any_healthy()
    }

    fn model(&self) -> &str {
        &self.model
    }
}
