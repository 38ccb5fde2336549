// Backend failures become fallback text, which is returned but never cached.

use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::backend::Backend;
use crate::cache::ResultCache;
use crate::error::{BackendError, GenerateError};
use crate::history::{HistoryStore, keep_recent};
use crate::metrics::{BACKEND_FAILURES, SHARED_CACHE_HITS};
use crate::models::{
    BatchGenerateRequest, BatchGenerateResponse, CachedResult, GenerateRequest, GenerateResponse,
};
use crate::templates::Mode;

pub const UNAVAILABLE_OUTPUT: &str = "Error: AI model unavailable.";
pub const FAILURE_OUTPUT: &str = "Sorry, an error occurred while generating a response.";

fn fallback_output(err: &BackendError) -> String {
    BACKEND_FAILURES.inc();
    match err {
        BackendError::Unavailable => {
            warn!("generation skipped, model unavailable");
            UNAVAILABLE_OUTPUT.to_string()
        }
        other => {
            error!(error = %other, "generation failed");
            FAILURE_OUTPUT.to_string()
        }
    }
}

/// Drops the rendered prompt when the model echoes it back before its answer.
fn strip_prompt_echo(rendered: &str, generated: String) -> String {
    match generated.strip_prefix(rendered) {
        Some(rest) => rest.trim().to_string(),
        None => generated,
    }
}

fn user_turn(prompt: &str) -> String {
    format!("User: {prompt}")
}

fn ai_turn(output: &str) -> String {
    format!("AI: {output}")
}

pub struct Orchestrator {
    backend: Arc<dyn Backend>,
    cache: ResultCache,
    history: HistoryStore,
}

impl Orchestrator {
    pub fn new(backend: Arc<dyn Backend>, cache: ResultCache, history: HistoryStore) -> Self {
        Self {
            backend,
            cache,
            history,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Renders every prompt against the joined history and asks the backend
    /// for completions, returned in prompt order.
    pub async fn generate_texts(
        &self,
        prompts: &[String],
        history: &[String],
        max_length: u32,
        mode: Mode,
    ) -> Result<Vec<String>, BackendError> {
        let history_context = history.join(" ");
        let rendered: Vec<String> = prompts
            .iter()
            .map(|prompt| mode.render(prompt, &history_context))
            .collect();

        let outputs = self.backend.generate(&rendered, max_length).await?;
        if outputs.len() != rendered.len() {
            return Err(BackendError::InvalidResponse(format!(
                "expected {} outputs, got {}",
                rendered.len(),
                outputs.len()
            )));
        }

        Ok(rendered
            .iter()
            .zip(outputs)
            .map(|(prompt, output)| strip_prompt_echo(prompt, output))
            .collect())
    }

    async fn generate_uncached(
        &self,
        prompt: &str,
        history: &[String],
        max_length: u32,
        mode: Mode,
    ) -> Result<String, BackendError> {
        self.generate_texts(&[prompt.to_string()], history, max_length, mode)
            .await?
            .pop()
            .ok_or_else(|| BackendError::InvalidResponse("backend returned no output".to_string()))
    }

    // Generation through the local tier only; the shared tier is the caller's job.
    async fn generate_local(
        &self,
        prompt: &str,
        history: &[String],
        max_length: u32,
        mode: Mode,
    ) -> Result<String, BackendError> {
        self.cache
            .get_or_generate_local(prompt, history, max_length, mode, || {
                self.generate_uncached(prompt, history, max_length, mode)
            })
            .await
    }

    /// Handles a single prompt.
    ///
    /// A shared-cache hit answers with the history stored alongside the cached
    /// output and leaves the user's history untouched.
    pub async fn generate(&self, request: &GenerateRequest) -> Result<GenerateResponse, GenerateError> {
        let mode: Mode = request.mode.parse()?;
        let prompt = request.prompt.as_str();
        let max_length = request.max_length;

        if let Some(cached) = self.cache.get_shared(prompt, mode, max_length).await {
            SHARED_CACHE_HITS.inc();
            return Ok(GenerateResponse {
                input: request.prompt.clone(),
                output: cached.output,
                history: cached.history,
            });
        }

        let user_id = request.user_id.as_deref();
        let history = self.history.load(user_id).await;
        info!(user_id = ?user_id, mode = %mode, prompt, "generating response");

        let (output, generated) = match self.generate_local(prompt, &history, max_length, mode).await {
            Ok(output) => (output, true),
            Err(e) => (fallback_output(&e), false),
        };

        let history = match user_id {
            Some(_) => {
                self.history
                    .append(user_id, &[user_turn(prompt), ai_turn(&output)])
                    .await
            }
            None => Vec::new(),
        };

        let response = GenerateResponse {
            input: request.prompt.clone(),
            output,
            history,
        };
        if generated {
            self.cache
                .set_shared(prompt, mode, max_length, &CachedResult::from(&response))
                .await;
        }
        Ok(response)
    }

    /// Handles several prompts against one history snapshot.
    ///
    /// No prompt sees another prompt's output. The user's history gets all
    /// user turns followed by all AI turns once the batch is done.
    pub async fn generate_batch(
        &self,
        request: &BatchGenerateRequest,
    ) -> Result<BatchGenerateResponse, GenerateError> {
        let mode: Mode = request.mode.parse()?;
        let max_length = request.max_length;
        let user_id = request.user_id.as_deref();

        let history = self.history.load(user_id).await;
        info!(user_id = ?user_id, mode = %mode, count = request.prompts.len(), "generating batch");

        let mut outputs = Vec::with_capacity(request.prompts.len());
        for prompt in &request.prompts {
            if let Some(cached) = self.cache.get_shared(prompt, mode, max_length).await {
                SHARED_CACHE_HITS.inc();
                outputs.push(cached.output);
                continue;
            }

            match self.generate_local(prompt, &history, max_length, mode).await {
                Ok(output) => {
                    let entry = CachedResult {
                        input: prompt.clone(),
                        output: output.clone(),
                        history: history.clone(),
                    };
                    self.cache.set_shared(prompt, mode, max_length, &entry).await;
                    outputs.push(output);
                }
                Err(e) => outputs.push(fallback_output(&e)),
            }
        }

        let turns: Vec<String> = request
            .prompts
            .iter()
            .map(|p| user_turn(p))
            .chain(outputs.iter().map(|o| ai_turn(o)))
            .collect();
        let history = match user_id {
            Some(_) => self.history.append(user_id, &turns).await,
            None => keep_recent([history, turns].concat()),
        };
        debug!(turns = history.len(), "batch history updated");

        Ok(BatchGenerateResponse {
            inputs: request.prompts.clone(),
            outputs,
            history,
        })
    }
}
