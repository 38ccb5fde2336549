use serde::{Deserialize, Serialize};

use crate::error::FieldError;

pub const MAX_PROMPT_CHARS: usize = 500;
pub const MIN_MAX_LENGTH: u32 = 10;
pub const MAX_MAX_LENGTH: u32 = 500;

fn default_max_length() -> u32 {
    100
}

fn default_mode() -> String {
    "general".to_string()
}

// A generation result as stored in the shared cache
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedResult {
    pub input: String,
    pub output: String,
    #[serde(default)]
    pub history: Vec<String>,
}

// POST /api/generate request body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub prompt: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
}

// POST /api/generate_batch request body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BatchGenerateRequest {
    pub prompts: Vec<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default = "default_max_length")]
    pub max_length: u32,
    #[serde(default = "default_mode")]
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub input: String,
    pub output: String,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchGenerateResponse {
    pub inputs: Vec<String>,
    pub outputs: Vec<String>,
    pub history: Vec<String>,
}

impl From<&GenerateResponse> for CachedResult {
    fn from(response: &GenerateResponse) -> Self {
        Self {
            input: response.input.clone(),
            output: response.output.clone(),
            history: response.history.clone(),
        }
    }
}

fn check_prompt(field: &str, prompt: &str, errors: &mut Vec<FieldError>) {
    let chars = prompt.chars().count();
    if chars == 0 {
        errors.push(FieldError::new(field, "prompt must not be empty"));
    } else if chars > MAX_PROMPT_CHARS {
        errors.push(FieldError::new(
            field,
            format!("prompt must be at most {MAX_PROMPT_CHARS} characters"),
        ));
    }
}

fn check_max_length(max_length: u32, errors: &mut Vec<FieldError>) {
    if !(MIN_MAX_LENGTH..=MAX_MAX_LENGTH).contains(&max_length) {
        errors.push(FieldError::new(
            "max_length",
            format!("max_length must be between {MIN_MAX_LENGTH} and {MAX_MAX_LENGTH}"),
        ));
    }
}

impl GenerateRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        check_prompt("prompt", &self.prompt, &mut errors);
        check_max_length(self.max_length, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

impl BatchGenerateRequest {
    pub fn validate(&self) -> Result<(), Vec<FieldError>> {
        let mut errors = Vec::new();
        for prompt in &self.prompts {
            check_prompt("prompts", prompt, &mut errors);
        }
        check_max_length(self.max_length, &mut errors);
        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}
