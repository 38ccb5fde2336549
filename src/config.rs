use clap::{Parser, ValueEnum};

use crate::cache::{DEFAULT_LOCAL_CAPACITY, DEFAULT_SHARED_TTL};

pub const DEFAULT_API_KEY: &str = "default-api-key";

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Redis,
    Memory,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Development,
    Production,
}

// CLI argument structure, every flag can also come from the environment
#[derive(Parser, Debug, Clone)]
#[command(name = "textgen-gateway")]
#[command(about = "Caching text generation gateway with conversation history")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, env = "PORT", default_value_t = 5000)]
    pub port: u16,

    // Model servers (comma-separated)
    // Example: "localhost:11434,localhost:11435"
    #[arg(short, long, env = "OLLAMA_BACKENDS", default_value = "localhost:11434")]
    pub backends: String,

    // Model to request from the model servers
    #[arg(short, long, env = "MODEL_NAME", default_value = "llama3.2")]
    pub model: String,

    // Shared store for results and history
    #[arg(long, env = "STORE", value_enum, default_value_t = StoreKind::Redis)]
    pub store: StoreKind,

    #[arg(long, env = "REDIS_URL", default_value = "redis://redis:6379/0")]
    pub redis_url: String,

    // Shared cache TTL in seconds
    #[arg(short, long, env = "CACHE_TTL", default_value_t = DEFAULT_SHARED_TTL.as_secs())]
    pub cache_ttl: u64,

    // Entries kept in the in-process LRU
    #[arg(long, env = "LOCAL_CACHE_CAPACITY", default_value_t = DEFAULT_LOCAL_CAPACITY)]
    pub local_cache_capacity: usize,

    #[arg(long, env = "API_KEY", default_value = DEFAULT_API_KEY, hide_env_values = true)]
    pub api_key: String,

    #[arg(long, env = "APP_ENV", value_enum, default_value_t = Environment::Development)]
    pub environment: Environment,

    // CORS origins allowed in production (comma-separated)
    #[arg(long, env = "ALLOWED_ORIGINS", default_value = "")]
    pub allowed_origins: String,

    // Health check interval in seconds
    #[arg(long, env = "HEALTH_INTERVAL", default_value_t = 30)]
    pub health_interval: u64,

    // Per-request timeout towards the model servers, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT", default_value_t = 120)]
    pub request_timeout: u64,
}

impl Args {
    pub fn default_log_level(&self) -> &'static str {
        match self.environment {
            Environment::Development => "debug",
            Environment::Production => "info",
        }
    }

    pub fn origins(&self) -> Vec<String> {
        self.allowed_origins
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

impl Environment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Production => "production",
        }
    }
}
