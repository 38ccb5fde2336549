use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use textgen_gateway::backend::{Backend, OllamaBackend};
use textgen_gateway::cache::ResultCache;
use textgen_gateway::config::{Args, DEFAULT_API_KEY, StoreKind};
use textgen_gateway::history::HistoryStore;
use textgen_gateway::load_balancer::{LoadBalancer, health_checker};
use textgen_gateway::orchestrator::Orchestrator;
use textgen_gateway::server::{cors_layer, router};
use textgen_gateway::state::AppState;
use textgen_gateway::store::{MemoryStore, RedisStore, SharedStore};

// Connect the shared store; an unreachable redis leaves the gateway running without one
async fn connect_store(args: &Args) -> Option<Arc<dyn SharedStore>> {
    match args.store {
        StoreKind::Memory => Some(Arc::new(MemoryStore::new())),
        StoreKind::Redis => match RedisStore::connect(&args.redis_url).await {
            Ok(store) => {
                info!(url = %args.redis_url, "connected to redis");
                Some(Arc::new(store))
            }
            Err(e) => {
                error!(url = %args.redis_url, error = %e, "failed to connect to redis, running without cache and history");
                None
            }
        },
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(args.default_log_level())),
        )
        .init();

    if args.api_key == DEFAULT_API_KEY {
        warn!("using the default API key, set API_KEY in production");
    }

    let client = reqwest::Client::new();
    let load_balancer = Arc::new(LoadBalancer::new(&args.backends)?);

    // spawn the background health checker
    tokio::spawn(health_checker(
        Arc::clone(&load_balancer),
        client.clone(),
        Duration::from_secs(args.health_interval),
    ));

    let backend: Arc<dyn Backend> = Arc::new(OllamaBackend::new(
        client,
        load_balancer,
        args.model.clone(),
        Duration::from_secs(args.request_timeout),
    ));
    let store = connect_store(&args).await;

    let orchestrator = Orchestrator::new(
        backend,
        ResultCache::new(
            store.clone(),
            args.local_cache_capacity,
            Duration::from_secs(args.cache_ttl),
        ),
        HistoryStore::new(store.clone()),
    );

    let state = Arc::new(AppState {
        orchestrator,
        store,
        api_key: args.api_key.clone(),
        environment: args.environment.as_str().to_string(),
    });

    let app = router(state).layer(cors_layer(&args));

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(port = args.port, model = %args.model, "gateway listening");
    info!(cache_ttl = args.cache_ttl, local_capacity = args.local_cache_capacity, "cache configured");
    axum::serve(listener, app).await?;
    Ok(())
}
