use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::time::{Duration, interval};
use tracing::{info, warn};

use crate::error::ConfigError;

// Single model server

pub struct Upstream {
    pub url: String,
    healthy: AtomicBool,
}

impl Upstream {
    pub fn new(url: String) -> Self {
        Self {
            url,
            healthy: AtomicBool::new(true),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::Relaxed);
    }
}

// Round-robin over the configured model servers

pub struct LoadBalancer {
    upstreams: Vec<Arc<Upstream>>,
    current: AtomicUsize,
}

impl LoadBalancer {
    // Create from comma-separated urls "localhost:11434, localhost:11435"
    pub fn new(upstreams_str: &str) -> Result<Self, ConfigError> {
        let upstreams: Vec<Arc<Upstream>> = upstreams_str
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|url| {
                let full_url = if url.starts_with("http") {
                    url.trim_end_matches('/').to_string()
                } else {
                    format!("http://{}", url.trim_end_matches('/'))
                };
                Arc::new(Upstream::new(full_url))
            })
            .collect();
        if upstreams.is_empty() {
            return Err(ConfigError::NoBackends);
        }

        info!(count = upstreams.len(), "load balancer initialized");
        for (i, u) in upstreams.iter().enumerate() {
            info!("  [{}] {}", i + 1, u.url);
        }

        Ok(Self {
            upstreams,
            current: AtomicUsize::new(0),
        })
    }

    // Get next healthy upstream (round-robin)
    pub fn next_healthy(&self) -> Option<Arc<Upstream>> {
        let len = self.upstreams.len();
        let start = self.current.fetch_add(1, Ordering::Relaxed) % len;

        for i in 0..len {
            let upstream = &self.upstreams[(start + i) % len];
            if upstream.is_healthy() {
                return Some(Arc::clone(upstream));
            }
        }
        None
    }

    pub fn any_healthy(&self) -> bool {
        self.upstreams.iter().any(|u| u.is_healthy())
    }

    pub fn upstreams(&self) -> &[Arc<Upstream>] {
        &self.upstreams
    }
}

// Probes every upstream on a fixed interval and flips its health flag

pub async fn health_checker(
    load_balancer: Arc<LoadBalancer>,
    client: reqwest::Client,
    check_interval: Duration,
) {
    let mut interval = interval(check_interval);

    info!(interval = ?check_interval, "health checker started");

    loop {
        interval.tick().await;

        for upstream in load_balancer.upstreams() {
            let url = format!("{}/api/tags", upstream.url); // Ollama liveness endpoint

            let was_healthy = upstream.is_healthy();

            let is_healthy = match client.get(&url).timeout(Duration::from_secs(5)).send().await {
                Ok(res) => res.status().is_success(),
                Err(_) => false,
            };
            upstream.set_healthy(is_healthy);

            if was_healthy != is_healthy {
                if is_healthy {
                    info!(upstream = %upstream.url, "upstream is now healthy");
                } else {
                    warn!(upstream = %upstream.url, "upstream is now unhealthy");
                }
            }
        }
    }
}
