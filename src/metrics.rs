use lazy_static::lazy_static;
use prometheus::{Counter, Gauge, Histogram, register_counter, register_gauge, register_histogram};


lazy_static! {
    pub static ref REQUEST_TOTAL: Counter =
        register_counter!("textgen_requests_total", "Total number of generation requests").unwrap();
    pub static ref SHARED_CACHE_HITS: Counter =
        register_counter!("textgen_shared_cache_hits_total", "Total shared cache hits").unwrap();
    pub static ref LOCAL_CACHE_HITS: Counter =
        register_counter!("textgen_local_cache_hits_total", "Total local cache hits").unwrap();
    pub static ref CACHE_MISSES: Counter =
        register_counter!("textgen_cache_misses_total", "Total misses on both cache tiers").unwrap();
    pub static ref BACKEND_FAILURES: Counter =
        register_counter!("textgen_backend_failures_total", "Generations answered with fallback text").unwrap();
    pub static ref REQUEST_LATENCY: Histogram = register_histogram!(
        "textgen_request_latency_seconds",
        "Request latency in seconds"
    )
    .unwrap();
    pub static ref LOCAL_CACHE_SIZE: Gauge =
        register_gauge!("textgen_local_cache_size", "Current number of items in the local cache").unwrap();
}
