pub mod auth;
pub mod backend;
pub mod cache;
pub mod config;
pub mod error;
pub mod handlers;
pub mod history;
pub mod load_balancer;
pub mod metrics;
pub mod models;
pub mod orchestrator;
pub mod server;
pub mod state;
pub mod store;
pub mod templates;
