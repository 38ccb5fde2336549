use std::sync::Arc;

use crate::orchestrator::Orchestrator;
use crate::store::SharedStore;

// app's shared state

pub struct AppState {
    pub orchestrator: Orchestrator,
    pub store: Option<Arc<dyn SharedStore>>, // None when the store was unreachable at startup
    pub api_key: String,
    pub environment: String,
}

impl AppState {
    pub fn api_key_is_default(&self) -> bool {
        self.api_key == crate::config::DEFAULT_API_KEY
    }
}
