//! Shared application state for the Axum API server.

use std::sync::Arc;

use relay_engine::dispatch::DispatchService;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DispatchService>,
}

impl AppState {
    pub fn new(service: DispatchService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}
