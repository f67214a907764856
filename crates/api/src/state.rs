//! Shared application state for the Axum health router.

use std::sync::Arc;

use relay_common::health::QueueProbe;

/// Application state shared across all route handlers via Axum `State`.
#[derive(Clone)]
pub struct AppState {
    pub probe: Arc<dyn QueueProbe>,
}

impl AppState {
    pub fn new(probe: Arc<dyn QueueProbe>) -> Self {
        Self { probe }
    }
}
