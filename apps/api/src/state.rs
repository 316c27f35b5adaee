use std::sync::Arc;

use crate::config::Config;
use crate::pipeline::orchestrator::{FetchOrchestrator, FetchSettings};
use crate::sources::{SessionProvider, SourceRegistry};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    /// Registered job sources, built once at startup.
    pub registry: Arc<SourceRegistry>,
    /// Opens the per-run HTTP session. Default: reqwest.
    pub sessions: Arc<dyn SessionProvider>,
}

impl AppState {
    /// Orchestrator for one run, with tuning narrowed by the request if asked.
    pub fn orchestrator(&self, settings: FetchSettings) -> FetchOrchestrator {
        FetchOrchestrator::new(
            Arc::clone(&self.registry),
            Arc::clone(&self.sessions),
            settings,
            self.config.max_keywords_len,
        )
    }
}
