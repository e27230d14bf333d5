//! Shared state handed to every handler through axum's `State` extractor.

use std::sync::Arc;
use std::time::Instant;

use veritas_core::VeritasConfig;
use veritas_rag::Orchestrator;

use crate::sessions::SessionRegistry;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<VeritasConfig>,
    pub orchestrator: Arc<Orchestrator>,
    pub sessions: Arc<SessionRegistry>,
    /// Admin bearer token.
    pub api_token: String,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(
        config: VeritasConfig,
        orchestrator: Arc<Orchestrator>,
        sessions: Arc<SessionRegistry>,
        api_token: impl Into<String>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator,
            sessions,
            api_token: api_token.into(),
            start_time: Instant::now(),
        }
    }
}
