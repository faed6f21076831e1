use std::sync::Arc;

use crate::llm_client::LlmOrchestrator;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Backend order and timeouts are fixed at startup from `Config::llm`.
    pub llm: Arc<LlmOrchestrator>,
}
