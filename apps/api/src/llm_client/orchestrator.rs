//! Generation Orchestrator — walks an ordered fallback chain of backends.
//!
//! # Protocol
//! 1. Primary backend = the request's explicit hint if that backend is configured,
//!    otherwise the first in the configured order.
//! 2. Attempt sequence = primary, then every other configured backend in order, deduped.
//! 3. Each attempt gets its own full `attempt_timeout`. Worst-case latency is the sum of
//!    all attempts plus the fallback delays, not one shared deadline.
//! 4. Any failure (error, timeout, rate limit) moves on to the next backend after
//!    `fallback_delay`. Failing the last backend returns `LlmError::Exhausted`.
//!
//! Attempts are strictly sequential. When the timer fires the attempt's future is
//! dropped, which aborts the in-flight HTTP request.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use tracing::{info, warn};

use crate::llm_client::anthropic::AnthropicBackend;
use crate::llm_client::gemini::GeminiBackend;
use crate::llm_client::json::parse_json_response;
use crate::llm_client::openai::OpenAiBackend;
use crate::llm_client::{
    BackendCredentials, BackendKind, GenerationBackend, GenerationRequest, GenerationResponse,
    LlmError,
};

pub const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_FALLBACK_DELAY: Duration = Duration::from_millis(500);

/// Immutable orchestration policy, injected at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSettings {
    /// Preferred order. Configured backends missing from it are appended in
    /// `BackendKind::DEFAULT_ORDER`.
    pub order: Vec<BackendKind>,
    pub attempt_timeout: Duration,
    pub fallback_delay: Duration,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            order: BackendKind::DEFAULT_ORDER.to_vec(),
            attempt_timeout: DEFAULT_ATTEMPT_TIMEOUT,
            fallback_delay: DEFAULT_FALLBACK_DELAY,
        }
    }
}

/// Credentials for every backend that has them, plus the orchestration policy.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub anthropic: Option<BackendCredentials>,
    pub openai: Option<BackendCredentials>,
    pub gemini: Option<BackendCredentials>,
    pub settings: BackendSettings,
}

impl LlmConfig {
    pub fn configured_kinds(&self) -> Vec<BackendKind> {
        let mut kinds = Vec::new();
        if self.anthropic.is_some() {
            kinds.push(BackendKind::Anthropic);
        }
        if self.openai.is_some() {
            kinds.push(BackendKind::OpenAi);
        }
        if self.gemini.is_some() {
            kinds.push(BackendKind::Gemini);
        }
        kinds
    }
}

#[derive(Clone)]
pub struct LlmOrchestrator {
    backends: HashMap<BackendKind, Arc<dyn GenerationBackend>>,
    /// Configured backends only, in fallback order.
    order: Vec<BackendKind>,
    settings: BackendSettings,
}

impl LlmOrchestrator {
    pub fn new(backends: Vec<Arc<dyn GenerationBackend>>, settings: BackendSettings) -> Self {
        let backends: HashMap<BackendKind, Arc<dyn GenerationBackend>> =
            backends.into_iter().map(|b| (b.kind(), b)).collect();

        let mut order: Vec<BackendKind> = Vec::new();
        for kind in settings
            .order
            .iter()
            .chain(BackendKind::DEFAULT_ORDER.iter())
        {
            if backends.contains_key(kind) && !order.contains(kind) {
                order.push(*kind);
            }
        }

        Self {
            backends,
            order,
            settings,
        }
    }

    /// Builds one HTTP adapter per configured backend.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut backends: Vec<Arc<dyn GenerationBackend>> = Vec::new();
        if let Some(creds) = &config.anthropic {
            backends.push(Arc::new(AnthropicBackend::new(creds.clone())));
        }
        if let Some(creds) = &config.openai {
            backends.push(Arc::new(OpenAiBackend::new(creds.clone())));
        }
        if let Some(creds) = &config.gemini {
            backends.push(Arc::new(GeminiBackend::new(creds.clone())));
        }
        Self::new(backends, config.settings.clone())
    }

    /// Configured backends in fallback order.
    pub fn order(&self) -> &[BackendKind] {
        &self.order
    }

    /// Full attempt sequence for a request carrying `hint`.
    pub fn attempt_sequence(&self, hint: Option<BackendKind>) -> Vec<BackendKind> {
        let mut sequence = Vec::with_capacity(self.order.len());
        match hint {
            Some(kind) if self.backends.contains_key(&kind) => sequence.push(kind),
            Some(kind) => warn!(backend = %kind, "requested backend is not configured; using default order"),
            None => {}
        }
        for kind in &self.order {
            if !sequence.contains(kind) {
                sequence.push(*kind);
            }
        }
        sequence
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
    ) -> Result<GenerationResponse, LlmError> {
        let sequence = self.attempt_sequence(request.backend);
        let attempts = sequence.len();
        let mut last_error: Option<LlmError> = None;

        for (index, kind) in sequence.iter().enumerate() {
            let Some(backend) = self.backends.get(kind) else {
                continue;
            };
            let attempt = index + 1;

            if attempt > 1 {
                tokio::time::sleep(self.settings.fallback_delay).await;
            }

            let outcome =
                match tokio::time::timeout(self.settings.attempt_timeout, backend.generate(request))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(LlmError::Timeout {
                        backend: *kind,
                        after: self.settings.attempt_timeout,
                    }),
                };

            match outcome {
                Ok(mut response) => {
                    response.backend = *kind;
                    info!(
                        backend = %kind,
                        attempt,
                        truncated = response.truncated,
                        "generation succeeded"
                    );
                    return Ok(response);
                }
                Err(err) => {
                    warn!(
                        backend = %kind,
                        attempt,
                        attempts,
                        category = err.category(),
                        error = %err,
                        "generation attempt failed"
                    );
                    last_error = Some(err);
                }
            }
        }

        match last_error {
            Some(last) => Err(LlmError::Exhausted {
                attempts,
                last: Box::new(last),
            }),
            None => Err(LlmError::NoBackends),
        }
    }

    /// Generates, then cleans and deserializes the content as JSON.
    ///
    /// Parsing happens after the fallback chain: a backend that answers with bad JSON
    /// counts as a success here, and the parse error goes to the caller.
    pub async fn generate_json<T: DeserializeOwned>(
        &self,
        request: &GenerationRequest,
    ) -> Result<(T, GenerationResponse), LlmError> {
        let response = self.generate(request).await?;
        if response.truncated {
            warn!(backend = %response.backend, "structured response was truncated");
        }
        let value = parse_json_response(&response.content)?;
        Ok((value, response))
    }
}
