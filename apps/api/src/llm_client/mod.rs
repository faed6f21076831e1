/// LLM Client — the single point of entry for every generation backend call.
///
/// ARCHITECTURAL RULE: No other module may call a provider API directly.
/// All generation goes through `LlmOrchestrator`, which owns the fallback chain.
///
/// Backends are selected by the closed `BackendKind` enum carried on the request,
/// never by sniffing model names.
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod anthropic;
pub mod gemini;
pub mod json;
pub mod openai;
pub mod orchestrator;
pub mod prompts;

pub use orchestrator::LlmOrchestrator;

const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TEMPERATURE: f32 = 0.4;

// ────────────────────────────────────────────────────────────────────────────
// Backend identity
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAi,
    Gemini,
}

impl BackendKind {
    /// Fixed priority used when no explicit order is configured.
    pub const DEFAULT_ORDER: [BackendKind; 3] =
        [BackendKind::Anthropic, BackendKind::OpenAi, BackendKind::Gemini];

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Anthropic => "anthropic",
            BackendKind::OpenAi => "openai",
            BackendKind::Gemini => "gemini",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(BackendKind::Anthropic),
            "openai" => Ok(BackendKind::OpenAi),
            "gemini" | "google" => Ok(BackendKind::Gemini),
            other => Err(format!("unknown generation backend '{other}'")),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    #[default]
    Text,
    Json,
}

/// The one canonical request every backend adapter accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub system: String,
    pub prompt: String,
    #[serde(default)]
    pub shape: ResponseShape,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    /// Explicit primary backend. Falls back to the configured order when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend: Option<BackendKind>,
}

fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

impl GenerationRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            shape: ResponseShape::Text,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
            backend: None,
        }
    }

    pub fn json(mut self) -> Self {
        self.shape = ResponseShape::Json;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_backend(mut self, backend: Option<BackendKind>) -> Self {
        self.backend = backend;
        self
    }

    /// System prompt as sent to providers. JSON requests get the JSON-only rule appended.
    pub fn effective_system(&self) -> String {
        match self.shape {
            ResponseShape::Text => self.system.clone(),
            ResponseShape::Json if self.system.is_empty() => prompts::JSON_ONLY_SYSTEM.to_string(),
            ResponseShape::Json => format!("{}\n\n{}", self.system, prompts::JSON_ONLY_SYSTEM),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    pub content: String,
    /// Backend that actually produced `content`.
    pub backend: BackendKind,
    /// True when the provider stopped on its output-token limit.
    pub truncated: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("{backend}: HTTP error: {source}")]
    Http {
        backend: BackendKind,
        #[source]
        source: reqwest::Error,
    },

    #[error("{backend}: API error (status {status}): {message}")]
    Api {
        backend: BackendKind,
        status: u16,
        message: String,
    },

    #[error("{backend}: rate limited")]
    RateLimited { backend: BackendKind },

    #[error("{backend}: timed out after {}ms", .after.as_millis())]
    Timeout {
        backend: BackendKind,
        after: Duration,
    },

    #[error("{backend}: returned empty content")]
    EmptyContent { backend: BackendKind },

    #[error("{backend}: unexpected response body: {message}")]
    MalformedResponse {
        backend: BackendKind,
        message: String,
    },

    #[error("JSON parse error: {message}; content: {content}")]
    Parse { message: String, content: String },

    #[error("no generation backends are configured")]
    NoBackends,

    #[error("all {attempts} generation backends failed; last error: {last}")]
    Exhausted {
        attempts: usize,
        #[source]
        last: Box<LlmError>,
    },
}

impl LlmError {
    /// Short label used in logs for each failed attempt.
    pub fn category(&self) -> &'static str {
        match self {
            LlmError::Http { source, .. } if source.is_timeout() => "timeout",
            LlmError::Http { .. } => "connection",
            LlmError::Api { .. } => "api",
            LlmError::RateLimited { .. } => "rate_limit",
            LlmError::Timeout { .. } => "timeout",
            LlmError::EmptyContent { .. } => "empty",
            LlmError::MalformedResponse { .. } => "malformed",
            LlmError::Parse { .. } => "parse",
            LlmError::NoBackends => "unconfigured",
            LlmError::Exhausted { .. } => "exhausted",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Backend trait
// ────────────────────────────────────────────────────────────────────────────

/// One interchangeable provider. Adapters normalize their wire format into a
/// `GenerationResponse` and do not retry; retries belong to the orchestrator.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError>;
}

/// Credentials and model for one provider.
#[derive(Clone)]
pub struct BackendCredentials {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl fmt::Debug for BackendCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCredentials")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Shared HTTP client for all adapters. Per-attempt deadlines are enforced by the
/// orchestrator; this only bounds connection setup.
pub(crate) fn http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(10))
        .build()
        .unwrap_or_default()
}

/// Maps a non-success provider response into an `LlmError`.
///
/// `extract_message` pulls the provider's own error text out of the body when it parses.
pub(crate) async fn error_from_response(
    backend: BackendKind,
    response: reqwest::Response,
    extract_message: fn(&str) -> Option<String>,
) -> LlmError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();

    if status.as_u16() == 429 {
        return LlmError::RateLimited { backend };
    }

    let message = extract_message(&body).unwrap_or(body);
    LlmError::Api {
        backend,
        status: status.as_u16(),
        message,
    }
}
