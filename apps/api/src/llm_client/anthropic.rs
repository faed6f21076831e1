//! Anthropic Messages API adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_client::{
    error_from_response, http_client, BackendCredentials, BackendKind, GenerationBackend,
    GenerationRequest, GenerationResponse, LlmError,
};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-5";
const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: Vec<AnthropicMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct AnthropicMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct AnthropicError {
    error: AnthropicErrorBody,
}

#[derive(Debug, Deserialize)]
struct AnthropicErrorBody {
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<AnthropicError>(body)
        .ok()
        .map(|e| e.error.message)
}

/// Concatenates every text block and maps the stop reason onto `truncated`.
fn normalize(response: AnthropicResponse) -> Result<GenerationResponse, LlmError> {
    let content: String = response
        .content
        .iter()
        .filter(|b| b.block_type == "text")
        .filter_map(|b| b.text.as_deref())
        .collect();

    if content.trim().is_empty() {
        return Err(LlmError::EmptyContent {
            backend: BackendKind::Anthropic,
        });
    }

    Ok(GenerationResponse {
        content,
        backend: BackendKind::Anthropic,
        truncated: response.stop_reason.as_deref() == Some("max_tokens"),
    })
}

#[derive(Clone)]
pub struct AnthropicBackend {
    client: Client,
    credentials: BackendCredentials,
}

impl AnthropicBackend {
    pub fn new(credentials: BackendCredentials) -> Self {
        Self {
            client: http_client(),
            credentials,
        }
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Anthropic
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let system = request.effective_system();
        let body = AnthropicRequest {
            model: &self.credentials.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &system,
            messages: vec![AnthropicMessage {
                role: "user",
                content: &request.prompt,
            }],
        };

        let response = self
            .client
            .post(format!(
                "{}/v1/messages",
                self.credentials.base_url.trim_end_matches('/')
            ))
            .header("x-api-key", &self.credentials.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Http {
                backend: BackendKind::Anthropic,
                source,
            })?;

        if !response.status().is_success() {
            return Err(
                error_from_response(BackendKind::Anthropic, response, extract_error_message).await,
            );
        }

        let parsed: AnthropicResponse = response.json().await.map_err(|e| {
            LlmError::MalformedResponse {
                backend: BackendKind::Anthropic,
                message: e.to_string(),
            }
        })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                input_tokens = usage.input_tokens,
                output_tokens = usage.output_tokens,
                "anthropic call succeeded"
            );
        }

        normalize(parsed)
    }
}
