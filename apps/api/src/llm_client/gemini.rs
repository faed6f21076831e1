//! Google Gemini `generateContent` adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_client::{
    error_from_response, http_client, BackendCredentials, BackendKind, GenerationBackend,
    GenerationRequest, GenerationResponse, LlmError, ResponseShape,
};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent<'a>>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Debug, Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<GeminiError>(body)
        .ok()
        .map(|e| e.error.message)
}

fn build_request<'a>(system: &'a str, request: &'a GenerationRequest) -> GeminiRequest<'a> {
    GeminiRequest {
        system_instruction: (!system.is_empty()).then(|| GeminiContent {
            role: None,
            parts: vec![GeminiPart { text: system }],
        }),
        contents: vec![GeminiContent {
            role: Some("user"),
            parts: vec![GeminiPart {
                text: &request.prompt,
            }],
        }],
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
            response_mime_type: match request.shape {
                ResponseShape::Json => Some("application/json"),
                ResponseShape::Text => None,
            },
        },
    }
}

fn normalize(response: GeminiResponse) -> Result<GenerationResponse, LlmError> {
    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyContent {
            backend: BackendKind::Gemini,
        })?;

    let content: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if content.trim().is_empty() {
        return Err(LlmError::EmptyContent {
            backend: BackendKind::Gemini,
        });
    }

    Ok(GenerationResponse {
        content,
        backend: BackendKind::Gemini,
        truncated: candidate.finish_reason.as_deref() == Some("MAX_TOKENS"),
    })
}

#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    credentials: BackendCredentials,
}

impl GeminiBackend {
    pub fn new(credentials: BackendCredentials) -> Self {
        Self {
            client: http_client(),
            credentials,
        }
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Gemini
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let system = request.effective_system();
        let body = build_request(&system, request);

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.credentials.base_url.trim_end_matches('/'),
                self.credentials.model
            ))
            .header("x-goog-api-key", &self.credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Http {
                backend: BackendKind::Gemini,
                source,
            })?;

        if !response.status().is_success() {
            return Err(
                error_from_response(BackendKind::Gemini, response, extract_error_message).await,
            );
        }

        let parsed: GeminiResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse {
                    backend: BackendKind::Gemini,
                    message: e.to_string(),
                })?;

        if let Some(usage) = &parsed.usage_metadata {
            debug!(
                input_tokens = usage.prompt_token_count,
                output_tokens = usage.candidates_token_count,
                "gemini call succeeded"
            );
        }

        normalize(parsed)
    }
}
