//! OpenAI Chat Completions adapter.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::llm_client::{
    error_from_response, http_client, BackendCredentials, BackendKind, GenerationBackend,
    GenerationRequest, GenerationResponse, LlmError, ResponseShape,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAiError {
    error: OpenAiErrorBody,
}

#[derive(Debug, Deserialize)]
struct OpenAiErrorBody {
    message: String,
}

fn extract_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<OpenAiError>(body)
        .ok()
        .map(|e| e.error.message)
}

fn build_request<'a>(
    model: &'a str,
    system: &'a str,
    request: &'a GenerationRequest,
) -> ChatRequest<'a> {
    let mut messages = Vec::with_capacity(2);
    if !system.is_empty() {
        messages.push(ChatMessage {
            role: "system",
            content: system,
        });
    }
    messages.push(ChatMessage {
        role: "user",
        content: &request.prompt,
    });

    ChatRequest {
        model,
        messages,
        max_tokens: request.max_tokens,
        temperature: request.temperature,
        response_format: match request.shape {
            ResponseShape::Json => Some(ResponseFormat {
                format_type: "json_object",
            }),
            ResponseShape::Text => None,
        },
    }
}

fn normalize(response: ChatResponse) -> Result<GenerationResponse, LlmError> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or(LlmError::EmptyContent {
            backend: BackendKind::OpenAi,
        })?;

    let content = choice.message.content.unwrap_or_default();
    if content.trim().is_empty() {
        return Err(LlmError::EmptyContent {
            backend: BackendKind::OpenAi,
        });
    }

    Ok(GenerationResponse {
        content,
        backend: BackendKind::OpenAi,
        truncated: choice.finish_reason.as_deref() == Some("length"),
    })
}

#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    credentials: BackendCredentials,
}

impl OpenAiBackend {
    pub fn new(credentials: BackendCredentials) -> Self {
        Self {
            client: http_client(),
            credentials,
        }
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::OpenAi
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let system = request.effective_system();
        let body = build_request(&self.credentials.model, &system, request);

        let response = self
            .client
            .post(format!(
                "{}/v1/chat/completions",
                self.credentials.base_url.trim_end_matches('/')
            ))
            .bearer_auth(&self.credentials.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|source| LlmError::Http {
                backend: BackendKind::OpenAi,
                source,
            })?;

        if !response.status().is_success() {
            return Err(
                error_from_response(BackendKind::OpenAi, response, extract_error_message).await,
            );
        }

        let parsed: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| LlmError::MalformedResponse {
                    backend: BackendKind::OpenAi,
                    message: e.to_string(),
                })?;

        if let Some(usage) = &parsed.usage {
            debug!(
                input_tokens = usage.prompt_tokens,
                output_tokens = usage.completion_tokens,
                "openai call succeeded"
            );
        }

        normalize(parsed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_shape_requests_json_object_format() {
        let request = GenerationRequest::new("sys", "give me json").json();
        let system = request.effective_system();
        let body = build_request(DEFAULT_MODEL, &system, &request);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "give me json");
    }

    #[test]
    fn test_text_shape_omits_response_format_and_empty_system() {
        let request = GenerationRequest::new("", "hello");
        let body = build_request(DEFAULT_MODEL, "", &request);
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("response_format").is_none());
        assert_eq!(json["messages"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_normalize_reads_first_choice() {
        let body = r#"{
            "choices": [{"message": {"role": "assistant", "content": "hi"}, "finish_reason": "length"}],
            "usage": {"prompt_tokens": 3, "completion_tokens": 1, "total_tokens": 4}
        }"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        let response = normalize(parsed).unwrap();
        assert_eq!(response.content, "hi");
        assert_eq!(response.backend, BackendKind::OpenAi);
        assert!(response.truncated);
    }

    #[test]
    fn test_normalize_null_content_is_empty() {
        let body = r#"{"choices": [{"message": {"content": null}, "finish_reason": "stop"}]}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(normalize(parsed), Err(LlmError::EmptyContent { .. })));
    }
}
