//! Axum route handlers for the Generation API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::generation::pipeline::{generate_program, ProgramRequest, ProgramResponse};
use crate::llm_client::{GenerationRequest, GenerationResponse};
use crate::state::AppState;

/// POST /api/v1/generate
///
/// Single orchestrated generation call. Falls back across the configured backends;
/// 502 only when every backend failed.
pub async fn handle_generate(
    State(state): State<AppState>,
    Json(request): Json<GenerationRequest>,
) -> Result<Json<GenerationResponse>, AppError> {
    if request.prompt.trim().is_empty() {
        return Err(AppError::Validation("prompt cannot be empty".to_string()));
    }
    if request.max_tokens == 0 {
        return Err(AppError::Validation("max_tokens must be positive".to_string()));
    }

    let response = state.llm.generate(&request).await?;
    Ok(Json(response))
}

/// POST /api/v1/programs/generate
///
/// Full pipeline: analysis → blueprint → fitting. Returns fitted sessions with their
/// fit reports; `needs_review` flags any session that could not be brought into range.
pub async fn handle_generate_program(
    State(state): State<AppState>,
    Json(request): Json<ProgramRequest>,
) -> Result<Json<ProgramResponse>, AppError> {
    let response = generate_program(&state.llm, request).await?;
    Ok(Json(response))
}
