//! Axum route handlers for the Fitting API.

use std::collections::HashMap;

use axum::Json;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::fitting::engine::{
    fit_session_to_duration, DurationWindow, FitOptions, FitReport, SetCaps,
};
use crate::fitting::program::fit_program_to_duration;
use crate::fitting::time_model::TimeModelConfig;
use crate::models::blueprint::SessionBlueprint;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Window and policy shared by both fitting endpoints.
#[derive(Debug, Deserialize)]
pub struct FitParams {
    pub target_minutes: f64,
    #[serde(default)]
    pub min_minutes: Option<f64>,
    #[serde(default)]
    pub max_minutes: Option<f64>,
    #[serde(default)]
    pub time_model: TimeModelConfig,
    #[serde(default)]
    pub set_caps: HashMap<String, SetCaps>,
    #[serde(default)]
    pub allow_main_removal: bool,
}

impl FitParams {
    fn resolve(self) -> Result<(TimeModelConfig, FitOptions), AppError> {
        if !self.target_minutes.is_finite() || self.target_minutes <= 0.0 {
            return Err(AppError::Validation(
                "target_minutes must be positive".to_string(),
            ));
        }
        let window =
            DurationWindow::from_bounds(self.target_minutes, self.min_minutes, self.max_minutes);
        if !window.is_valid() {
            return Err(AppError::Validation(format!(
                "allowed window [{}, {}] is invalid",
                window.min_minutes, window.max_minutes
            )));
        }

        Ok((
            self.time_model,
            FitOptions {
                window,
                set_caps: self.set_caps,
                allow_main_removal: self.allow_main_removal,
            },
        ))
    }
}

#[derive(Debug, Deserialize)]
pub struct FitSessionRequest {
    pub session: SessionBlueprint,
    #[serde(flatten)]
    pub params: FitParams,
}

#[derive(Debug, Serialize)]
pub struct FitSessionResponse {
    pub session: SessionBlueprint,
    pub report: FitReport,
}

#[derive(Debug, Deserialize)]
pub struct FitProgramRequest {
    pub sessions: Vec<SessionBlueprint>,
    #[serde(flatten)]
    pub params: FitParams,
}

#[derive(Debug, Serialize)]
pub struct FitProgramResponse {
    pub sessions: Vec<SessionBlueprint>,
    pub reports: Vec<FitReport>,
    pub needs_review: bool,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/fit/session
///
/// Fits one session to the requested window. Always 200 for a well-formed request;
/// an unreachable window shows up as `report.status == "needs_review"`.
pub async fn handle_fit_session(
    Json(request): Json<FitSessionRequest>,
) -> Result<Json<FitSessionResponse>, AppError> {
    let (config, options) = request.params.resolve()?;
    let session = request.session;

    let (session, report) =
        tokio::task::spawn_blocking(move || fit_session_to_duration(&session, &config, &options))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking failed in fit_session: {e}"))?;

    Ok(Json(FitSessionResponse { session, report }))
}

/// POST /api/v1/fit/program
pub async fn handle_fit_program(
    Json(request): Json<FitProgramRequest>,
) -> Result<Json<FitProgramResponse>, AppError> {
    let (config, options) = request.params.resolve()?;
    let sessions = request.sessions;

    let fitted =
        tokio::task::spawn_blocking(move || fit_program_to_duration(&sessions, &config, &options))
            .await
            .map_err(|e| anyhow::anyhow!("spawn_blocking failed in fit_program: {e}"))?;

    Ok(Json(FitProgramResponse {
        needs_review: fitted.needs_review(),
        sessions: fitted.sessions,
        reports: fitted.reports,
    }))
}
