//! Program Generation Pipeline — analysis → blueprint → deterministic fitting.
//!
//! Each generation stage's output is parsed and validated before the next stage
//! starts. A stage that produces malformed or inconsistent output aborts the run with
//! `PipelineError::Validation` naming the stage; nothing partial is passed on.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::fitting::engine::{DurationWindow, FitOptions, FitReport, SetCaps};
use crate::fitting::program::fit_program_to_duration;
use crate::fitting::time_model::TimeModelConfig;
use crate::generation::analysis::{analyze_program, ProgramAnalysis};
use crate::generation::blueprint::generate_blueprint;
use crate::generation::validation::validate_program_request;
use crate::llm_client::{BackendKind, GenerationRequest, LlmError, LlmOrchestrator};
use crate::models::blueprint::SessionBlueprint;

// ────────────────────────────────────────────────────────────────────────────
// Errors
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Request,
    Analysis,
    Blueprint,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PipelineStage::Request => "request",
            PipelineStage::Analysis => "analysis",
            PipelineStage::Blueprint => "blueprint",
        })
    }
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{stage} generation failed: {source}")]
    Generation {
        stage: PipelineStage,
        #[source]
        source: LlmError,
    },

    #[error("{stage} validation failed: {message}")]
    Validation {
        stage: PipelineStage,
        message: String,
    },

    #[error("fitting failed: {0}")]
    Fitting(String),
}

// ────────────────────────────────────────────────────────────────────────────
// Request / response
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramRequest {
    pub goals: String,
    #[serde(default)]
    pub experience: String,
    #[serde(default)]
    pub equipment: Vec<String>,
    pub days_per_week: u8,
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
    #[serde(default)]
    pub backend: Option<BackendKind>,
}

impl ProgramRequest {
    pub fn window(&self) -> DurationWindow {
        DurationWindow::from_bounds(self.target_minutes, self.min_minutes, self.max_minutes)
    }

    pub fn fit_options(&self) -> FitOptions {
        FitOptions {
            window: self.window(),
            set_caps: self.set_caps.clone(),
            allow_main_removal: self.allow_main_removal,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageBackends {
    pub analysis: BackendKind,
    pub blueprint: BackendKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgramResponse {
    pub run_id: Uuid,
    pub analysis: ProgramAnalysis,
    pub sessions: Vec<SessionBlueprint>,
    pub fit_reports: Vec<FitReport>,
    /// True if any session could not be fit into the window.
    pub needs_review: bool,
    pub backends: StageBackends,
    pub generated_at: DateTime<Utc>,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

/// Calls the orchestrator for one stage and parses its JSON output.
///
/// Backend exhaustion is a `Generation` error; unparseable output is a `Validation`
/// error of the same stage.
pub(crate) async fn run_stage<T: DeserializeOwned>(
    llm: &LlmOrchestrator,
    stage: PipelineStage,
    request: &GenerationRequest,
) -> Result<(T, BackendKind), PipelineError> {
    let (value, response) = llm
        .generate_json::<T>(request)
        .await
        .map_err(|e| match e {
            e @ LlmError::Parse { .. } => PipelineError::Validation {
                stage,
                message: e.to_string(),
            },
            source => PipelineError::Generation { stage, source },
        })?;

    Ok((value, response.backend))
}

/// Runs the full program pipeline.
///
/// Steps:
/// 1. validate_program_request()
/// 2. analyze_program() → ProgramAnalysis (validated)
/// 3. generate_blueprint() → ProgramBlueprint (validated)
/// 4. fit_program_to_duration() on a blocking thread
pub async fn generate_program(
    llm: &LlmOrchestrator,
    request: ProgramRequest,
) -> Result<ProgramResponse, PipelineError> {
    validate_program_request(&request)?;

    let run_id = Uuid::new_v4();
    info!(%run_id, days = request.days_per_week, "Starting program generation");

    let (analysis, analysis_backend) = analyze_program(llm, &request).await?;
    let (blueprint, blueprint_backend) = generate_blueprint(llm, &request, &analysis).await?;

    let config = request.time_model;
    let options = request.fit_options();
    let sessions = blueprint.sessions;
    let fitted = tokio::task::spawn_blocking(move || {
        fit_program_to_duration(&sessions, &config, &options)
    })
    .await
    .map_err(|e| PipelineError::Fitting(format!("spawn_blocking failed in fitting: {e}")))?;

    let needs_review = fitted.needs_review();
    info!(%run_id, needs_review, "Program generation complete");

    Ok(ProgramResponse {
        run_id,
        analysis,
        needs_review,
        sessions: fitted.sessions,
        fit_reports: fitted.reports,
        backends: StageBackends {
            analysis: analysis_backend,
            blueprint: blueprint_backend,
        },
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::fitting::engine::FitStatus;
    use crate::llm_client::orchestrator::BackendSettings;
    use crate::llm_client::{GenerationBackend, GenerationResponse};

    /// Replays canned responses in order, one per call.
    struct ScriptedBackend {
        kind: BackendKind,
        responses: Mutex<Vec<Result<String, ()>>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl GenerationBackend for ScriptedBackend {
        fn kind(&self) -> BackendKind {
            self.kind
        }

        async fn generate(
            &self,
            _request: &GenerationRequest,
        ) -> Result<GenerationResponse, LlmError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let next = self.responses.lock().unwrap().remove(0);
            match next {
                Ok(content) => Ok(GenerationResponse {
                    content,
                    backend: self.kind,
                    truncated: false,
                }),
                Err(()) => Err(LlmError::RateLimited { backend: self.kind }),
            }
        }
    }

    fn orchestrator(backends: Vec<Arc<ScriptedBackend>>) -> LlmOrchestrator {
        let settings = BackendSettings {
            order: backends.iter().map(|b| b.kind).collect(),
            attempt_timeout: Duration::from_secs(5),
            fallback_delay: Duration::ZERO,
        };
        LlmOrchestrator::new(
            backends
                .into_iter()
                .map(|b| b as Arc<dyn GenerationBackend>)
                .collect(),
            settings,
        )
    }

    fn scripted(kind: BackendKind, responses: Vec<Result<String, ()>>) -> Arc<ScriptedBackend> {
        Arc::new(ScriptedBackend {
            kind,
            responses: Mutex::new(responses),
            calls: AtomicUsize::new(0),
        })
    }

    fn request() -> ProgramRequest {
        serde_json::from_value(serde_json::json!({
            "goals": "General strength",
            "days_per_week": 2,
            "target_minutes": 20,
            "min_minutes": 15,
            "max_minutes": 25,
            "time_model": {
                "warmup_default_minutes": null,
                "cooldown_default_minutes": null
            }
        }))
        .unwrap()
    }

    const ANALYSIS: &str = r#"```json
{"summary": "Two full-body days.", "split": "full body", "sessions_per_week": 2,
 "session_focus": ["push", "pull"], "considerations": []}
```"#;

    fn blueprint_json() -> String {
        let session = |index: u32, day: &str| {
            serde_json::json!({
                "session_index": index,
                "day": day,
                "blocks": [
                    {"type": "main", "exercises": [
                        {"exercise_id": "bench", "sets": 4, "reps": "8-12", "rest_seconds": 90, "load": "RPE 8", "priority": 1}
                    ]},
                    {"type": "accessory", "exercises": [
                        {"exercise_id": "fly", "sets": 3, "reps": "12", "rest_seconds": 90, "load": "light", "priority": 3}
                    ]}
                ]
            })
        };
        format!(
            "Here you go:\n{}",
            serde_json::json!({"sessions": [session(0, "Monday"), session(1, "Thursday")]})
        )
    }

    #[tokio::test]
    async fn test_pipeline_runs_all_stages_and_fits() {
        let backend = scripted(
            BackendKind::Anthropic,
            vec![Ok(ANALYSIS.to_string()), Ok(blueprint_json())],
        );
        let llm = orchestrator(vec![backend.clone()]);

        let response = generate_program(&llm, request()).await.unwrap();

        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert_eq!(response.analysis.sessions_per_week, 2);
        assert_eq!(response.sessions.len(), 2);
        assert_eq!(response.fit_reports.len(), 2);
        assert!(!response.needs_review);
        for report in &response.fit_reports {
            assert_eq!(report.status, FitStatus::Ok);
            assert_eq!(report.actions.len(), 1);
        }
        assert_eq!(response.backends.analysis, BackendKind::Anthropic);
        assert_eq!(response.backends.blueprint, BackendKind::Anthropic);
    }

    #[tokio::test]
    async fn test_stage_backends_reflect_fallback() {
        let primary = scripted(BackendKind::Anthropic, vec![Ok(ANALYSIS.to_string()), Err(())]);
        let secondary = scripted(BackendKind::OpenAi, vec![Ok(blueprint_json())]);
        let llm = orchestrator(vec![primary, secondary]);

        let response = generate_program(&llm, request()).await.unwrap();
        assert_eq!(response.backends.analysis, BackendKind::Anthropic);
        assert_eq!(response.backends.blueprint, BackendKind::OpenAi);
    }

    #[tokio::test]
    async fn test_invalid_analysis_aborts_before_blueprint() {
        let wrong_count = r#"{"summary": "x", "split": "y", "sessions_per_week": 5, "session_focus": ["a"]}"#;
        let backend = scripted(
            BackendKind::Anthropic,
            vec![Ok(wrong_count.to_string()), Ok(blueprint_json())],
        );
        let llm = orchestrator(vec![backend.clone()]);

        let err = generate_program(&llm, request()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation {
                stage: PipelineStage::Analysis,
                ..
            }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unparseable_blueprint_is_validation_error() {
        let backend = scripted(
            BackendKind::Anthropic,
            vec![Ok(ANALYSIS.to_string()), Ok("I cannot help with that.".to_string())],
        );
        let llm = orchestrator(vec![backend]);

        let err = generate_program(&llm, request()).await.unwrap_err();
        match err {
            PipelineError::Validation { stage, message } => {
                assert_eq!(stage, PipelineStage::Blueprint);
                assert!(message.contains("I cannot help with that."));
            }
            other => panic!("expected blueprint validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_exhausted_backends_surface_as_generation_error() {
        let backend = scripted(BackendKind::Gemini, vec![Err(())]);
        let llm = orchestrator(vec![backend]);

        let err = generate_program(&llm, request()).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Generation {
                stage: PipelineStage::Analysis,
                source: LlmError::Exhausted { .. }
            }
        ));
    }

    #[tokio::test]
    async fn test_invalid_request_never_calls_backends() {
        let backend = scripted(BackendKind::Anthropic, vec![]);
        let llm = orchestrator(vec![backend.clone()]);
        let mut bad = request();
        bad.goals = "   ".to_string();

        let err = generate_program(&llm, bad).await.unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Validation {
                stage: PipelineStage::Request,
                ..
            }
        ));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_window_defaults_around_target() {
        let mut r = request();
        r.min_minutes = None;
        r.max_minutes = None;
        r.target_minutes = 45.0;
        assert_eq!(r.window(), DurationWindow::new(45.0, 40.0, 50.0));

        r.max_minutes = Some(60.0);
        assert_eq!(r.window(), DurationWindow::new(45.0, 40.0, 60.0));
    }
}
