//! Program analysis — first pipeline stage. Turns the trainee's request into a weekly
//! outline that the blueprint stage builds on.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::pipeline::{run_stage, PipelineError, PipelineStage, ProgramRequest};
use crate::generation::prompts::{ANALYSIS_PROMPT_TEMPLATE, ANALYSIS_SYSTEM};
use crate::generation::validation::validate_analysis;
use crate::llm_client::{BackendKind, GenerationRequest, LlmOrchestrator};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramAnalysis {
    pub summary: String,
    pub split: String,
    pub sessions_per_week: u8,
    pub session_focus: Vec<String>,
    #[serde(default)]
    pub considerations: Vec<String>,
}

pub(crate) fn build_analysis_request(request: &ProgramRequest) -> GenerationRequest {
    let equipment = if request.equipment.is_empty() {
        "bodyweight only".to_string()
    } else {
        request.equipment.join(", ")
    };
    let experience = if request.experience.trim().is_empty() {
        "not specified"
    } else {
        request.experience.as_str()
    };

    let prompt = ANALYSIS_PROMPT_TEMPLATE
        .replace("{goals}", &request.goals)
        .replace("{experience}", experience)
        .replace("{equipment}", &equipment)
        .replace("{days_per_week}", &request.days_per_week.to_string())
        .replace("{target_minutes}", &request.target_minutes.to_string());

    GenerationRequest::new(ANALYSIS_SYSTEM, prompt)
        .json()
        .with_max_tokens(1500)
        .with_temperature(0.3)
        .with_backend(request.backend)
}

/// Runs the analysis stage and validates its output against the request.
pub async fn analyze_program(
    llm: &LlmOrchestrator,
    request: &ProgramRequest,
) -> Result<(ProgramAnalysis, BackendKind), PipelineError> {
    let generation = build_analysis_request(request);
    let (analysis, backend): (ProgramAnalysis, _) =
        run_stage(llm, PipelineStage::Analysis, &generation).await?;

    validate_analysis(&analysis, request.days_per_week)?;

    info!(
        backend = %backend,
        split = %analysis.split,
        sessions = analysis.sessions_per_week,
        "Program analysis accepted"
    );
    Ok((analysis, backend))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::ResponseShape;

    fn request() -> ProgramRequest {
        serde_json::from_value(serde_json::json!({
            "goals": "Build strength for hiking",
            "days_per_week": 3,
            "target_minutes": 45,
            "backend": "gemini"
        }))
        .unwrap()
    }

    #[test]
    fn test_analysis_request_fills_template() {
        let generation = build_analysis_request(&request());
        assert_eq!(generation.shape, ResponseShape::Json);
        assert_eq!(generation.backend, Some(BackendKind::Gemini));
        assert!(generation.prompt.contains("Build strength for hiking"));
        assert!(generation.prompt.contains("bodyweight only"));
        assert!(generation.prompt.contains("\"sessions_per_week\": 3"));
        assert!(!generation.prompt.contains("{goals}"));
    }

    #[test]
    fn test_program_analysis_deserializes_without_considerations() {
        let json = r#"{
            "summary": "Full-body strength three times a week.",
            "split": "full body",
            "sessions_per_week": 3,
            "session_focus": ["squat", "hinge", "single-leg"]
        }"#;
        let analysis: ProgramAnalysis = serde_json::from_str(json).unwrap();
        assert_eq!(analysis.sessions_per_week, 3);
        assert!(analysis.considerations.is_empty());
    }
}
