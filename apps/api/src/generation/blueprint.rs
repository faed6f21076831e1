//! Blueprint generation — second pipeline stage. Produces the session skeletons the
//! fitting engine adjusts.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::generation::analysis::ProgramAnalysis;
use crate::generation::pipeline::{
    run_stage, PipelineError, PipelineStage, ProgramRequest,
};
use crate::generation::prompts::{BLUEPRINT_PROMPT_TEMPLATE, BLUEPRINT_SYSTEM};
use crate::generation::validation::validate_blueprint;
use crate::llm_client::{BackendKind, GenerationRequest, LlmOrchestrator};
use crate::models::blueprint::SessionBlueprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramBlueprint {
    pub sessions: Vec<SessionBlueprint>,
}

pub(crate) fn build_blueprint_request(
    request: &ProgramRequest,
    analysis: &ProgramAnalysis,
) -> Result<GenerationRequest, PipelineError> {
    let analysis_json =
        serde_json::to_string_pretty(analysis).map_err(|e| PipelineError::Validation {
            stage: PipelineStage::Blueprint,
            message: format!("Failed to serialize analysis: {e}"),
        })?;
    let equipment = if request.equipment.is_empty() {
        "bodyweight only".to_string()
    } else {
        request.equipment.join(", ")
    };
    let sessions = analysis.sessions_per_week;

    let prompt = BLUEPRINT_PROMPT_TEMPLATE
        .replace("{analysis_json}", &analysis_json)
        .replace("{equipment}", &equipment)
        .replace("{target_minutes}", &request.target_minutes.to_string())
        .replace("{sessions_per_week}", &sessions.to_string())
        .replace("{last_index}", &sessions.saturating_sub(1).to_string());

    Ok(GenerationRequest::new(BLUEPRINT_SYSTEM, prompt)
        .json()
        .with_max_tokens(8192)
        .with_temperature(0.4)
        .with_backend(request.backend))
}

/// Runs the blueprint stage and validates its output against the analysis.
pub async fn generate_blueprint(
    llm: &LlmOrchestrator,
    request: &ProgramRequest,
    analysis: &ProgramAnalysis,
) -> Result<(ProgramBlueprint, BackendKind), PipelineError> {
    let generation = build_blueprint_request(request, analysis)?;
    let (blueprint, backend): (ProgramBlueprint, _) =
        run_stage(llm, PipelineStage::Blueprint, &generation).await?;

    validate_blueprint(&blueprint, analysis.sessions_per_week as usize)?;

    info!(
        backend = %backend,
        sessions = blueprint.sessions.len(),
        exercises = blueprint.sessions.iter().map(|s| s.exercise_count()).sum::<usize>(),
        "Program blueprint accepted"
    );
    Ok((blueprint, backend))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blueprint_request_embeds_analysis_and_counts() {
        let request: ProgramRequest = serde_json::from_value(serde_json::json!({
            "goals": "Hypertrophy",
            "equipment": ["barbell", "dumbbells"],
            "days_per_week": 4,
            "target_minutes": 60
        }))
        .unwrap();
        let analysis = ProgramAnalysis {
            summary: "Upper/lower twice a week.".to_string(),
            split: "upper/lower".to_string(),
            sessions_per_week: 4,
            session_focus: vec!["upper".into(), "lower".into(), "upper".into(), "lower".into()],
            considerations: vec![],
        };

        let generation = build_blueprint_request(&request, &analysis).unwrap();
        assert!(generation.prompt.contains("upper/lower"));
        assert!(generation.prompt.contains("barbell, dumbbells"));
        assert!(generation.prompt.contains("Exactly 4 sessions, session_index 0..3"));
        assert!(generation.backend.is_none());
    }
}
