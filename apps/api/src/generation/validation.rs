//! Stage-output validation. Each check collects every problem it finds so a rejected
//! generation can be diagnosed from one error.

use std::collections::HashSet;

use crate::generation::analysis::ProgramAnalysis;
use crate::generation::blueprint::ProgramBlueprint;
use crate::generation::pipeline::{PipelineError, PipelineStage, ProgramRequest};

pub const MAX_DAYS_PER_WEEK: u8 = 7;
/// Upper bound on sets the blueprint stage may prescribe for one exercise.
pub const MAX_PRESCRIBED_SETS: u32 = 10;

fn into_result(stage: PipelineStage, problems: Vec<String>) -> Result<(), PipelineError> {
    if problems.is_empty() {
        Ok(())
    } else {
        Err(PipelineError::Validation {
            stage,
            message: problems.join("; "),
        })
    }
}

pub fn validate_program_request(request: &ProgramRequest) -> Result<(), PipelineError> {
    let mut problems = Vec::new();

    if request.goals.trim().is_empty() {
        problems.push("goals cannot be empty".to_string());
    }
    if request.days_per_week == 0 || request.days_per_week > MAX_DAYS_PER_WEEK {
        problems.push(format!(
            "days_per_week must be between 1 and {MAX_DAYS_PER_WEEK} (got {})",
            request.days_per_week
        ));
    }
    if !request.target_minutes.is_finite() || request.target_minutes <= 0.0 {
        problems.push("target_minutes must be positive".to_string());
    }
    let window = request.window();
    if !window.is_valid() {
        problems.push(format!(
            "allowed window [{}, {}] is invalid",
            window.min_minutes, window.max_minutes
        ));
    }

    into_result(PipelineStage::Request, problems)
}

pub fn validate_analysis(
    analysis: &ProgramAnalysis,
    expected_sessions: u8,
) -> Result<(), PipelineError> {
    let mut problems = Vec::new();

    if analysis.summary.trim().is_empty() {
        problems.push("summary is empty".to_string());
    }
    if analysis.sessions_per_week != expected_sessions {
        problems.push(format!(
            "sessions_per_week is {} but {} training days were requested",
            analysis.sessions_per_week, expected_sessions
        ));
    }
    if analysis.session_focus.len() != analysis.sessions_per_week as usize {
        problems.push(format!(
            "session_focus has {} entries for {} sessions",
            analysis.session_focus.len(),
            analysis.sessions_per_week
        ));
    }

    into_result(PipelineStage::Analysis, problems)
}

pub fn validate_blueprint(
    blueprint: &ProgramBlueprint,
    expected_sessions: usize,
) -> Result<(), PipelineError> {
    let mut problems = Vec::new();

    if blueprint.sessions.len() != expected_sessions {
        problems.push(format!(
            "expected {expected_sessions} sessions, got {}",
            blueprint.sessions.len()
        ));
    }

    let mut seen = HashSet::new();
    for session in &blueprint.sessions {
        let label = format!("session {}", session.session_index);

        if !seen.insert(session.session_index) {
            problems.push(format!("{label}: duplicate session_index"));
        }
        if session.blocks.is_empty() {
            problems.push(format!("{label}: has no blocks"));
        } else if session.exercise_count() == 0 {
            problems.push(format!("{label}: has no exercises"));
        }

        for (block_type, exercise) in session.exercises() {
            let at = format!("{label} {block_type} '{}'", exercise.exercise_id);
            if exercise.exercise_id.trim().is_empty() {
                problems.push(format!("{label} {block_type}: exercise with empty exercise_id"));
            }
            if exercise.reps.trim().is_empty() {
                problems.push(format!("{at}: empty reps"));
            }
            if exercise.sets > MAX_PRESCRIBED_SETS {
                problems.push(format!(
                    "{at}: {} sets exceeds {MAX_PRESCRIBED_SETS}",
                    exercise.sets
                ));
            }
            if let Some(rest) = exercise.rest_seconds {
                if !rest.is_finite() || rest < 0.0 {
                    problems.push(format!("{at}: rest_seconds must be non-negative"));
                }
            }
        }
    }

    into_result(PipelineStage::Blueprint, problems)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::blueprint::{
        Block, BlockType, ExercisePrescription, Priority, SessionBlueprint,
    };

    fn request(days: u8) -> ProgramRequest {
        serde_json::from_value(serde_json::json!({
            "goals": "Get stronger",
            "days_per_week": days,
            "target_minutes": 45
        }))
        .unwrap()
    }

    fn analysis(sessions: u8, focus: usize) -> ProgramAnalysis {
        ProgramAnalysis {
            summary: "Full body.".to_string(),
            split: "full body".to_string(),
            sessions_per_week: sessions,
            session_focus: (0..focus).map(|i| format!("focus {i}")).collect(),
            considerations: vec![],
        }
    }

    fn session(index: u32, sets: u32, id: &str) -> SessionBlueprint {
        SessionBlueprint {
            session_index: index,
            day: "Monday".to_string(),
            blocks: vec![Block {
                block_type: BlockType::Main,
                exercises: vec![ExercisePrescription {
                    exercise_id: id.to_string(),
                    sets,
                    reps: "5".to_string(),
                    rest_seconds: None,
                    load: String::new(),
                    priority: Priority::Protected,
                    note: None,
                }],
            }],
        }
    }

    fn message(result: Result<(), PipelineError>) -> String {
        match result {
            Err(PipelineError::Validation { message, .. }) => message,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_request_passes() {
        assert!(validate_program_request(&request(3)).is_ok());
    }

    #[test]
    fn test_request_rejects_bad_days_and_window() {
        let mut r = request(0);
        r.min_minutes = Some(50.0);
        r.max_minutes = Some(40.0);
        let msg = message(validate_program_request(&r));
        assert!(msg.contains("days_per_week"));
        assert!(msg.contains("window"));
    }

    #[test]
    fn test_analysis_session_mismatch_is_rejected() {
        assert!(validate_analysis(&analysis(3, 3), 3).is_ok());
        let msg = message(validate_analysis(&analysis(4, 3), 3));
        assert!(msg.contains("sessions_per_week is 4"));
        assert!(msg.contains("session_focus has 3 entries"));
    }

    #[test]
    fn test_analysis_stage_is_reported() {
        match validate_analysis(&analysis(2, 2), 3) {
            Err(PipelineError::Validation { stage, .. }) => {
                assert_eq!(stage, PipelineStage::Analysis)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_blueprint_valid() {
        let blueprint = ProgramBlueprint {
            sessions: vec![session(0, 3, "squat"), session(1, 3, "bench")],
        };
        assert!(validate_blueprint(&blueprint, 2).is_ok());
    }

    #[test]
    fn test_blueprint_collects_every_problem() {
        let mut empty = session(1, 3, "row");
        empty.blocks.clear();
        let blueprint = ProgramBlueprint {
            sessions: vec![session(0, 12, ""), session(0, 3, "bench"), empty],
        };
        let msg = message(validate_blueprint(&blueprint, 2));
        assert!(msg.contains("expected 2 sessions, got 3"));
        assert!(msg.contains("empty exercise_id"));
        assert!(msg.contains("12 sets exceeds 10"));
        assert!(msg.contains("session 0: duplicate session_index"));
        assert!(msg.contains("session 1: has no blocks"));
    }

    #[test]
    fn test_blueprint_with_bad_priority_fails_to_parse() {
        let json = r#"{"sessions": [{"session_index": 0, "day": "Mon", "blocks": [
            {"type": "main", "exercises": [{"exercise_id": "squat", "sets": 3, "reps": "5", "priority": 7}]}
        ]}]}"#;
        assert!(serde_json::from_str::<ProgramBlueprint>(json).is_err());
    }
}
