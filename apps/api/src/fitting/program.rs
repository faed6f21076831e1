//! Program Fitting — applies the session engine to every session of a week.
//!
//! Each session is fit to the same absolute window in isolation; there is no shared
//! weekly budget.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::fitting::engine::{fit_session_to_duration, FitOptions, FitReport, FitStatus};
use crate::fitting::time_model::TimeModelConfig;
use crate::models::blueprint::SessionBlueprint;

/// Fitted sessions and their reports, index-aligned with the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramFitResult {
    pub sessions: Vec<SessionBlueprint>,
    pub reports: Vec<FitReport>,
}

impl ProgramFitResult {
    pub fn needs_review(&self) -> bool {
        self.reports
            .iter()
            .any(|r| r.status == FitStatus::NeedsReview)
    }
}

pub fn fit_program_to_duration(
    sessions: &[SessionBlueprint],
    config: &TimeModelConfig,
    options: &FitOptions,
) -> ProgramFitResult {
    let (sessions, reports): (Vec<_>, Vec<_>) = sessions
        .iter()
        .map(|session| fit_session_to_duration(session, config, options))
        .unzip();

    let flagged = reports
        .iter()
        .filter(|r| r.status == FitStatus::NeedsReview)
        .count();
    info!(
        sessions = sessions.len(),
        flagged, "Program fitting complete"
    );

    ProgramFitResult { sessions, reports }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fitting::engine::DurationWindow;
    use crate::models::blueprint::{Block, BlockType, ExercisePrescription, Priority};

    fn session(index: u32, accessory_sets: u32) -> SessionBlueprint {
        SessionBlueprint {
            session_index: index,
            day: ["Monday", "Wednesday", "Friday"][index as usize % 3].to_string(),
            blocks: vec![
                Block {
                    block_type: BlockType::Main,
                    exercises: vec![ExercisePrescription {
                        exercise_id: "bench".to_string(),
                        sets: 4,
                        reps: "8-12".to_string(),
                        rest_seconds: Some(90.0),
                        load: "RPE 8".to_string(),
                        priority: Priority::Protected,
                        note: None,
                    }],
                },
                Block {
                    block_type: BlockType::Accessory,
                    exercises: vec![ExercisePrescription {
                        exercise_id: "fly".to_string(),
                        sets: accessory_sets,
                        reps: "12".to_string(),
                        rest_seconds: Some(90.0),
                        load: String::new(),
                        priority: Priority::Expendable,
                        note: None,
                    }],
                },
            ],
        }
    }

    fn config() -> TimeModelConfig {
        TimeModelConfig {
            warmup_default_minutes: None,
            cooldown_default_minutes: None,
            ..TimeModelConfig::default()
        }
    }

    #[test]
    fn test_program_results_are_index_aligned() {
        let sessions = vec![session(0, 3), session(1, 6), session(2, 1)];
        let result = fit_program_to_duration(
            &sessions,
            &config(),
            &FitOptions::new(DurationWindow::new(20.0, 15.0, 25.0)),
        );

        assert_eq!(result.sessions.len(), 3);
        assert_eq!(result.reports.len(), 3);
        for (i, s) in result.sessions.iter().enumerate() {
            assert_eq!(s.session_index, i as u32);
        }
        assert!(!result.needs_review());
    }

    #[test]
    fn test_each_session_is_fit_independently() {
        let sessions = vec![session(0, 3), session(1, 6)];
        let options = FitOptions::new(DurationWindow::new(20.0, 15.0, 25.0));
        let result = fit_program_to_duration(&sessions, &config(), &options);

        let (solo, solo_report) = fit_session_to_duration(&sessions[1], &config(), &options);
        assert_eq!(result.sessions[1], solo);
        assert_eq!(result.reports[1], solo_report);
        // Session 1 already sits inside the window, so it is untouched.
        assert!(result.reports[1].actions.is_empty());
        assert_eq!(result.reports[0].actions.len(), 1);
    }

    #[test]
    fn test_needs_review_when_any_session_misses_window() {
        let sessions = vec![session(0, 3), session(1, 3)];
        let result = fit_program_to_duration(
            &sessions,
            &config(),
            &FitOptions::new(DurationWindow::new(90.0, 80.0, 100.0)),
        );
        assert!(result.needs_review());
    }

    #[test]
    fn test_empty_program() {
        let result = fit_program_to_duration(
            &[],
            &config(),
            &FitOptions::new(DurationWindow::new(20.0, 15.0, 25.0)),
        );
        assert!(result.sessions.is_empty());
        assert!(!result.needs_review());
    }
}
