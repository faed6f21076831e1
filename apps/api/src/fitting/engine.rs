//! Session Fitting Engine — deterministically adjusts a session so its estimated
//! duration lands inside an allowed window.
//!
//! # Algorithm
//! - Shrink while over `max_minutes`: take one set from the most expendable candidate
//!   (priority 3 before 2, then cardio < accessory < warmup < cooldown < main). When no
//!   set can be taken, remove one whole priority-3 exercise (never from `main` unless
//!   the policy allows it). Stop when neither is possible.
//! - Expand while under `min_minutes`: add one set to the first candidate (priority 2
//!   before 3, then accessory < main < cardio < other) that is below its cap.
//! - Priority-1 exercises are never touched.
//!
//! Exactly one adjustment is applied between re-estimates, so identical input always
//! yields identical output. The engine works on its own clone and never fails: an
//! unreachable window produces a valid session marked `NeedsReview`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::fitting::time_model::{estimate_session_minutes, TimeModelConfig};
use crate::models::blueprint::{BlockType, Priority, SessionBlueprint};

/// Hard cap on adjustments per phase.
pub const MAX_ITERATIONS: usize = 500;
pub const DEFAULT_MIN_SETS: u32 = 1;
pub const DEFAULT_MAX_SETS: u32 = 6;
/// Window half-width used when a caller gives only a target.
pub const DEFAULT_WINDOW_TOLERANCE_MINUTES: f64 = 5.0;

// ────────────────────────────────────────────────────────────────────────────
// Inputs
// ────────────────────────────────────────────────────────────────────────────

/// Target duration and the window considered acceptable, in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DurationWindow {
    pub target_minutes: f64,
    pub min_minutes: f64,
    pub max_minutes: f64,
}

impl DurationWindow {
    pub fn new(target_minutes: f64, min_minutes: f64, max_minutes: f64) -> Self {
        Self {
            target_minutes,
            min_minutes,
            max_minutes,
        }
    }

    /// Symmetric window of `tolerance_minutes` either side of the target.
    pub fn around(target_minutes: f64, tolerance_minutes: f64) -> Self {
        Self::new(
            target_minutes,
            (target_minutes - tolerance_minutes).max(0.0),
            target_minutes + tolerance_minutes,
        )
    }

    /// Explicit bounds win; missing ones default to target ± 5 minutes.
    pub fn from_bounds(target_minutes: f64, min_minutes: Option<f64>, max_minutes: Option<f64>) -> Self {
        let fallback = Self::around(target_minutes, DEFAULT_WINDOW_TOLERANCE_MINUTES);
        Self::new(
            target_minutes,
            min_minutes.unwrap_or(fallback.min_minutes),
            max_minutes.unwrap_or(fallback.max_minutes),
        )
    }

    /// Finite, non-negative and ordered.
    pub fn is_valid(&self) -> bool {
        self.min_minutes.is_finite()
            && self.max_minutes.is_finite()
            && self.min_minutes >= 0.0
            && self.min_minutes <= self.max_minutes
    }

    pub fn contains(&self, minutes: f64) -> bool {
        minutes >= self.min_minutes && minutes <= self.max_minutes
    }
}

/// Per-exercise bounds on the set count. Missing fields use the engine defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SetCaps {
    pub min_sets: u32,
    pub max_sets: u32,
}

impl Default for SetCaps {
    fn default() -> Self {
        Self {
            min_sets: DEFAULT_MIN_SETS,
            max_sets: DEFAULT_MAX_SETS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitOptions {
    pub window: DurationWindow,
    /// Keyed by exercise identifier.
    #[serde(default)]
    pub set_caps: HashMap<String, SetCaps>,
    #[serde(default)]
    pub allow_main_removal: bool,
}

impl FitOptions {
    pub fn new(window: DurationWindow) -> Self {
        Self {
            window,
            set_caps: HashMap::new(),
            allow_main_removal: false,
        }
    }

    fn caps_for(&self, exercise_id: &str) -> SetCaps {
        self.set_caps.get(exercise_id).copied().unwrap_or_default()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Report
// ────────────────────────────────────────────────────────────────────────────

/// One atomic adjustment applied by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FitAction {
    ReduceSets {
        exercise_id: String,
        block: BlockType,
        from_sets: u32,
        to_sets: u32,
    },
    AddSets {
        exercise_id: String,
        block: BlockType,
        from_sets: u32,
        to_sets: u32,
    },
    RemoveExercise {
        exercise_id: String,
        block: BlockType,
        sets: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitStatus {
    Ok,
    NeedsReview,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub before_minutes: f64,
    pub after_minutes: f64,
    pub target_minutes: f64,
    pub allowed_min: f64,
    pub allowed_max: f64,
    pub actions: Vec<FitAction>,
    pub status: FitStatus,
}

// ────────────────────────────────────────────────────────────────────────────
// Ordering
// ────────────────────────────────────────────────────────────────────────────

/// Which blocks give up sets (and exercises) first when shrinking.
fn shrink_rank(block: BlockType) -> u8 {
    match block {
        BlockType::Cardio => 0,
        BlockType::Accessory => 1,
        BlockType::Warmup => 2,
        BlockType::Cooldown => 3,
        BlockType::Main => 4,
    }
}

/// Which blocks receive sets first when expanding.
fn expand_rank(block: BlockType) -> u8 {
    match block {
        BlockType::Accessory => 0,
        BlockType::Main => 1,
        BlockType::Cardio => 2,
        BlockType::Warmup | BlockType::Cooldown => 3,
    }
}

/// Position of an exercise inside the session being fitted.
#[derive(Debug, Clone, Copy)]
struct Slot {
    block_idx: usize,
    exercise_idx: usize,
    block: BlockType,
    priority: Priority,
}

fn adjustable_slots(session: &SessionBlueprint) -> Vec<Slot> {
    session
        .blocks
        .iter()
        .enumerate()
        .flat_map(|(block_idx, block)| {
            block
                .exercises
                .iter()
                .enumerate()
                .map(move |(exercise_idx, e)| Slot {
                    block_idx,
                    exercise_idx,
                    block: block.block_type,
                    priority: e.priority,
                })
        })
        .filter(|s| s.priority != Priority::Protected)
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry point
// ────────────────────────────────────────────────────────────────────────────

/// Fits one session to `options.window`. Returns a new session and its report; the
/// input is left untouched.
pub fn fit_session_to_duration(
    session: &SessionBlueprint,
    config: &TimeModelConfig,
    options: &FitOptions,
) -> (SessionBlueprint, FitReport) {
    let mut fitted = session.clone();
    let window = options.window;
    let before_minutes = estimate_session_minutes(&fitted, config);
    let mut actions = Vec::new();

    let mut minutes = before_minutes;
    let mut iterations = 0;
    while minutes > window.max_minutes && iterations < MAX_ITERATIONS {
        iterations += 1;
        match shrink_step(&mut fitted, options) {
            Some(action) => {
                debug!(?action, minutes, "fit: shrink step");
                actions.push(action);
                minutes = estimate_session_minutes(&fitted, config);
            }
            None => break,
        }
    }

    iterations = 0;
    while minutes < window.min_minutes && iterations < MAX_ITERATIONS {
        iterations += 1;
        match expand_step(&mut fitted, options) {
            Some(action) => {
                debug!(?action, minutes, "fit: expand step");
                actions.push(action);
                minutes = estimate_session_minutes(&fitted, config);
            }
            None => break,
        }
    }

    let status = if window.contains(minutes) {
        FitStatus::Ok
    } else {
        FitStatus::NeedsReview
    };

    let report = FitReport {
        before_minutes,
        after_minutes: minutes,
        target_minutes: window.target_minutes,
        allowed_min: window.min_minutes,
        allowed_max: window.max_minutes,
        actions,
        status,
    };

    (fitted, report)
}

/// Applies one shrink adjustment, or returns `None` when nothing more can go.
fn shrink_step(session: &mut SessionBlueprint, options: &FitOptions) -> Option<FitAction> {
    let mut candidates = adjustable_slots(session);
    // Stable sort: equal keys keep execution order.
    candidates.sort_by_key(|s| (std::cmp::Reverse(s.priority), shrink_rank(s.block)));

    for slot in &candidates {
        let exercise = &mut session.blocks[slot.block_idx].exercises[slot.exercise_idx];
        let caps = options.caps_for(&exercise.exercise_id);
        if exercise.sets > caps.min_sets {
            let from_sets = exercise.sets;
            exercise.sets -= 1;
            return Some(FitAction::ReduceSets {
                exercise_id: exercise.exercise_id.clone(),
                block: slot.block,
                from_sets,
                to_sets: exercise.sets,
            });
        }
    }

    let removable = candidates
        .iter()
        .filter(|s| s.priority == Priority::Expendable)
        .filter(|s| s.block != BlockType::Main || options.allow_main_removal)
        .min_by_key(|s| shrink_rank(s.block))
        .copied()?;

    let removed = session.blocks[removable.block_idx]
        .exercises
        .remove(removable.exercise_idx);
    Some(FitAction::RemoveExercise {
        exercise_id: removed.exercise_id,
        block: removable.block,
        sets: removed.sets,
    })
}

/// Applies one expand adjustment, or returns `None` when every candidate is capped.
fn expand_step(session: &mut SessionBlueprint, options: &FitOptions) -> Option<FitAction> {
    let mut candidates = adjustable_slots(session);
    candidates.sort_by_key(|s| (s.priority, expand_rank(s.block)));

    for slot in &candidates {
        let exercise = &mut session.blocks[slot.block_idx].exercises[slot.exercise_idx];
        let caps = options.caps_for(&exercise.exercise_id);
        if exercise.sets < caps.max_sets {
            let from_sets = exercise.sets;
            exercise.sets += 1;
            return Some(FitAction::AddSets {
                exercise_id: exercise.exercise_id.clone(),
                block: slot.block,
                from_sets,
                to_sets: exercise.sets,
            });
        }
    }

    None
}
