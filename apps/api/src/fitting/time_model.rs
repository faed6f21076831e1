//! Time Estimation Model — converts rep schemes and rest parameters into seconds.
//!
//! Every function here is total: an unparseable reps string or a nonsensical config
//! value falls back to a documented default instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::models::blueprint::{BlockType, ExercisePrescription, SessionBlueprint};

pub const DEFAULT_WORK_SECONDS_PER_10_REPS: f64 = 30.0;
pub const DEFAULT_REST_BETWEEN_SETS_SECONDS: f64 = 90.0;
pub const DEFAULT_REST_BETWEEN_EXERCISES_SECONDS: f64 = 120.0;
pub const DEFAULT_WARMUP_MINUTES: f64 = 8.0;
pub const DEFAULT_COOLDOWN_MINUTES: f64 = 5.0;

// "6 min", "5-8 minutes"
static MINUTES_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(?:\s*-\s*(\d+(?:\.\d+)?))?\s*(?:minutes|minute|mins|min)\b")
        .expect("Valid regex pattern")
});

// "45s", "30-45s", "60 sec"
static SECONDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+(?:\.\d+)?)(?:\s*-\s*(\d+(?:\.\d+)?))?\s*(?:seconds|second|secs|sec|s)\b")
        .expect("Valid regex pattern")
});

// "3x10", "4 x 8-12": the leading set count is dropped, the rest is parsed as reps.
static SETS_PREFIX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s*[x×]\s*(\d.*)$").expect("Valid regex pattern"));

// "8-12"
static RANGE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)\s*-\s*(\d+)").expect("Valid regex pattern"));

// "10"
static COUNT_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)").expect("Valid regex pattern"));

/// Numeric time model supplied by the user-configuration collaborator.
///
/// Missing fields deserialize to the documented defaults. An explicit `null` for
/// `warmup_default_minutes` / `cooldown_default_minutes` disables that allowance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimeModelConfig {
    pub work_seconds_per_10_reps: f64,
    pub rest_between_sets_seconds: f64,
    pub rest_between_exercises_seconds: f64,
    pub warmup_default_minutes: Option<f64>,
    pub cooldown_default_minutes: Option<f64>,
}

impl Default for TimeModelConfig {
    fn default() -> Self {
        Self {
            work_seconds_per_10_reps: DEFAULT_WORK_SECONDS_PER_10_REPS,
            rest_between_sets_seconds: DEFAULT_REST_BETWEEN_SETS_SECONDS,
            rest_between_exercises_seconds: DEFAULT_REST_BETWEEN_EXERCISES_SECONDS,
            warmup_default_minutes: Some(DEFAULT_WARMUP_MINUTES),
            cooldown_default_minutes: Some(DEFAULT_COOLDOWN_MINUTES),
        }
    }
}

impl TimeModelConfig {
    /// Replaces negative or non-finite values with their defaults. Work time must also
    /// be strictly positive so per-set estimates stay positive.
    pub fn sanitized(&self) -> Self {
        Self {
            work_seconds_per_10_reps: positive_or(
                self.work_seconds_per_10_reps,
                DEFAULT_WORK_SECONDS_PER_10_REPS,
            ),
            rest_between_sets_seconds: non_negative_or(
                self.rest_between_sets_seconds,
                DEFAULT_REST_BETWEEN_SETS_SECONDS,
            ),
            rest_between_exercises_seconds: non_negative_or(
                self.rest_between_exercises_seconds,
                DEFAULT_REST_BETWEEN_EXERCISES_SECONDS,
            ),
            warmup_default_minutes: self
                .warmup_default_minutes
                .map(|m| non_negative_or(m, DEFAULT_WARMUP_MINUTES)),
            cooldown_default_minutes: self
                .cooldown_default_minutes
                .map(|m| non_negative_or(m, DEFAULT_COOLDOWN_MINUTES)),
        }
    }
}

fn positive_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        default
    }
}

fn non_negative_or(value: f64, default: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        default
    }
}

/// Upper bound of a `(low)(-high)?` capture pair.
fn upper_bound(caps: &regex::Captures<'_>) -> Option<f64> {
    let low = caps.get(1)?.as_str().parse::<f64>().ok()?;
    let high = caps
        .get(2)
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(low);
    Some(low.max(high))
}

/// Estimated seconds of work for one set.
///
/// A leading `NxM` set count is ignored. Reps are then interpreted, in order, as a minute duration, a second duration, a rep range
/// (upper bound, for a conservative estimate) or a single rep count. Rep counts scale
/// `work_seconds_per_10_reps` linearly. Anything else costs `work_seconds_per_10_reps`.
pub fn estimate_work_seconds_per_set(reps: &str, config: &TimeModelConfig) -> f64 {
    let config = config.sanitized();
    let fallback = config.work_seconds_per_10_reps;
    let reps = reps.trim().to_lowercase();
    let reps = SETS_PREFIX_PATTERN.replace(&reps, "$1");

    let parsed = if let Some(caps) = MINUTES_PATTERN.captures(&reps) {
        upper_bound(&caps).map(|m| m * 60.0)
    } else if let Some(caps) = SECONDS_PATTERN.captures(&reps) {
        upper_bound(&caps)
    } else if let Some(caps) = RANGE_PATTERN.captures(&reps) {
        upper_bound(&caps).map(|r| r / 10.0 * config.work_seconds_per_10_reps)
    } else if let Some(caps) = COUNT_PATTERN.captures(&reps) {
        upper_bound(&caps).map(|r| r / 10.0 * config.work_seconds_per_10_reps)
    } else {
        None
    };

    match parsed {
        Some(seconds) if seconds.is_finite() && seconds > 0.0 => seconds,
        _ => fallback,
    }
}

/// Work for every set plus rest between sets. A single set never incurs rest.
pub fn estimate_exercise_seconds(exercise: &ExercisePrescription, config: &TimeModelConfig) -> f64 {
    let config = config.sanitized();
    let rest = exercise
        .rest_seconds
        .filter(|r| r.is_finite() && *r >= 0.0)
        .unwrap_or(config.rest_between_sets_seconds);
    let sets = exercise.sets as f64;
    let rest_intervals = exercise.sets.saturating_sub(1) as f64;

    sets * estimate_work_seconds_per_set(&exercise.reps, &config) + rest_intervals * rest
}

/// Full session cost: every exercise, a transition rest between each consecutive pair,
/// and the configured warmup/cooldown allowance when the session has no such block.
///
/// Adding work to an existing block never lowers the total. Adding the first warmup or
/// cooldown block can: its exercises replace the flat allowance.
pub fn estimate_session_seconds(session: &SessionBlueprint, config: &TimeModelConfig) -> f64 {
    let config = config.sanitized();

    let mut total = 0.0;
    let mut count = 0usize;
    for (_, exercise) in session.exercises() {
        total += estimate_exercise_seconds(exercise, &config);
        count += 1;
    }
    total += count.saturating_sub(1) as f64 * config.rest_between_exercises_seconds;

    if !session.has_block(BlockType::Warmup) {
        total += config.warmup_default_minutes.unwrap_or(0.0) * 60.0;
    }
    if !session.has_block(BlockType::Cooldown) {
        total += config.cooldown_default_minutes.unwrap_or(0.0) * 60.0;
    }

    total
}

pub fn estimate_session_minutes(session: &SessionBlueprint, config: &TimeModelConfig) -> f64 {
    estimate_session_seconds(session, config) / 60.0
}
