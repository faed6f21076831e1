//! Session blueprint types — the not-yet-hydrated skeleton of a workout session.
//!
//! Exercise identifiers are opaque here. Resolving them into catalog entries happens
//! downstream; nothing in this crate looks them up.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A named session phase. Declaration order is not the fitting order — see
/// `fitting::engine` for the shrink/expand rankings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlockType {
    Warmup,
    Main,
    Accessory,
    Cardio,
    Cooldown,
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BlockType::Warmup => "warmup",
            BlockType::Main => "main",
            BlockType::Accessory => "accessory",
            BlockType::Cardio => "cardio",
            BlockType::Cooldown => "cooldown",
        };
        f.write_str(name)
    }
}

/// How protected an exercise is from automated adjustment.
///
/// Serialized as the bare integer 1, 2 or 3. Any other value fails deserialization,
/// so a blueprint with an out-of-range priority never reaches the fitting engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Priority {
    /// Load-bearing lift. Never touched by fitting.
    Protected = 1,
    Standard = 2,
    /// Filler — adjusted and removed first.
    Expendable = 3,
}

impl Priority {
    pub fn level(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for Priority {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Priority::Protected),
            2 => Ok(Priority::Standard),
            3 => Ok(Priority::Expendable),
            other => Err(format!("priority must be 1, 2 or 3 (got {other})")),
        }
    }
}

impl From<Priority> for u8 {
    fn from(priority: Priority) -> Self {
        priority.level()
    }
}

/// One exercise's prescription within a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExercisePrescription {
    pub exercise_id: String,
    pub sets: u32,
    /// Free-form: "8-12", "10", "45s", "30-45s", "6 min", "AMRAP".
    pub reps: String,
    /// Overrides the time model's rest-between-sets for this exercise only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_seconds: Option<f64>,
    #[serde(default)]
    pub load: String,
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(default)]
    pub exercises: Vec<ExercisePrescription>,
}

/// A single session of a weekly program. Block order and exercise order define the
/// execution sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionBlueprint {
    pub session_index: u32,
    /// Weekday label, e.g. "Monday".
    pub day: String,
    pub blocks: Vec<Block>,
}

impl SessionBlueprint {
    /// Exercises in execution order, paired with the block they belong to.
    pub fn exercises(&self) -> impl Iterator<Item = (BlockType, &ExercisePrescription)> + '_ {
        self.blocks
            .iter()
            .flat_map(|b| b.exercises.iter().map(move |e| (b.block_type, e)))
    }

    pub fn has_block(&self, block_type: BlockType) -> bool {
        self.blocks.iter().any(|b| b.block_type == block_type)
    }

    pub fn exercise_count(&self) -> usize {
        self.blocks.iter().map(|b| b.exercises.len()).sum()
    }
}
