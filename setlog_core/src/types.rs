//! Core domain types for the setlog system.
//!
//! This module defines the persisted facts the engine works from:
//! - Users and their exercise catalog
//! - Trainings and the sets performed in them
//! - The derived interaction stage

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identity
// ============================================================================

/// Stable identifier of a user, as issued by the transport
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for UserId {
    fn from(id: i64) -> Self {
        UserId(id)
    }
}

// ============================================================================
// Catalog
// ============================================================================

/// One exercise name in a user's catalog
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    /// Per-user sequence number, starting at 1
    pub seq: u32,
}

// ============================================================================
// Trainings and Sets
// ============================================================================

/// A bounded workout session
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct Training {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl Training {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            started_at,
            ended_at: None,
        }
    }

    pub fn is_active(&self) -> bool {
        self.ended_at.is_none()
    }

    /// Elapsed time of a finished training
    pub fn duration(&self) -> Option<Duration> {
        self.ended_at.map(|end| end - self.started_at)
    }

    /// Whether a set falls inside this training's window.
    ///
    /// There is no stored link between the two; a set belongs to a training
    /// when `set.start >= training.start` and `set.end <= training.end`.
    /// Any missing timestamp makes the comparison false, so sets of a still
    /// running training are not attributed to it.
    pub fn contains(&self, set: &WorkoutSet) -> bool {
        match (set.started_at, set.ended_at, self.ended_at) {
            (Some(start), Some(end), Some(training_end)) => {
                start >= self.started_at && end <= training_end
            }
            _ => false,
        }
    }
}

/// One timed unit of exercise work.
///
/// Filled in progressively: exercise, then start, end, weight, reps.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct WorkoutSet {
    pub id: Uuid,
    pub exercise: String,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    pub weight: Option<f64>,
    pub reps: Option<u32>,
}

impl WorkoutSet {
    pub fn new(exercise: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            exercise: exercise.into(),
            started_at: None,
            ended_at: None,
            weight: None,
            reps: None,
        }
    }

    /// Started but not yet ended
    pub fn is_running(&self) -> bool {
        self.started_at.is_some() && self.ended_at.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.ended_at.is_some() && self.weight.is_some() && self.reps.is_some()
    }
}

// ============================================================================
// Stage
// ============================================================================

/// Where a user is in the training/set lifecycle.
///
/// Never stored; always derived from the ledger by
/// [`derive_stage`](crate::session::derive_stage).
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Idle,
    TrainingActive,
    ExerciseChosen,
    SetActive,
    AwaitingWeight,
    AwaitingReps,
}

impl Stage {
    /// Whether the next free-text message from the user is expected input
    pub fn expects_input(&self) -> bool {
        matches!(self, Stage::AwaitingWeight | Stage::AwaitingReps)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Idle => "idle",
            Stage::TrainingActive => "training active",
            Stage::ExerciseChosen => "exercise chosen",
            Stage::SetActive => "set active",
            Stage::AwaitingWeight => "awaiting weight",
            Stage::AwaitingReps => "awaiting reps",
        };
        f.write_str(s)
    }
}

/// User-facing actions the transport can offer
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    StartTraining,
    EndTraining,
    AddExercise,
    ChooseExercise,
    StartSet,
    EndSet,
    EnterWeight,
    EnterReps,
    ShowStats,
}
