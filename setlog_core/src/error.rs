//! Error types for the setlog_core library.

use std::io;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Malformed user input. The caller re-prompts for the same kind of input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid weight {0:?}: expected a non-negative number such as 12.5 or 12,5")]
    InvalidWeightFormat(String),

    #[error("invalid reps {0:?}: expected a non-negative whole number")]
    InvalidRepsFormat(String),

    #[error("exercise name must not be empty")]
    EmptyExerciseName,
}

/// An action that is not legal in the user's current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Precondition {
    #[error("user is already registered")]
    AlreadyRegistered,

    #[error("a training is already in progress")]
    TrainingAlreadyActive,

    #[error("no training is in progress")]
    NoActiveTraining,

    #[error("no exercise has been chosen for the next set")]
    NoExerciseChosen,

    #[error("no set is in progress")]
    NoActiveSet,

    #[error("an earlier set is still running and must be ended first")]
    SetAlreadyActive,

    #[error("not waiting for a weight")]
    NotAwaitingWeight,

    #[error("not waiting for a rep count")]
    NotAwaitingReps,

    #[error("no input is expected right now")]
    NotAwaitingInput,
}

/// Core error type for setlog_core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Input did not match the expected format
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Action is not allowed in the current stage
    #[error("Precondition violated: {0}")]
    Precondition(#[from] Precondition),

    /// Not enough history to compute a metric
    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    /// The workout store could not complete the request
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// TOML parsing error
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration validation error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// True when the user can recover by re-entering input or picking another action.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::Validation(_) | Error::Precondition(_) | Error::InsufficientData(_)
        )
    }

    /// The precondition that failed, if this is a precondition error
    pub fn precondition(&self) -> Option<Precondition> {
        match self {
            Error::Precondition(p) => Some(*p),
            _ => None,
        }
    }

    /// Collapse infrastructure failures raised inside a store backend into
    /// `StoreUnavailable`, leaving domain errors untouched.
    pub(crate) fn into_store_error(self) -> Self {
        match self {
            Error::Io(e) => Error::StoreUnavailable(e.to_string()),
            Error::Json(e) => Error::StoreUnavailable(format!("corrupt record: {}", e)),
            other => other,
        }
    }
}
