//! Parsing of free-text weight and rep input.

use crate::error::ValidationError;
use once_cell::sync::Lazy;
use regex::Regex;

static WEIGHT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([1-9]\d*|0)(\.\d+)?([eE][+-]?\d+)?$").expect("weight pattern is valid")
});

static REPS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(0|[1-9]\d*)$").expect("reps pattern is valid"));

/// Parse a weight such as `100`, `12.5`, `12,5` or `1e2`.
///
/// A comma decimal separator is normalized to a period before matching.
/// Signs, blanks and non-finite values are rejected.
pub fn parse_weight(input: &str) -> Result<f64, ValidationError> {
    let normalized = input.trim().replace(',', ".");
    let invalid = || ValidationError::InvalidWeightFormat(input.to_string());

    if !WEIGHT_RE.is_match(&normalized) {
        return Err(invalid());
    }

    let weight: f64 = normalized.parse().map_err(|_| invalid())?;
    if !weight.is_finite() {
        return Err(invalid());
    }
    Ok(weight)
}

/// Parse a non-negative whole rep count
pub fn parse_reps(input: &str) -> Result<u32, ValidationError> {
    let trimmed = input.trim();
    let invalid = || ValidationError::InvalidRepsFormat(input.to_string());

    if !REPS_RE.is_match(trimmed) {
        return Err(invalid());
    }
    trimmed.parse().map_err(|_| invalid())
}

/// Trim an exercise name, rejecting blanks
pub fn normalize_exercise_name(input: &str) -> Result<String, ValidationError> {
    let name = input.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyExerciseName);
    }
    Ok(name.to_string())
}
