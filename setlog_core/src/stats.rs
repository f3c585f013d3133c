//! Statistics over a user's full training history.
//!
//! All trainings and sets are read once and aggregated in memory. Sets are
//! attributed to trainings purely by timestamp containment (see
//! [`Training::contains`]). Metrics that would need a division by an empty
//! collection come back as `None` ("no data") rather than a number.

use crate::{CatalogEntry, Error, Result, Training, UserLedger, WorkoutSet};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Serialize, Serializer};
use std::collections::{BTreeSet, HashSet};

/// Per-exercise metrics
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExerciseStats {
    pub exercise: String,
    /// Every set ever created for this exercise, finished or not
    pub total_sets: usize,
    /// Mean per-training count of contained sets, over all trainings
    pub average_sets_per_training: Option<f64>,
    /// Mean of recorded weights; sets without a weight are skipped
    pub average_weight: Option<f64>,
    /// Mean of recorded reps; sets without reps are skipped
    pub average_reps: Option<f64>,
}

/// Everything the report renderer needs, computed from one snapshot
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct StatsBundle {
    pub trainings_count: usize,
    /// Training start times, stable-sorted ascending
    pub training_starts: Vec<DateTime<Utc>>,
    /// Earliest and latest training start
    pub date_range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    /// Zero when no training has finished
    #[serde(serialize_with = "serialize_seconds")]
    pub average_training_duration: Duration,
    #[serde(serialize_with = "serialize_seconds")]
    pub total_training_time: Duration,
    pub total_sets: usize,
    pub most_popular_exercise: Option<String>,
    pub least_popular_exercise: Option<String>,
    pub average_exercises_per_training: Option<f64>,
    pub average_sets_per_training: Option<f64>,
    /// Longest run of consecutive calendar days (UTC) with a training
    pub longest_streak_days: u32,
    pub exercises: Vec<ExerciseStats>,
}

fn serialize_seconds<S: Serializer>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_i64(d.num_seconds())
}

impl StatsBundle {
    /// Exercise with the most sets
    pub fn most_popular(&self) -> Result<&str> {
        self.most_popular_exercise
            .as_deref()
            .ok_or_else(|| Error::InsufficientData("no sets recorded".into()))
    }

    /// Exercise with the fewest sets
    pub fn least_popular(&self) -> Result<&str> {
        self.least_popular_exercise
            .as_deref()
            .ok_or_else(|| Error::InsufficientData("no sets recorded".into()))
    }

    pub fn exercise(&self, name: &str) -> Option<&ExerciseStats> {
        self.exercises.iter().find(|e| e.exercise == name)
    }
}

/// Compute the statistics bundle for one user's ledger
pub fn compute_stats(ledger: &UserLedger) -> StatsBundle {
    aggregate(&ledger.catalog, &ledger.trainings, &ledger.sets)
}

/// Compute the statistics bundle from raw history
pub fn aggregate(
    catalog: &[CatalogEntry],
    trainings: &[Training],
    sets: &[WorkoutSet],
) -> StatsBundle {
    // Vec::sort is stable, so equal starts keep insertion order
    let mut training_starts: Vec<DateTime<Utc>> =
        trainings.iter().map(|t| t.started_at).collect();
    training_starts.sort();
    let date_range = training_starts
        .first()
        .zip(training_starts.last())
        .map(|(first, last)| (*first, *last));

    let durations: Vec<Duration> = trainings.iter().filter_map(Training::duration).collect();
    let total_training_time = durations
        .iter()
        .fold(Duration::zero(), |acc, d| acc + *d);
    let average_training_duration = if durations.is_empty() {
        Duration::zero()
    } else {
        Duration::milliseconds(total_training_time.num_milliseconds() / durations.len() as i64)
    };

    let counts = set_counts(sets);
    let (most_popular_exercise, least_popular_exercise) = popularity(&counts);

    // Sets attributed to each training, in training order
    let per_training: Vec<Vec<&WorkoutSet>> = trainings
        .iter()
        .map(|t| sets.iter().filter(|s| t.contains(s)).collect())
        .collect();

    let average_exercises_per_training = mean(per_training.iter().map(|contained| {
        contained
            .iter()
            .map(|s| s.exercise.as_str())
            .collect::<HashSet<_>>()
            .len() as f64
    }));
    let average_sets_per_training =
        mean(per_training.iter().map(|contained| contained.len() as f64));

    let exercises = exercise_names(catalog, sets)
        .into_iter()
        .map(|name| exercise_stats(name, sets, &per_training))
        .collect();

    let bundle = StatsBundle {
        trainings_count: trainings.len(),
        longest_streak_days: longest_streak(&training_starts),
        training_starts,
        date_range,
        average_training_duration,
        total_training_time,
        total_sets: sets.len(),
        most_popular_exercise,
        least_popular_exercise,
        average_exercises_per_training,
        average_sets_per_training,
        exercises,
    };

    tracing::debug!(
        "Aggregated {} trainings and {} sets into {} exercise rows",
        bundle.trainings_count,
        bundle.total_sets,
        bundle.exercises.len()
    );
    bundle
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

/// Set count per exercise, in order of first appearance
fn set_counts(sets: &[WorkoutSet]) -> Vec<(&str, usize)> {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for set in sets {
        match counts.iter().position(|(name, _)| *name == set.exercise) {
            Some(i) => counts[i].1 += 1,
            None => counts.push((set.exercise.as_str(), 1)),
        }
    }
    counts
}

/// Most and least used exercise; ties go to the first one seen
fn popularity(counts: &[(&str, usize)]) -> (Option<String>, Option<String>) {
    let mut descending = counts.to_vec();
    descending.sort_by(|a, b| b.1.cmp(&a.1));
    let mut ascending = counts.to_vec();
    ascending.sort_by_key(|(_, n)| *n);

    (
        descending.first().map(|(name, _)| name.to_string()),
        ascending.first().map(|(name, _)| name.to_string()),
    )
}

/// Catalog names in sequence order, then any names only seen on sets
fn exercise_names<'a>(catalog: &'a [CatalogEntry], sets: &'a [WorkoutSet]) -> Vec<&'a str> {
    let mut ordered: Vec<&CatalogEntry> = catalog.iter().collect();
    ordered.sort_by_key(|e| e.seq);

    let mut seen = HashSet::new();
    ordered
        .into_iter()
        .map(|e| e.name.as_str())
        .chain(sets.iter().map(|s| s.exercise.as_str()))
        .filter(|name| seen.insert(*name))
        .collect()
}

fn exercise_stats(
    name: &str,
    sets: &[WorkoutSet],
    per_training: &[Vec<&WorkoutSet>],
) -> ExerciseStats {
    let of_exercise = || sets.iter().filter(move |s| s.exercise == name);

    ExerciseStats {
        exercise: name.to_string(),
        total_sets: of_exercise().count(),
        average_sets_per_training: mean(per_training.iter().map(|contained| {
            contained.iter().filter(|s| s.exercise == name).count() as f64
        })),
        average_weight: mean(of_exercise().filter_map(|s| s.weight)),
        average_reps: mean(of_exercise().filter_map(|s| s.reps).map(f64::from)),
    }
}

fn longest_streak(starts: &[DateTime<Utc>]) -> u32 {
    let days: BTreeSet<NaiveDate> = starts.iter().map(|t| t.date_naive()).collect();

    let mut longest = 0;
    let mut current = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in days {
        current = match previous.and_then(|p| p.succ_opt()) {
            Some(next) if next == day => current + 1,
            _ => 1,
        };
        longest = longest.max(current);
        previous = Some(day);
    }
    longest
}
