//! Per-user facts and the conditional writes applied to them.
//!
//! Every mutation here checks its own precondition and writes in the same
//! call. Stores only ever run these inside [`WorkoutStore::transact`], which
//! holds the user's lock for the whole closure, so a guard can never be
//! satisfied by two racing requests.
//!
//! [`WorkoutStore::transact`]: crate::store::WorkoutStore::transact

use crate::{CatalogEntry, Precondition, Result, Training, UserId, WorkoutSet};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything stored about one user
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct UserLedger {
    pub user: UserId,
    #[serde(default)]
    pub registered_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub catalog: Vec<CatalogEntry>,
    /// In insertion order
    #[serde(default)]
    pub trainings: Vec<Training>,
    /// In insertion order; the last element is the most recent set
    #[serde(default)]
    pub sets: Vec<WorkoutSet>,
}

impl UserLedger {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            registered_at: None,
            catalog: Vec::new(),
            trainings: Vec::new(),
            sets: Vec::new(),
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registered_at.is_some()
    }

    pub fn latest_set(&self) -> Option<&WorkoutSet> {
        self.sets.last()
    }

    pub fn active_training(&self) -> Option<&Training> {
        self.trainings.iter().find(|t| t.is_active())
    }

    /// The started set whose end has not been recorded, if any
    pub fn running_set(&self) -> Option<&WorkoutSet> {
        self.sets.iter().rev().find(|s| s.is_running())
    }

    // ------------------------------------------------------------------------
    // Conditional writes
    // ------------------------------------------------------------------------

    pub fn register(&mut self, now: DateTime<Utc>) -> Result<()> {
        if self.is_registered() {
            return Err(Precondition::AlreadyRegistered.into());
        }
        self.registered_at = Some(now);
        Ok(())
    }

    /// Insert a training unless one is already running
    pub fn insert_training_unless_active(&mut self, now: DateTime<Utc>) -> Result<&Training> {
        if self.active_training().is_some() {
            return Err(Precondition::TrainingAlreadyActive.into());
        }
        self.trainings.push(Training::new(now));
        Ok(&self.trainings[self.trainings.len() - 1])
    }

    /// Set `end = now` on the running training
    pub fn end_active_training(&mut self, now: DateTime<Utc>) -> Result<&Training> {
        let training = self
            .trainings
            .iter_mut()
            .find(|t| t.is_active())
            .ok_or(Precondition::NoActiveTraining)?;
        training.ended_at = Some(now);
        Ok(training)
    }

    /// Append a fresh set carrying only the exercise name.
    ///
    /// Whatever state the previous set was in is left as is.
    pub fn insert_set(&mut self, exercise: String) -> &WorkoutSet {
        self.sets.push(WorkoutSet::new(exercise));
        &self.sets[self.sets.len() - 1]
    }

    /// Start the most recent set if it has an exercise and no start yet.
    ///
    /// Refuses while an older set is still running, which can happen when a
    /// new exercise was chosen mid-set.
    pub fn start_chosen_set(&mut self, now: DateTime<Utc>) -> Result<&WorkoutSet> {
        let chosen = matches!(
            self.latest_set(),
            Some(set) if !set.exercise.is_empty() && set.started_at.is_none()
        );
        if !chosen {
            return Err(Precondition::NoExerciseChosen.into());
        }
        if self.running_set().is_some() {
            return Err(Precondition::SetAlreadyActive.into());
        }

        let set = self
            .sets
            .last_mut()
            .ok_or(Precondition::NoExerciseChosen)?;
        set.started_at = Some(now);
        Ok(set)
    }

    /// Set `end = now` on the running set
    pub fn end_active_set(&mut self, now: DateTime<Utc>) -> Result<&WorkoutSet> {
        let set = self
            .sets
            .iter_mut()
            .rev()
            .find(|s| s.is_running())
            .ok_or(Precondition::NoActiveSet)?;
        set.ended_at = Some(now);
        Ok(set)
    }

    /// Record the weight on the most recent set once it has ended
    pub fn record_weight_on_latest(&mut self, weight: f64) -> Result<&WorkoutSet> {
        let set = self
            .sets
            .last_mut()
            .filter(|s| s.ended_at.is_some() && s.weight.is_none())
            .ok_or(Precondition::NotAwaitingWeight)?;
        set.weight = Some(weight);
        Ok(set)
    }

    /// Record reps on the most recent set once its weight is known
    pub fn record_reps_on_latest(&mut self, reps: u32) -> Result<&WorkoutSet> {
        let set = self
            .sets
            .last_mut()
            .filter(|s| s.ended_at.is_some() && s.weight.is_some() && s.reps.is_none())
            .ok_or(Precondition::NotAwaitingReps)?;
        set.reps = Some(reps);
        Ok(set)
    }

    /// Append a catalog entry with the next sequence number
    pub fn append_catalog_entry(&mut self, name: String) -> &CatalogEntry {
        let seq = self.catalog.iter().map(|e| e.seq).max().unwrap_or(0) + 1;
        self.catalog.push(CatalogEntry { name, seq });
        &self.catalog[self.catalog.len() - 1]
    }
}
