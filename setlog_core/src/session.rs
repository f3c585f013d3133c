//! Session state inference and transitions.
//!
//! Nothing about "where the user is" lives in memory between turns. Each call
//! re-derives the stage from the stored ledger, and each mutation runs its
//! guard and write inside one store transaction.

use crate::catalog::CatalogPage;
use crate::input::{normalize_exercise_name, parse_reps, parse_weight};
use crate::stats::{compute_stats, StatsBundle};
use crate::store::WorkoutStore;
use crate::{Action, Error, Precondition, Result, Stage, UserId, UserLedger};
use chrono::{DateTime, Utc};
use std::sync::Mutex;

// ============================================================================
// Clock
// ============================================================================

/// Source of "now" for transitions
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Settable clock for tests and replays
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    pub fn advance(&self, by: chrono::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard += by;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        match self.now.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

// ============================================================================
// Stage derivation
// ============================================================================

/// Derive the user's stage from stored facts.
///
/// Checked in precedence order against the most recent set:
/// 1. ended, weight known, reps missing → `AwaitingReps`
/// 2. ended, weight missing → `AwaitingWeight`
/// 3. started, not ended → `SetActive`
/// 4. exercise chosen, not started → `ExerciseChosen`
///
/// Otherwise `TrainingActive` if a training is running, else `Idle`.
pub fn derive_stage(ledger: &UserLedger) -> Stage {
    if let Some(set) = ledger.latest_set() {
        if set.ended_at.is_some() {
            match (set.weight, set.reps) {
                (Some(_), None) => return Stage::AwaitingReps,
                (None, _) => return Stage::AwaitingWeight,
                (Some(_), Some(_)) => {}
            }
        } else if set.started_at.is_some() {
            return Stage::SetActive;
        } else if !set.exercise.is_empty() {
            return Stage::ExerciseChosen;
        }
    }

    if ledger.active_training().is_some() {
        Stage::TrainingActive
    } else {
        Stage::Idle
    }
}

/// Actions a transport should offer in a given stage
pub fn available_actions(stage: Stage) -> &'static [Action] {
    match stage {
        Stage::Idle => &[Action::StartTraining, Action::AddExercise, Action::ShowStats],
        Stage::TrainingActive => &[
            Action::StartSet,
            Action::EndTraining,
            Action::AddExercise,
            Action::ChooseExercise,
        ],
        Stage::ExerciseChosen => &[
            Action::StartSet,
            Action::EndTraining,
            Action::AddExercise,
            Action::ChooseExercise,
        ],
        Stage::SetActive => &[Action::EndSet],
        Stage::AwaitingWeight => &[Action::EnterWeight],
        Stage::AwaitingReps => &[Action::EnterReps],
    }
}

// ============================================================================
// Engine
// ============================================================================

/// Validates and applies user actions against a workout store
pub struct SessionEngine<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S: WorkoutStore> SessionEngine<S, SystemClock> {
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S: WorkoutStore, C: Clock> SessionEngine<S, C> {
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Current stage of the user
    pub fn stage(&self, user: UserId) -> Result<Stage> {
        Ok(derive_stage(&self.store.snapshot(user)?))
    }

    /// Run a guarded mutation and return the stage it leaves the user in
    fn apply<F>(&self, user: UserId, op: &'static str, f: F) -> Result<Stage>
    where
        F: FnOnce(&mut UserLedger, DateTime<Utc>) -> Result<()>,
    {
        let now = self.clock.now();
        let result = self.store.transact(user, |ledger| {
            f(ledger, now)?;
            Ok(derive_stage(ledger))
        });

        match &result {
            Ok(stage) => tracing::info!("{} for user {} -> {}", op, user, stage),
            Err(Error::Precondition(Precondition::NoActiveSet)) => {
                tracing::warn!("{} for user {}: no set in progress", op, user)
            }
            Err(e) if e.is_recoverable() => {
                tracing::debug!("{} for user {} refused: {}", op, user, e)
            }
            Err(e) => tracing::error!("{} for user {} failed: {}", op, user, e),
        }
        result
    }

    /// Register a user on first contact.
    ///
    /// Fails with `AlreadyRegistered` for a returning user; callers treat
    /// that as a welcome back rather than an error.
    pub fn register(&self, user: UserId) -> Result<Stage> {
        self.apply(user, "register", |ledger, now| ledger.register(now))
    }

    pub fn start_training(&self, user: UserId) -> Result<Stage> {
        self.apply(user, "start_training", |ledger, now| {
            ledger.insert_training_unless_active(now).map(|_| ())
        })
    }

    pub fn end_training(&self, user: UserId) -> Result<Stage> {
        self.apply(user, "end_training", |ledger, now| {
            ledger.end_active_training(now).map(|_| ())
        })
    }

    /// Pick the exercise for the next set.
    ///
    /// Always inserts a new set. A previous set that was never finished is
    /// left as it is and simply stops being the most recent one.
    pub fn choose_exercise(&self, user: UserId, name: &str) -> Result<Stage> {
        let name = normalize_exercise_name(name)?;
        self.apply(user, "choose_exercise", move |ledger, _| {
            ledger.insert_set(name);
            Ok(())
        })
    }

    pub fn start_set(&self, user: UserId) -> Result<Stage> {
        self.apply(user, "start_set", |ledger, now| {
            ledger.start_chosen_set(now).map(|_| ())
        })
    }

    pub fn end_set(&self, user: UserId) -> Result<Stage> {
        self.apply(user, "end_set", |ledger, now| {
            ledger.end_active_set(now).map(|_| ())
        })
    }

    /// Record the weight of the set that just ended.
    ///
    /// Input is validated before the store is touched, so a malformed weight
    /// leaves the user in `AwaitingWeight`.
    pub fn record_weight(&self, user: UserId, input: &str) -> Result<Stage> {
        let weight = parse_weight(input)?;
        self.apply(user, "record_weight", move |ledger, _| {
            ledger.record_weight_on_latest(weight).map(|_| ())
        })
    }

    pub fn record_reps(&self, user: UserId, input: &str) -> Result<Stage> {
        let reps = parse_reps(input)?;
        self.apply(user, "record_reps", move |ledger, _| {
            ledger.record_reps_on_latest(reps).map(|_| ())
        })
    }

    /// Route a free-text message using a fresh stage lookup.
    ///
    /// Weight and reps are collected over separate turns; the awaited input
    /// is always recovered from stored facts, never from the previous turn.
    pub fn submit_input(&self, user: UserId, text: &str) -> Result<Stage> {
        let stage = self.stage(user)?;
        if !stage.expects_input() {
            return Err(Precondition::NotAwaitingInput.into());
        }
        if stage == Stage::AwaitingWeight {
            self.record_weight(user, text)
        } else {
            self.record_reps(user, text)
        }
    }

    /// Add an exercise to the user's catalog; returns its sequence number
    pub fn add_catalog_entry(&self, user: UserId, name: &str) -> Result<u32> {
        let name = normalize_exercise_name(name)?;
        let seq = self.store.transact(user, move |ledger| {
            Ok(ledger.append_catalog_entry(name).seq)
        })?;
        tracing::info!("add_catalog_entry for user {} -> #{}", user, seq);
        Ok(seq)
    }

    /// One page of the user's catalog (1-based)
    pub fn catalog_page(&self, user: UserId, page_number: u32) -> Result<CatalogPage> {
        let ledger = self.store.snapshot(user)?;
        Ok(CatalogPage::from_catalog(&ledger.catalog, page_number))
    }

    /// Number of catalog pages for the user
    pub fn max_pages(&self, user: UserId) -> Result<u32> {
        let ledger = self.store.snapshot(user)?;
        Ok(crate::catalog::max_pages(ledger.catalog.len()))
    }

    /// Statistics over the user's whole history, from a single snapshot
    pub fn stats(&self, user: UserId) -> Result<StatsBundle> {
        let ledger = self.store.snapshot(user)?;
        Ok(compute_stats(&ledger))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::{Training, ValidationError, WorkoutSet};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 7, 30, 0).unwrap()
    }

    fn engine() -> SessionEngine<MemoryStore, ManualClock> {
        crate::logging::init_test();
        SessionEngine::with_clock(MemoryStore::new(), ManualClock::new(t0()))
    }

    const USER: UserId = UserId(100);

    fn expect_precondition(result: Result<Stage>, expected: Precondition) {
        match result {
            Err(Error::Precondition(p)) => assert_eq!(p, expected),
            other => panic!("expected {:?}, got {:?}", expected, other),
        }
    }

    #[test]
    fn test_stage_precedence() {
        let mut ledger = UserLedger::new(USER);
        assert_eq!(derive_stage(&ledger), Stage::Idle);

        ledger.trainings.push(Training::new(t0()));
        assert_eq!(derive_stage(&ledger), Stage::TrainingActive);

        let mut set = WorkoutSet::new("Squat");
        ledger.sets.push(set.clone());
        assert_eq!(derive_stage(&ledger), Stage::ExerciseChosen);

        set.started_at = Some(t0());
        *ledger.sets.last_mut().unwrap() = set.clone();
        assert_eq!(derive_stage(&ledger), Stage::SetActive);

        set.ended_at = Some(t0());
        *ledger.sets.last_mut().unwrap() = set.clone();
        assert_eq!(derive_stage(&ledger), Stage::AwaitingWeight);

        set.weight = Some(60.0);
        *ledger.sets.last_mut().unwrap() = set.clone();
        assert_eq!(derive_stage(&ledger), Stage::AwaitingReps);

        set.reps = Some(8);
        *ledger.sets.last_mut().unwrap() = set;
        assert_eq!(derive_stage(&ledger), Stage::TrainingActive);

        ledger.trainings[0].ended_at = Some(t0());
        assert_eq!(derive_stage(&ledger), Stage::Idle);
    }

    #[test]
    fn test_only_latest_set_drives_stage() {
        let mut ledger = UserLedger::new(USER);
        let mut abandoned = WorkoutSet::new("Squat");
        abandoned.started_at = Some(t0());
        ledger.sets.push(abandoned);
        ledger.sets.push(WorkoutSet::new("Bench"));
        assert_eq!(derive_stage(&ledger), Stage::ExerciseChosen);
    }

    #[test]
    fn test_full_set_cycle() {
        let engine = engine();

        assert_eq!(engine.register(USER).unwrap(), Stage::Idle);
        expect_precondition(engine.register(USER), Precondition::AlreadyRegistered);

        assert_eq!(engine.start_training(USER).unwrap(), Stage::TrainingActive);
        assert_eq!(
            engine.choose_exercise(USER, "Squat").unwrap(),
            Stage::ExerciseChosen
        );
        assert_eq!(engine.start_set(USER).unwrap(), Stage::SetActive);
        engine.clock().advance(Duration::seconds(45));
        assert_eq!(engine.end_set(USER).unwrap(), Stage::AwaitingWeight);
        assert_eq!(
            engine.submit_input(USER, "100").unwrap(),
            Stage::AwaitingReps
        );
        assert_eq!(engine.submit_input(USER, "5").unwrap(), Stage::TrainingActive);
        assert_eq!(engine.end_training(USER).unwrap(), Stage::Idle);

        let ledger = engine.store().snapshot(USER).unwrap();
        let set = &ledger.sets[0];
        assert_eq!(set.started_at, Some(t0()));
        assert_eq!(set.ended_at, Some(t0() + Duration::seconds(45)));
        assert_eq!(set.weight, Some(100.0));
        assert_eq!(set.reps, Some(5));
    }

    #[test]
    fn test_duplicate_start_training() {
        let engine = engine();
        engine.start_training(USER).unwrap();
        expect_precondition(
            engine.start_training(USER),
            Precondition::TrainingAlreadyActive,
        );
        assert_eq!(engine.store().snapshot(USER).unwrap().trainings.len(), 1);
    }

    #[test]
    fn test_end_training_without_training() {
        expect_precondition(engine().end_training(USER), Precondition::NoActiveTraining);
    }

    #[test]
    fn test_start_set_without_exercise() {
        let engine = engine();
        engine.start_training(USER).unwrap();
        expect_precondition(engine.start_set(USER), Precondition::NoExerciseChosen);
    }

    #[test]
    fn test_end_set_without_active_set() {
        let engine = engine();
        engine.start_training(USER).unwrap();
        expect_precondition(engine.end_set(USER), Precondition::NoActiveSet);
        assert_eq!(engine.stage(USER).unwrap(), Stage::TrainingActive);
    }

    #[test]
    fn test_invalid_weight_keeps_stage_and_data() {
        let engine = engine();
        engine.start_training(USER).unwrap();
        engine.choose_exercise(USER, "Row").unwrap();
        engine.start_set(USER).unwrap();
        engine.end_set(USER).unwrap();
        let before = engine.store().snapshot(USER).unwrap();

        for bad in ["abc", "-10"] {
            match engine.submit_input(USER, bad) {
                Err(Error::Validation(ValidationError::InvalidWeightFormat(s))) => {
                    assert_eq!(s, bad)
                }
                other => panic!("expected invalid weight, got {:?}", other),
            }
            assert_eq!(engine.stage(USER).unwrap(), Stage::AwaitingWeight);
        }
        assert_eq!(engine.store().snapshot(USER).unwrap(), before);

        assert_eq!(
            engine.submit_input(USER, "12,5").unwrap(),
            Stage::AwaitingReps
        );
        assert_eq!(
            engine.store().snapshot(USER).unwrap().sets[0].weight,
            Some(12.5)
        );
    }

    #[test]
    fn test_invalid_reps_keeps_stage() {
        let engine = engine();
        engine.choose_exercise(USER, "Curl").unwrap();
        engine.start_set(USER).unwrap();
        engine.end_set(USER).unwrap();
        engine.record_weight(USER, "20").unwrap();

        assert!(matches!(
            engine.submit_input(USER, "five"),
            Err(Error::Validation(ValidationError::InvalidRepsFormat(_)))
        ));
        assert_eq!(engine.stage(USER).unwrap(), Stage::AwaitingReps);
        assert_eq!(engine.submit_input(USER, "12").unwrap(), Stage::Idle);
    }

    #[test]
    fn test_input_outside_awaiting_stage() {
        let engine = engine();
        expect_precondition(
            engine.submit_input(USER, "100"),
            Precondition::NotAwaitingInput,
        );
        expect_precondition(engine.record_weight(USER, "100"), Precondition::NotAwaitingWeight);
        expect_precondition(engine.record_reps(USER, "5"), Precondition::NotAwaitingReps);
    }

    #[test]
    fn test_choosing_new_exercise_abandons_unfinished_set() {
        let engine = engine();
        engine.start_training(USER).unwrap();
        engine.choose_exercise(USER, "Squat").unwrap();
        engine.start_set(USER).unwrap();
        engine.end_set(USER).unwrap();

        // Skip weight entry and move on
        assert_eq!(
            engine.choose_exercise(USER, "Deadlift").unwrap(),
            Stage::ExerciseChosen
        );
        let ledger = engine.store().snapshot(USER).unwrap();
        assert_eq!(ledger.sets.len(), 2);
        assert_eq!(ledger.sets[0].weight, None);
    }

    #[test]
    fn test_blank_exercise_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.choose_exercise(USER, "  "),
            Err(Error::Validation(ValidationError::EmptyExerciseName))
        ));
        assert!(matches!(
            engine.add_catalog_entry(USER, ""),
            Err(Error::Validation(ValidationError::EmptyExerciseName))
        ));
        assert!(engine.store().snapshot(USER).unwrap().sets.is_empty());
    }

    #[test]
    fn test_catalog_paging_through_engine() {
        let engine = engine();
        assert_eq!(engine.max_pages(USER).unwrap(), 0);
        assert!(engine.catalog_page(USER, 1).unwrap().is_empty());

        for (i, name) in ["Squat", "Bench", "Row", "Press", "Curl", "Dip"]
            .iter()
            .enumerate()
        {
            assert_eq!(engine.add_catalog_entry(USER, name).unwrap(), i as u32 + 1);
        }
        assert_eq!(engine.max_pages(USER).unwrap(), 2);

        let page = engine.catalog_page(USER, 2).unwrap();
        assert_eq!(page.names().collect::<Vec<_>>(), ["Dip"]);
        assert!(page.has_previous());
        assert!(!page.has_next());
    }

    #[test]
    fn test_available_actions() {
        assert!(available_actions(Stage::Idle).contains(&Action::StartTraining));
        assert!(!available_actions(Stage::Idle).contains(&Action::EndTraining));
        assert_eq!(available_actions(Stage::SetActive), &[Action::EndSet]);
        assert_eq!(available_actions(Stage::AwaitingReps), &[Action::EnterReps]);
    }
}
