//! Invariant and race tests for the session engine.
//!
//! At any moment a user has at most one running training and at most one
//! started-but-unended set, whatever order actions arrive in and however
//! many duplicates race each other.

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use setlog_core::*;
use std::sync::{Arc, Barrier};
use std::thread;

const USER: UserId = UserId(77);
const EXERCISES: [&str; 3] = ["Squat", "Bench", "Row"];

fn assert_single_active(ledger: &UserLedger) {
    let active_trainings = ledger.trainings.iter().filter(|t| t.is_active()).count();
    let running_sets = ledger.sets.iter().filter(|s| s.is_running()).count();
    assert!(active_trainings <= 1, "{} active trainings", active_trainings);
    assert!(running_sets <= 1, "{} running sets", running_sets);
}

/// Fire `n` copies of `action` at once and count how many succeed
fn race<S, F>(engine: Arc<SessionEngine<S>>, n: usize, action: F) -> usize
where
    S: WorkoutStore + Send + Sync + 'static,
    F: Fn(&SessionEngine<S>) -> Result<Stage> + Send + Sync + 'static,
{
    let barrier = Arc::new(Barrier::new(n));
    let action = Arc::new(action);

    let handles: Vec<_> = (0..n)
        .map(|_| {
            let engine = Arc::clone(&engine);
            let barrier = Arc::clone(&barrier);
            let action = Arc::clone(&action);
            thread::spawn(move || {
                barrier.wait();
                action(&engine).is_ok()
            })
        })
        .collect();

    handles
        .into_iter()
        .map(|h| h.join().expect("racing thread panicked"))
        .filter(|ok| *ok)
        .count()
}

#[test]
fn duplicate_start_training_succeeds_once() {
    let engine = Arc::new(SessionEngine::new(MemoryStore::new()));

    let wins = race(Arc::clone(&engine), 8, |e| e.start_training(USER));

    assert_eq!(wins, 1);
    let ledger = engine.store().snapshot(USER).unwrap();
    assert_eq!(ledger.trainings.len(), 1);
    assert_single_active(&ledger);
}

#[test]
fn duplicate_start_set_succeeds_once() {
    let engine = Arc::new(SessionEngine::new(MemoryStore::new()));
    engine.start_training(USER).unwrap();
    engine.choose_exercise(USER, "Squat").unwrap();

    let wins = race(Arc::clone(&engine), 8, |e| e.start_set(USER));

    assert_eq!(wins, 1);
    assert_eq!(engine.stage(USER).unwrap(), Stage::SetActive);
}

#[test]
fn duplicate_start_training_on_disk_succeeds_once() {
    let temp_dir = tempfile::tempdir().unwrap();
    let data_dir = temp_dir.path().to_path_buf();

    // Separate store handles, as separate processes would have
    let barrier = Arc::new(Barrier::new(6));
    let handles: Vec<_> = (0..6)
        .map(|_| {
            let data_dir = data_dir.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let engine = SessionEngine::new(FileStore::new(&data_dir));
                barrier.wait();
                engine.start_training(USER).is_ok()
            })
        })
        .collect();

    let wins = handles
        .into_iter()
        .map(|h| h.join().expect("racing thread panicked"))
        .filter(|ok| *ok)
        .count();
    assert_eq!(wins, 1);

    let ledger = FileStore::new(&data_dir).snapshot(USER).unwrap();
    assert_eq!(ledger.trainings.len(), 1);
}

#[test]
fn catalog_sequence_numbers_unique_under_races() {
    let engine = Arc::new(SessionEngine::new(MemoryStore::new()));

    let wins = race(Arc::clone(&engine), 10, |e| {
        e.add_catalog_entry(USER, "Lunge").map(|_| Stage::Idle)
    });
    assert_eq!(wins, 10);

    let mut seqs: Vec<u32> = engine
        .store()
        .snapshot(USER)
        .unwrap()
        .catalog
        .iter()
        .map(|e| e.seq)
        .collect();
    seqs.sort_unstable();
    assert_eq!(seqs, (1..=10).collect::<Vec<_>>());
}

// ============================================================================
// Random interleavings
// ============================================================================

#[derive(Clone, Debug)]
enum Op {
    Register,
    StartTraining,
    EndTraining,
    Choose(usize),
    StartSet,
    EndSet,
    Input(&'static str),
    AddCatalog(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        Just(Op::Register),
        Just(Op::StartTraining),
        Just(Op::EndTraining),
        (0..EXERCISES.len()).prop_map(Op::Choose),
        Just(Op::StartSet),
        Just(Op::EndSet),
        prop::sample::select(vec!["80", "12,5", "5", "abc", "-1"]).prop_map(Op::Input),
        (0..EXERCISES.len()).prop_map(Op::AddCatalog),
    ]
}

fn apply(engine: &SessionEngine<MemoryStore, ManualClock>, op: &Op) -> Result<()> {
    match op {
        Op::Register => engine.register(USER).map(|_| ()),
        Op::StartTraining => engine.start_training(USER).map(|_| ()),
        Op::EndTraining => engine.end_training(USER).map(|_| ()),
        Op::Choose(i) => engine.choose_exercise(USER, EXERCISES[*i]).map(|_| ()),
        Op::StartSet => engine.start_set(USER).map(|_| ()),
        Op::EndSet => engine.end_set(USER).map(|_| ()),
        Op::Input(text) => engine.submit_input(USER, text).map(|_| ()),
        Op::AddCatalog(i) => engine.add_catalog_entry(USER, EXERCISES[*i]).map(|_| ()),
    }
}

proptest! {
    #[test]
    fn prop_at_most_one_active_training_and_set(
        ops in prop::collection::vec(op_strategy(), 0..80)
    ) {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let engine = SessionEngine::with_clock(MemoryStore::new(), ManualClock::new(start));

        for op in &ops {
            let before = engine.store().snapshot(USER).unwrap();
            let result = apply(&engine, op);
            let after = engine.store().snapshot(USER).unwrap();

            assert_single_active(&after);
            if result.is_err() {
                // Refused actions leave no partial writes
                prop_assert_eq!(&before, &after);
            }
            prop_assert_eq!(derive_stage(&after), engine.stage(USER).unwrap());

            engine.clock().advance(Duration::seconds(30));
        }

        // Whatever happened, stats never fault
        let stats = engine.stats(USER).unwrap();
        let ledger = engine.store().snapshot(USER).unwrap();
        prop_assert_eq!(stats.trainings_count, ledger.trainings.len());
        prop_assert_eq!(stats.total_sets, ledger.sets.len());
        prop_assert_eq!(stats.most_popular_exercise.is_none(), ledger.sets.is_empty());
    }
}
