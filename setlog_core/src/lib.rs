#![forbid(unsafe_code)]

//! Core domain model and business logic for the setlog workout tracker.
//!
//! This crate provides:
//! - Domain types (users, catalog entries, trainings, sets, stages)
//! - Session state inference and guarded transitions
//! - Exercise catalog pagination
//! - Statistics aggregation and CSV reporting
//! - Persistence (in-memory and locked JSON files)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod input;
pub mod ledger;
pub mod store;
pub mod file_store;
pub mod catalog;
pub mod session;
pub mod stats;
pub mod report;

// Re-export commonly used types
pub use error::{Error, Precondition, Result, ValidationError};
pub use types::*;
pub use config::Config;
pub use ledger::UserLedger;
pub use store::{MemoryStore, WorkoutStore};
pub use file_store::FileStore;
pub use catalog::{CatalogPage, PAGE_SIZE};
pub use session::{available_actions, derive_stage, Clock, ManualClock, SessionEngine, SystemClock};
pub use stats::{compute_stats, ExerciseStats, StatsBundle};
