//! Workout store abstraction.
//!
//! The engine needs two things from persistence: a consistent snapshot of one
//! user's facts, and a way to run a guarded mutation against those facts as a
//! single atomic step. Backends decide how to provide the isolation.

use crate::{Error, Result, UserId, UserLedger};
use std::collections::HashMap;
use std::sync::Mutex;

/// Durable record of users, trainings, sets and catalogs
pub trait WorkoutStore {
    /// Read a consistent copy of the user's facts.
    ///
    /// Unknown users yield an empty, unregistered ledger.
    fn snapshot(&self, user: UserId) -> Result<UserLedger>;

    /// Apply `f` to the user's facts atomically.
    ///
    /// No other `transact` for the same user runs concurrently. If `f`
    /// returns an error nothing is persisted.
    fn transact<T, F>(&self, user: UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut UserLedger) -> Result<T>;
}

/// Volatile store backed by a mutex-guarded map
#[derive(Debug, Default)]
pub struct MemoryStore {
    ledgers: Mutex<HashMap<UserId, UserLedger>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn poisoned() -> Error {
        Error::StoreUnavailable("memory store lock poisoned".into())
    }
}

impl WorkoutStore for MemoryStore {
    fn snapshot(&self, user: UserId) -> Result<UserLedger> {
        let ledgers = self.ledgers.lock().map_err(|_| Self::poisoned())?;
        Ok(ledgers
            .get(&user)
            .cloned()
            .unwrap_or_else(|| UserLedger::new(user)))
    }

    fn transact<T, F>(&self, user: UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut UserLedger) -> Result<T>,
    {
        let mut ledgers = self.ledgers.lock().map_err(|_| Self::poisoned())?;

        // Work on a copy so a failed guard leaves nothing half-applied
        let mut working = ledgers
            .get(&user)
            .cloned()
            .unwrap_or_else(|| UserLedger::new(user));
        let out = f(&mut working)?;
        ledgers.insert(user, working);

        tracing::debug!("Committed transaction for user {}", user);
        Ok(out)
    }
}
