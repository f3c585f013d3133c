//! On-disk workout store with file locking.
//!
//! Each user's ledger is one JSON document under `<data_dir>/users/`. A
//! sidecar `.lock` file serializes writers across processes: transactions
//! hold an exclusive lock from read to rename, snapshots take a shared one.

use crate::store::WorkoutStore;
use crate::{Error, Result, UserId, UserLedger};
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::io::{BufReader, Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// JSON-per-user store rooted in a data directory
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create a store that keeps ledgers under `data_dir/users`
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            root: data_dir.as_ref().join("users"),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self, user: UserId) -> PathBuf {
        self.root.join(format!("{}.json", user))
    }

    fn lock_path(&self, user: UserId) -> PathBuf {
        self.root.join(format!("{}.lock", user))
    }

    fn open_lock(&self, user: UserId) -> Result<File> {
        std::fs::create_dir_all(&self.root)?;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(self.lock_path(user))?;
        Ok(file)
    }

    /// Read a ledger; the caller must hold the user's lock
    fn read_ledger(&self, user: UserId) -> Result<UserLedger> {
        let path = self.ledger_path(user);
        if !path.exists() {
            tracing::debug!("No ledger for user {}, starting empty", user);
            return Ok(UserLedger::new(user));
        }

        let mut contents = String::new();
        BufReader::new(File::open(&path)?).read_to_string(&mut contents)?;

        // A damaged ledger is an error, never an empty ledger: the next write
        // would otherwise replace the user's whole history.
        let ledger: UserLedger = serde_json::from_str(&contents).map_err(|e| {
            tracing::warn!("Failed to parse ledger {:?}: {}", path, e);
            Error::Json(e)
        })?;
        if ledger.user != user {
            return Err(Error::StoreUnavailable(format!(
                "ledger {:?} belongs to user {}",
                path, ledger.user
            )));
        }
        Ok(ledger)
    }

    /// Atomically replace a ledger; the caller must hold the user's lock
    ///
    /// 1. Write to a temp file in the same directory
    /// 2. Sync to disk
    /// 3. Rename over the original
    fn write_ledger(&self, ledger: &UserLedger) -> Result<()> {
        let path = self.ledger_path(ledger.user);
        let temp = NamedTempFile::new_in(&self.root)?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            let contents = serde_json::to_string(ledger)?;
            writer.write_all(contents.as_bytes())?;
            writer.flush()?;
        }

        temp.as_file().sync_all()?;
        temp.persist(&path).map_err(|e| Error::Io(e.error))?;

        tracing::debug!("Saved ledger for user {} to {:?}", ledger.user, path);
        Ok(())
    }

    fn snapshot_locked(&self, user: UserId) -> Result<UserLedger> {
        let lock = self.open_lock(user)?;
        lock.lock_shared()?;
        let result = self.read_ledger(user);
        lock.unlock()?;
        result
    }

    fn transact_locked<T, F>(&self, user: UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut UserLedger) -> Result<T>,
    {
        let lock = self.open_lock(user)?;
        lock.lock_exclusive()?;

        let result = self.read_ledger(user).and_then(|mut ledger| {
            let out = f(&mut ledger)?;
            self.write_ledger(&ledger)?;
            Ok(out)
        });

        lock.unlock()?;
        result
    }
}

impl WorkoutStore for FileStore {
    fn snapshot(&self, user: UserId) -> Result<UserLedger> {
        self.snapshot_locked(user).map_err(Error::into_store_error)
    }

    fn transact<T, F>(&self, user: UserId, f: F) -> Result<T>
    where
        F: FnOnce(&mut UserLedger) -> Result<T>,
    {
        self.transact_locked(user, f)
            .map_err(Error::into_store_error)
    }
}
