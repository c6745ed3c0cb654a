//! Key/value store operations.
//!
//! # Responsibility
//! - Compose repository primitives into the public operation set.
//! - Run each call as one unit of work on a fresh connection.
//!
//! # Invariants
//! - Every call opens its own connection and releases it on every exit path.
//! - A failed call is rolled back; partial writes are never committed.
//! - Sentinel methods never panic and never return errors; failures are
//!   logged and collapse to the sentinel (`false`, `None`, empty, `(0, 0)`).
//! - `try_*` methods report `Ok(None)` for missing rows and `Err` for
//!   failures.
//! - There is no atomicity across calls.

use crate::config::StoreConfig;
use crate::db::{ensure_schema, open_db, prepare_db_dir, DbError};
use crate::model::entry::{DoneMarker, Entry, SubEntry, DONE_KEY};
use crate::model::value::{JsonMap, JsonValue};
use crate::repo::kv_repo::{KvRepository, RepoError, RepoResult, SqliteKvRepository};
use log::{debug, error, info, warn};
use rusqlite::TransactionBehavior;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure of a single store call.
#[derive(Debug)]
pub enum StoreError {
    /// Connection, pragma or transaction control failed.
    Db(DbError),
    /// The operation body failed.
    Repo(RepoError),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for StoreError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Access {
    Read,
    Write,
}

/// Thread-safe handle over one SQLite database file.
///
/// Writers in this process are serialized by an internal mutex and use
/// `IMMEDIATE` transactions; readers run without the mutex.
pub struct Store {
    config: StoreConfig,
    write_lock: Mutex<()>,
}

impl Store {
    /// Opens the store and creates its tables when absent.
    ///
    /// Schema failures are logged and do not abort construction; later
    /// calls fail and return their sentinels.
    pub fn open(config: StoreConfig) -> Self {
        let store = Self {
            config,
            write_lock: Mutex::new(()),
        };

        let started_at = Instant::now();
        match store.init_schema() {
            Ok(()) => info!(
                "event=schema_init module=store status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=schema_init module=store status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }

        store
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn path(&self) -> &Path {
        &self.config.db_path
    }

    fn init_schema(&self) -> StoreResult<()> {
        prepare_db_dir(&self.config.db_path)?;
        let mut conn = open_db(&self.config.db_path, self.config.busy_timeout())?;
        ensure_schema(&mut conn)?;
        Ok(())
    }

    /// Returns the completed project name, or `None` when not done.
    pub fn check(&self) -> Option<String> {
        self.try_check().ok().flatten()
    }

    pub fn setup(&self, done: bool, name: &str) -> bool {
        self.try_setup(done, name).is_ok()
    }

    /// `setup` with the configured default name.
    pub fn setup_default(&self, done: bool) -> bool {
        self.setup(done, &self.config.default_setup_name)
    }

    pub fn add(&self, key: &str, value: impl Into<JsonValue>) -> bool {
        self.try_add(key, &value.into()).is_ok()
    }

    pub fn subadd(&self, key: &str, subkey: &str, subvalue: impl Into<JsonValue>) -> bool {
        self.try_subadd(key, subkey, &subvalue.into()).is_ok()
    }

    pub fn get(&self, key: &str) -> Option<JsonValue> {
        self.try_get(key).ok().flatten()
    }

    pub fn subget(&self, key: &str, subkey: &str) -> Option<JsonValue> {
        self.try_subget(key, subkey).ok().flatten()
    }

    pub fn get_all_subdata(&self, key: &str) -> JsonMap {
        self.try_get_all_subdata(key).unwrap_or_default()
    }

    pub fn update(&self, data: &JsonMap) -> bool {
        self.try_update(data).is_ok()
    }

    pub fn fetchall(&self) -> JsonMap {
        self.try_fetchall().unwrap_or_default()
    }

    pub fn remove(&self, key: &str, subkey: Option<&str>) -> bool {
        self.try_remove(key, subkey).is_ok()
    }

    pub fn exists(&self, key: &str, subkey: Option<&str>) -> bool {
        self.try_exists(key, subkey).unwrap_or(false)
    }

    /// Returns `(entries, sub_entries)` row counts.
    pub fn count(&self) -> (u64, u64) {
        self.try_count().unwrap_or((0, 0))
    }

    pub fn entry(&self, key: &str) -> Option<Entry> {
        self.try_entry(key).ok().flatten()
    }

    pub fn sub_entry(&self, key: &str, subkey: &str) -> Option<SubEntry> {
        self.try_sub_entry(key, subkey).ok().flatten()
    }

    pub fn try_check(&self) -> StoreResult<Option<String>> {
        self.run("check", Access::Read, |repo| {
            Ok(repo
                .get_entry(DONE_KEY)?
                .and_then(|entry| DoneMarker::completed_name(&entry.value)))
        })
    }

    pub fn try_setup(&self, done: bool, name: &str) -> StoreResult<()> {
        let marker = DoneMarker::new(done, name).to_value();
        self.run("setup", Access::Write, |repo| {
            repo.upsert_entry(DONE_KEY, &marker)
        })
    }

    pub fn try_add(&self, key: &str, value: &JsonValue) -> StoreResult<()> {
        self.run("add", Access::Write, |repo| repo.upsert_entry(key, value))
    }

    /// Writes a sub-entry, creating an empty-object parent entry first
    /// when `key` has none.
    pub fn try_subadd(&self, key: &str, subkey: &str, subvalue: &JsonValue) -> StoreResult<()> {
        self.run("subadd", Access::Write, |repo| {
            write_sub_entry(repo, key, subkey, subvalue)
        })
    }

    pub fn try_get(&self, key: &str) -> StoreResult<Option<JsonValue>> {
        self.run("get", Access::Read, |repo| {
            Ok(repo.get_entry(key)?.map(|entry| entry.value))
        })
    }

    pub fn try_subget(&self, key: &str, subkey: &str) -> StoreResult<Option<JsonValue>> {
        self.run("subget", Access::Read, |repo| {
            Ok(repo
                .get_sub_entry(key, subkey)?
                .map(|sub_entry| sub_entry.subvalue))
        })
    }

    pub fn try_get_all_subdata(&self, key: &str) -> StoreResult<JsonMap> {
        self.run("get_all_subdata", Access::Read, |repo| {
            repo.list_sub_values(key)
        })
    }

    /// Applies a batch of writes in one transaction.
    ///
    /// Object values are written as sub-entries of their key (one per inner
    /// pair, an empty object writes nothing); every other value overwrites
    /// the entry.
    pub fn try_update(&self, data: &JsonMap) -> StoreResult<()> {
        self.run("update", Access::Write, |repo| {
            for (key, value) in data {
                match value {
                    JsonValue::Object(inner) => {
                        for (subkey, subvalue) in inner {
                            write_sub_entry(repo, key, subkey, subvalue)?;
                        }
                    }
                    other => repo.upsert_entry(key, other)?,
                }
            }
            Ok(())
        })
    }

    /// Dumps every entry with its sub-entries merged in.
    pub fn try_fetchall(&self) -> StoreResult<JsonMap> {
        self.run("fetchall", Access::Read, |repo| {
            let entries = repo.list_entries()?;
            let sub_entries = repo.list_sub_entries()?;
            Ok(merge_sub_entries(entries, sub_entries))
        })
    }

    /// Deletes one sub-entry, or the entry and all of its sub-entries.
    /// Succeeds when nothing matched.
    pub fn try_remove(&self, key: &str, subkey: Option<&str>) -> StoreResult<()> {
        self.run("remove", Access::Write, |repo| {
            match subkey {
                Some(subkey) => {
                    repo.delete_sub_entry(key, subkey)?;
                }
                None => {
                    repo.delete_sub_entries(key)?;
                    repo.delete_entry(key)?;
                }
            }
            Ok(())
        })
    }

    pub fn try_exists(&self, key: &str, subkey: Option<&str>) -> StoreResult<bool> {
        self.run("exists", Access::Read, |repo| match subkey {
            Some(subkey) => repo.sub_entry_exists(key, subkey),
            None => repo.entry_exists(key),
        })
    }

    pub fn try_count(&self) -> StoreResult<(u64, u64)> {
        self.run("count", Access::Read, |repo| {
            Ok((repo.count_entries()?, repo.count_sub_entries()?))
        })
    }

    pub fn try_entry(&self, key: &str) -> StoreResult<Option<Entry>> {
        self.run("entry", Access::Read, |repo| repo.get_entry(key))
    }

    pub fn try_sub_entry(&self, key: &str, subkey: &str) -> StoreResult<Option<SubEntry>> {
        self.run("sub_entry", Access::Read, |repo| {
            repo.get_sub_entry(key, subkey)
        })
    }

    fn run<T>(
        &self,
        op: &'static str,
        access: Access,
        body: impl FnOnce(&SqliteKvRepository<'_>) -> RepoResult<T>,
    ) -> StoreResult<T> {
        let started_at = Instant::now();
        let _write_guard = match access {
            Access::Write => Some(self.lock_writes()),
            Access::Read => None,
        };

        let result = self.run_unit_of_work(op, access, body);
        match &result {
            Ok(_) => debug!(
                "event=store_op module=store status=ok op={} duration_ms={}",
                op,
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=store_op module=store status=error op={} duration_ms={} error={}",
                op,
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    fn run_unit_of_work<T>(
        &self,
        op: &'static str,
        access: Access,
        body: impl FnOnce(&SqliteKvRepository<'_>) -> RepoResult<T>,
    ) -> StoreResult<T> {
        let mut conn = open_db(&self.config.db_path, self.config.busy_timeout())?;
        let behavior = match access {
            Access::Read => TransactionBehavior::Deferred,
            Access::Write => TransactionBehavior::Immediate,
        };
        let tx = conn.transaction_with_behavior(behavior)?;

        let outcome = {
            let repo = SqliteKvRepository::new(&tx);
            body(&repo)
        };

        match outcome {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(
                        "event=store_rollback module=store status=error op={} error={}",
                        op, rollback_err
                    );
                }
                Err(err.into())
            }
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        // The guarded state is `()`, so a panicked writer leaves nothing
        // inconsistent behind.
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

fn write_sub_entry(
    repo: &impl KvRepository,
    key: &str,
    subkey: &str,
    subvalue: &JsonValue,
) -> RepoResult<()> {
    repo.ensure_entry(key)?;
    repo.upsert_sub_entry(key, subkey, subvalue)
}

/// Folds sub-entries into their parent values.
///
/// A parent whose own value is not an object is replaced by an object of
/// its sub-entries only; the original value is dropped. Parents with no
/// entry row get an object synthesized from their sub-entries.
fn merge_sub_entries(entries: Vec<Entry>, sub_entries: Vec<SubEntry>) -> JsonMap {
    let mut merged: JsonMap = entries
        .into_iter()
        .map(|entry| (entry.key, entry.value))
        .collect();

    for sub_entry in sub_entries {
        let slot = merged
            .entry(sub_entry.parent_key)
            .or_insert_with(JsonValue::empty_object);
        if !slot.is_object() {
            *slot = JsonValue::empty_object();
        }
        if let JsonValue::Object(map) = slot {
            map.insert(sub_entry.subkey, sub_entry.subvalue);
        }
    }

    merged
}
