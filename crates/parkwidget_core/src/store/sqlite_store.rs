//! Primary SQLite-backed key/value store.
//!
//! # Invariants
//! - A connection is opened per operation, so a store that went missing or
//!   corrupt between calls is reported on the next call instead of being
//!   hidden behind a stale handle.
//! - Reads never create the database file; writes do.

use super::{KeyValueStore, StoreResult};
use crate::db::{open_db, open_db_existing};
use rusqlite::{OptionalExtension, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// SQLite key/value store over the `kv_entries` table.
#[derive(Debug, Clone)]
pub struct SqliteKvStore {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteKvStore {
    pub fn new(path: impl Into<PathBuf>, busy_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            busy_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        self.path.as_path()
    }
}

impl KeyValueStore for SqliteKvStore {
    fn label(&self) -> &'static str {
        "sqlite"
    }

    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<String>>> {
        let mut conn = open_db_existing(&self.path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let mut values = Vec::with_capacity(keys.len());
        {
            let mut stmt = tx.prepare("SELECT value FROM kv_entries WHERE key = ?1;")?;
            for key in keys {
                let value = stmt
                    .query_row([key], |row| row.get::<_, String>(0))
                    .optional()?;
                values.push(value);
            }
        }
        tx.commit()?;
        Ok(values)
    }

    fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()> {
        let mut conn = open_db(&self.path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, value) in entries {
            tx.execute(
                "INSERT INTO kv_entries (key, value, updated_at)
                 VALUES (?1, ?2, (strftime('%s', 'now') * 1000))
                 ON CONFLICT(key) DO UPDATE SET
                    value = excluded.value,
                    updated_at = excluded.updated_at;",
                [key, value],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> StoreResult<()> {
        let mut conn = open_db(&self.path, self.busy_timeout)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for key in keys {
            tx.execute("DELETE FROM kv_entries WHERE key = ?1;", [key])?;
        }
        tx.commit()?;
        Ok(())
    }
}
