//! SQLite bootstrap for the primary note store.
//!
//! # Responsibility
//! - Open connections with the pragmas the key/value store relies on.
//! - Bring the `kv_entries` schema up to date before any store access.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - A connection handed out by this module is fully migrated.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_existing, open_db_in_memory, DEFAULT_BUSY_TIMEOUT};

pub type DbResult<T> = Result<T, DbError>;

/// Failure while opening or migrating the primary store.
#[derive(Debug)]
pub enum DbError {
    /// Open, pragma or migration statement failed.
    Sqlite(rusqlite::Error),
    /// The file was written by a newer build and is left untouched.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl DbError {
    /// True when SQLite reported the database as locked by another writer.
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(rusqlite::Error::SqliteFailure(code, _))
                if code.code == rusqlite::ErrorCode::DatabaseBusy
                    || code.code == rusqlite::ErrorCode::DatabaseLocked
        )
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "sqlite: {err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "note store schema v{db_version} is newer than this build (v{latest_supported})"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
