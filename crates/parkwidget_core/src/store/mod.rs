//! Key/value persistence backing the parking note.
//!
//! # Responsibility
//! - Define the string-keyed, string-valued store contract shared by the
//!   primary (SQLite) and fallback (JSON file) stores.
//! - Keep store transport errors in one taxonomy for the repository layer.
//!
//! # Invariants
//! - `get_many` reads every requested key from one consistent snapshot.
//! - `put_many` / `remove_many` apply all entries or none.

use crate::db::DbError;
use std::error::Error;
use std::fmt::{Display, Formatter};

mod json_store;
mod sqlite_store;

pub use json_store::JsonFileKvStore;
pub use sqlite_store::SqliteKvStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Transport-level store failure.
///
/// Every variant means "the store cannot serve this request right now";
/// the repository decides whether that degrades or fails the caller.
#[derive(Debug)]
pub enum StoreError {
    /// SQLite open, bootstrap or query failure.
    Db(DbError),
    /// File-system failure on a file-backed store.
    Io(std::io::Error),
    /// Stored payload exists but cannot be decoded.
    Corrupt(String),
}

impl StoreError {
    /// Stable code for log events.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Db(err) if err.is_busy() => "store_busy",
            Self::Db(_) | Self::Io(_) => "store_unavailable",
            Self::Corrupt(_) => "store_corrupt",
        }
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "store database error: {err}"),
            Self::Io(err) => write!(f, "store io error: {err}"),
            Self::Corrupt(details) => write!(f, "store payload is corrupt: {details}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Io(err) => Some(err),
            Self::Corrupt(_) => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<std::io::Error> for StoreError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

/// String-keyed, string-valued persistent map.
pub trait KeyValueStore: Send + Sync {
    /// Short store name used in log events.
    fn label(&self) -> &'static str;
    /// Reads `keys` from one snapshot; result order matches `keys`.
    fn get_many(&self, keys: &[&str]) -> StoreResult<Vec<Option<String>>>;
    /// Upserts every entry as one atomic unit.
    fn put_many(&self, entries: &[(&str, &str)]) -> StoreResult<()>;
    /// Removes every key as one atomic unit. Absent keys are ignored.
    fn remove_many(&self, keys: &[&str]) -> StoreResult<()>;
}

#[cfg(test)]
mod tests {
    use super::StoreError;
    use crate::db::DbError;
    use rusqlite::ffi;

    #[test]
    fn error_code_separates_busy_from_other_failures() {
        let busy = StoreError::Db(DbError::Sqlite(rusqlite::Error::SqliteFailure(
            ffi::Error::new(ffi::SQLITE_BUSY),
            None,
        )));
        let io = StoreError::Io(std::io::Error::other("disk gone"));
        let corrupt = StoreError::Corrupt("expected object".to_string());

        assert_eq!(busy.error_code(), "store_busy");
        assert_eq!(io.error_code(), "store_unavailable");
        assert_eq!(corrupt.error_code(), "store_corrupt");
    }
}
