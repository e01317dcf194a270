//! Connection bootstrap utilities for SQLite.
//!
//! # Responsibility
//! - Open file or in-memory SQLite connections.
//! - Configure connection pragmas required by core behavior.
//! - Trigger schema migrations before returning a usable connection.
//!
//! # Invariants
//! - Returned connections have a bounded busy timeout, so store access fails
//!   instead of hanging when another writer holds the lock.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::DbResult;
use log::{debug, error};
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::{Duration, Instant};

/// Busy timeout used when callers do not configure one.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(2);

/// Opens (creating when missing) a SQLite database file and applies all
/// pending migrations.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    open_with_mode("file", || Connection::open(path.as_ref()), busy_timeout)
}

/// Opens an already existing SQLite database file.
///
/// Fails with [`super::DbError::Sqlite`] when the file is missing. Read paths
/// use this so a missing primary store is reported as unavailable instead of
/// being silently recreated empty.
pub fn open_db_existing(path: impl AsRef<Path>, busy_timeout: Duration) -> DbResult<Connection> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX;
    open_with_mode(
        "existing",
        || Connection::open_with_flags(path.as_ref(), flags),
        busy_timeout,
    )
}

/// Opens an in-memory SQLite database and applies all pending migrations.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with_mode("memory", Connection::open_in_memory, DEFAULT_BUSY_TIMEOUT)
}

fn open_with_mode(
    mode: &'static str,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
    busy_timeout: Duration,
) -> DbResult<Connection> {
    let started_at = Instant::now();

    let mut conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_open_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&mut conn, busy_timeout) {
        Ok(()) => {
            debug!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode,
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code=db_bootstrap_failed error={}",
                mode,
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, busy_timeout: Duration) -> DbResult<()> {
    conn.busy_timeout(busy_timeout)?;
    apply_migrations(conn)?;
    Ok(())
}
