//! Schema migrations for the primary note store.
//!
//! Each migration is a SQL batch tagged with the `PRAGMA user_version` it
//! produces. Pending batches run inside one transaction, so a failed upgrade
//! leaves the previous schema untouched.

use crate::db::{DbError, DbResult};
use log::info;
use rusqlite::Connection;

struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    name: "kv_store",
    sql: include_str!("0001_kv_store.sql"),
}];

/// Highest schema version this build can produce.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// Schema version recorded in the database file.
pub fn schema_version(conn: &Connection) -> DbResult<u32> {
    Ok(conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?)
}

/// Brings `conn` up to [`latest_version`].
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the file was written by a
///   newer build; the file is left untouched.
/// - [`DbError::Sqlite`] when a batch fails; the transaction is rolled back.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let from = schema_version(conn)?;
    let latest = latest_version();
    if from > latest {
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: from,
            latest_supported: latest,
        });
    }

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|migration| migration.version > from)
        .collect();
    if pending.is_empty() {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in &pending {
        tx.execute_batch(migration.sql)?;
        tx.pragma_update(None, "user_version", migration.version)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from={} to={} applied={}",
        from,
        latest,
        pending
            .iter()
            .map(|migration| migration.name)
            .collect::<Vec<_>>()
            .join(",")
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{apply_migrations, latest_version, schema_version, MIGRATIONS};
    use rusqlite::Connection;

    #[test]
    fn versions_are_strictly_increasing() {
        let versions: Vec<u32> = MIGRATIONS.iter().map(|m| m.version).collect();
        assert!(versions.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(versions.first(), Some(&1));
    }

    #[test]
    fn rerunning_on_current_schema_is_a_no_op() {
        let mut conn = Connection::open_in_memory().unwrap();
        apply_migrations(&mut conn).unwrap();
        conn.execute("INSERT INTO kv_entries (key, value) VALUES ('k', 'v');", [])
            .unwrap();

        apply_migrations(&mut conn).unwrap();

        assert_eq!(schema_version(&conn).unwrap(), latest_version());
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM kv_entries;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }
}
