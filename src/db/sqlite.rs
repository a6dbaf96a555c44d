use std::path::Path;

use rusqlite::Connection;
use tracing;

use super::DatabaseError;

/// Open a SQLite connection to the given path and run migrations.
/// Creates the parent directory when missing.
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.execute_batch(
        "PRAGMA journal_mode=DELETE;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_local_storage.sql")),
        (2, include_str!("../../resources/migrations/002_stock_movements.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Count tables in the database (for verification)
pub fn count_tables(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%'",
        [],
        |row| row.get::<_, i64>(0),
    )?;
    Ok(count)
}

/// Run `write` inside a transaction, rolling back if it fails. Joins the
/// caller's transaction when one is already open.
pub fn atomically<T, E>(
    conn: &Connection,
    write: impl FnOnce() -> Result<T, E>,
) -> Result<T, E>
where
    E: From<rusqlite::Error>,
{
    if !conn.is_autocommit() {
        return write();
    }
    let tx = conn.unchecked_transaction()?;
    let value = write()?;
    tx.commit()?;
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_initializes_all_tables() {
        let conn = open_memory_database().unwrap();
        // schema_version + local_storage + stock_movements
        let count = count_tables(&conn).unwrap();
        assert_eq!(count, 3, "Expected 3 tables, got {count}");
    }

    #[test]
    fn schema_version_is_current() {
        let conn = open_memory_database().unwrap();
        let version: i64 = conn
            .query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, 2);
    }

    #[test]
    fn migration_idempotent() {
        let conn = open_memory_database().unwrap();
        let result = run_migrations(&conn);
        assert!(result.is_ok());
    }

    fn movement_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM stock_movements", [], |row| row.get(0))
            .unwrap()
    }

    fn insert_movement(conn: &Connection, id: &str) -> Result<usize, rusqlite::Error> {
        conn.execute(
            "INSERT INTO stock_movements
                (id, facility_id, vaccine_name, batch_number, movement_type, quantity, reason, created_at)
             VALUES (?1, 'FAC001', 'BCG', 'BN-1', 'used', 1, 'test', '2025-01-01T00:00:00Z')",
            [id],
        )
    }

    #[test]
    fn atomically_rolls_back_on_failure() {
        let conn = open_memory_database().unwrap();
        let result: Result<(), rusqlite::Error> = atomically(&conn, || {
            insert_movement(&conn, "M1")?;
            insert_movement(&conn, "M1")?;
            Ok(())
        });
        assert!(result.is_err());
        assert_eq!(movement_count(&conn), 0);
        assert!(conn.is_autocommit());

        atomically(&conn, || insert_movement(&conn, "M2")).unwrap();
        assert_eq!(movement_count(&conn), 1);
    }

    #[test]
    fn atomically_joins_open_transaction() {
        let conn = open_memory_database().unwrap();
        let outer = conn.unchecked_transaction().unwrap();
        atomically(&conn, || insert_movement(&conn, "M1")).unwrap();
        drop(outer);
        assert_eq!(movement_count(&conn), 0);
    }

    #[test]
    fn database_opens_from_disk_and_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("vaxtrack.db");
        let conn = open_database(&path).unwrap();
        assert_eq!(count_tables(&conn).unwrap(), 3);
        drop(conn);

        let conn2 = open_database(&path).unwrap();
        assert_eq!(count_tables(&conn2).unwrap(), 3);
    }
}
