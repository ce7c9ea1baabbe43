//! SQLite schema creation and migration for the document store.
//!
//! The applied version is kept in `PRAGMA user_version`; each step runs once.

use rusqlite::Connection;

/// `(version, sql)` in ascending order.
const MIGRATIONS: &[(u32, &str)] = &[
    (
        1,
        "CREATE TABLE IF NOT EXISTS documents (
            collection TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (collection, key)
        );",
    ),
    // Per-collection listing in key order.
    (
        2,
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, key);",
    ),
];

/// Apply every migration newer than the database's recorded version.
pub fn run_migrations(conn: &Connection) -> Result<(), rusqlite::Error> {
    let applied = schema_version(conn);
    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > applied) {
        conn.execute_batch(sql)?;
        conn.pragma_update(None, "user_version", version)?;
    }
    Ok(())
}

/// Recorded schema version, 0 for a fresh database.
pub fn schema_version(conn: &Connection) -> u32 {
    conn.pragma_query_value(None, "user_version", |row| row.get(0))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();
        let latest = MIGRATIONS.last().map(|(v, _)| *v).unwrap();
        assert_eq!(schema_version(&conn), latest);
    }

    #[test]
    fn test_partial_database_is_upgraded() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(MIGRATIONS[0].1).unwrap();
        conn.pragma_update(None, "user_version", 1u32).unwrap();
        run_migrations(&conn).unwrap();
        let indexes: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND name = 'idx_documents_collection'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(indexes, 1);
    }
}
