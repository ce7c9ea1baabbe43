//! SQLite-backed document store.
//!
//! Same contract as [`JsonDirStore`](crate::store::JsonDirStore), but every
//! write is a single transactional statement against one database file.

use crate::migration::run_migrations;
use crate::store::DocumentStore;
use chrono::Utc;
use membank_types::error::{MembankError, MembankResult};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Document store backed by SQLite.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open (or create) a database file and run migrations.
    pub fn open(path: &Path) -> MembankResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path).map_err(|e| MembankError::Storage(e.to_string()))?;
        Self::from_connection(conn)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> MembankResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| MembankError::Storage(e.to_string()))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> MembankResult<Self> {
        run_migrations(&conn).map_err(|e| MembankError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

impl DocumentStore for SqliteStore {
    fn get(&self, collection: &str, key: &str) -> MembankResult<Option<serde_json::Value>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MembankError::Internal(e.to_string()))?;
        let result = conn.query_row(
            "SELECT value FROM documents WHERE collection = ?1 AND key = ?2",
            rusqlite::params![collection, key],
            |row| row.get::<_, String>(0),
        );
        match result {
            Ok(text) => Ok(Some(serde_json::from_str(&text)?)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(MembankError::Storage(e.to_string())),
        }
    }

    fn put(&self, collection: &str, key: &str, value: &serde_json::Value) -> MembankResult<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MembankError::Internal(e.to_string()))?;
        let text = serde_json::to_string(value)?;
        let now = Utc::now().to_rfc3339();
        conn.execute(
            "INSERT INTO documents (collection, key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(collection, key) DO UPDATE SET value = ?3, updated_at = ?4",
            rusqlite::params![collection, key, text, now],
        )
        .map_err(|e| MembankError::Storage(e.to_string()))?;
        Ok(())
    }

    fn list(&self, collection: &str) -> MembankResult<Vec<(String, serde_json::Value)>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MembankError::Internal(e.to_string()))?;
        let mut stmt = conn
            .prepare("SELECT key, value FROM documents WHERE collection = ?1 ORDER BY key")
            .map_err(|e| MembankError::Storage(e.to_string()))?;
        let rows = stmt
            .query_map(rusqlite::params![collection], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(|e| MembankError::Storage(e.to_string()))?;

        let mut docs = Vec::new();
        for row in rows {
            let (key, text) = row.map_err(|e| MembankError::Storage(e.to_string()))?;
            match serde_json::from_str(&text) {
                Ok(value) => docs.push((key, value)),
                Err(e) => tracing::warn!(collection, key = %key, error = %e, "Skipping unreadable document"),
            }
        }
        Ok(docs)
    }

    fn delete(&self, collection: &str, key: &str) -> MembankResult<bool> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| MembankError::Internal(e.to_string()))?;
        let removed = conn
            .execute(
                "DELETE FROM documents WHERE collection = ?1 AND key = ?2",
                rusqlite::params![collection, key],
            )
            .map_err(|e| MembankError::Storage(e.to_string()))?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_put_get_overwrite() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("learning", "graph", &json!({"v": 1})).unwrap();
        store.put("learning", "graph", &json!({"v": 2})).unwrap();
        assert_eq!(store.get("learning", "graph").unwrap(), Some(json!({"v": 2})));
    }

    #[test]
    fn test_list_is_per_collection() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("cache/a", "2", &json!(2)).unwrap();
        store.put("cache/a", "1", &json!(1)).unwrap();
        store.put("cache/b", "3", &json!(3)).unwrap();
        let docs = store.list("cache/a").unwrap();
        assert_eq!(docs, vec![("1".to_string(), json!(1)), ("2".to_string(), json!(2))]);
    }

    #[test]
    fn test_delete_reports_existence() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.put("c", "k", &json!(null)).unwrap();
        assert!(store.delete("c", "k").unwrap());
        assert!(!store.delete("c", "k").unwrap());
        assert_eq!(store.get("c", "k").unwrap(), None);
    }

    #[test]
    fn test_open_file_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("membank.db");
        {
            let store = SqliteStore::open(&path).unwrap();
            store.put("c", "k", &json!("kept")).unwrap();
        }
        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get("c", "k").unwrap(), Some(json!("kept")));
    }
}
