//! Database layer for DiaSight.

mod audit_entries;
mod classifications;
mod clinicians;
mod feature_records;
mod schema;
mod session_state;

pub use audit_entries::*;
pub use schema::*;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use thiserror::Error;

/// Database errors.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Database lock poisoned: {0}")]
    LockPoisoned(String),
}

impl DbError {
    /// The backend's own message, without our prefix.
    ///
    /// For SQLite failures that carry a message (constraint text, trigger
    /// `RAISE` text) this is exactly what SQLite reported.
    pub fn backend_message(&self) -> String {
        match self {
            DbError::Sqlite(rusqlite::Error::SqliteFailure(_, Some(message))) => message.clone(),
            DbError::Sqlite(err) => err.to_string(),
            DbError::Constraint(message) | DbError::LockPoisoned(message) => message.clone(),
        }
    }
}

pub type DbResult<T> = Result<T, DbError>;

/// Database connection wrapper.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open database at path, creating if needed.
    pub fn open<P: AsRef<Path>>(path: P) -> DbResult<Self> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    /// Create in-memory database (for testing).
    pub fn open_in_memory() -> DbResult<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.initialize()?;
        Ok(db)
    }

    fn initialize(&self) -> DbResult<()> {
        self.conn.execute_batch(SCHEMA)?;
        Ok(())
    }

    /// Get raw connection (for advanced queries).
    pub fn conn(&self) -> &Connection {
        &self.conn
    }
}

/// Lock a shared database, mapping poisoning to an error.
pub fn lock_db(db: &Mutex<Database>) -> DbResult<MutexGuard<'_, Database>> {
    db.lock().map_err(|e| DbError::LockPoisoned(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_in_memory() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn test_schema_initialized() {
        let db = Database::open_in_memory().unwrap();

        let tables: Vec<String> = db
            .conn()
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        for table in [
            "clinicians",
            "feature_records",
            "classifications",
            "audit_entries",
            "session_state",
        ] {
            assert!(tables.contains(&table.to_string()), "missing table {}", table);
        }
    }

    #[test]
    fn test_reopen_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("diasight.db");

        Database::open(&path).unwrap();
        // schema creation is idempotent
        let db = Database::open(&path).unwrap();
        assert_eq!(db.count_feature_records().unwrap(), 0);
    }

    #[test]
    fn test_backend_message_is_unprefixed() {
        let db = Database::open_in_memory().unwrap();
        db.conn()
            .execute_batch(
                "CREATE TRIGGER block BEFORE INSERT ON session_state
                 BEGIN SELECT RAISE(ABORT, 'store offline'); END;",
            )
            .unwrap();

        let err = db.set_session_value("k", "v").unwrap_err();
        assert_eq!(err.backend_message(), "store offline");
    }

    #[test]
    fn test_lock_db() {
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let guard = lock_db(&db).unwrap();
        assert_eq!(guard.count_audit_entries().unwrap(), 0);
    }
}
