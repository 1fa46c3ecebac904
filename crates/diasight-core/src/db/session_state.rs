//! Session key-value storage.

use rusqlite::{params, OptionalExtension};

use super::{Database, DbResult};

impl Database {
    /// Get a session value.
    pub fn get_session_value(&self, key: &str) -> DbResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM session_state WHERE key = ?",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Set a session value, replacing any previous one.
    pub fn set_session_value(&self, key: &str, value: &str) -> DbResult<()> {
        self.conn.execute(
            r#"
            INSERT INTO session_state (key, value, updated_at)
            VALUES (?1, ?2, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = datetime('now')
            "#,
            params![key, value],
        )?;
        Ok(())
    }

    /// Remove a session value. Returns whether it existed.
    pub fn remove_session_value(&self, key: &str) -> DbResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM session_state WHERE key = ?", [key])?;
        Ok(removed > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_values() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_session_value("k").unwrap(), None);

        db.set_session_value("k", "one").unwrap();
        db.set_session_value("k", "two").unwrap();
        assert_eq!(db.get_session_value("k").unwrap().as_deref(), Some("two"));

        assert!(db.remove_session_value("k").unwrap());
        assert!(!db.remove_session_value("k").unwrap());
        assert_eq!(db.get_session_value("k").unwrap(), None);
    }
}
