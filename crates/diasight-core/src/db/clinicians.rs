//! Clinician database operations.

use rusqlite::{params, OptionalExtension, Row};

use super::{Database, DbError, DbResult};
use crate::models::{hash_password, normalize_email, Clinician};

impl Database {
    /// Register a clinician with a plain-text password (stored hashed).
    pub fn insert_clinician(&self, clinician: &Clinician, password: &str) -> DbResult<()> {
        let result = self.conn.execute(
            r#"
            INSERT INTO clinicians (
                clinician_id, email, password_hash, first_name, last_name,
                specialization, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
            params![
                clinician.clinician_id,
                normalize_email(&clinician.email),
                hash_password(password),
                clinician.first_name,
                clinician.last_name,
                clinician.specialization,
                clinician.created_at,
            ],
        );

        match result {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(DbError::Constraint(format!(
                    "clinician {} or email {} already registered",
                    clinician.clinician_id, clinician.email
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Get a clinician by ID.
    pub fn get_clinician(&self, clinician_id: &str) -> DbResult<Option<Clinician>> {
        let clinician = self
            .conn
            .query_row(
                r#"
                SELECT clinician_id, email, first_name, last_name, specialization, created_at
                FROM clinicians
                WHERE clinician_id = ?
                "#,
                [clinician_id],
                clinician_from_row,
            )
            .optional()?;
        Ok(clinician)
    }

    /// Find the clinician matching an email and password.
    pub fn find_clinician_by_credentials(
        &self,
        email: &str,
        password: &str,
    ) -> DbResult<Option<Clinician>> {
        let clinician = self
            .conn
            .query_row(
                r#"
                SELECT clinician_id, email, first_name, last_name, specialization, created_at
                FROM clinicians
                WHERE email = ?1 AND password_hash = ?2
                "#,
                params![normalize_email(email), hash_password(password)],
                clinician_from_row,
            )
            .optional()?;
        Ok(clinician)
    }
}

fn clinician_from_row(row: &Row<'_>) -> rusqlite::Result<Clinician> {
    Ok(Clinician {
        clinician_id: row.get(0)?,
        email: row.get(1)?,
        first_name: row.get(2)?,
        last_name: row.get(3)?,
        specialization: row.get(4)?,
        created_at: row.get(5)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_clinician() -> Clinician {
        let mut clinician = Clinician::new("jane@clinic.org".into(), "Jane".into(), "Roe".into());
        clinician.specialization = Some("Ophthalmology".into());
        clinician
    }

    #[test]
    fn test_insert_and_get() {
        let db = Database::open_in_memory().unwrap();
        let clinician = make_clinician();
        db.insert_clinician(&clinician, "secret").unwrap();

        let retrieved = db.get_clinician(&clinician.clinician_id).unwrap().unwrap();
        assert_eq!(retrieved, clinician);
    }

    #[test]
    fn test_credentials() {
        let db = Database::open_in_memory().unwrap();
        let clinician = make_clinician();
        db.insert_clinician(&clinician, "secret").unwrap();

        let found = db
            .find_clinician_by_credentials(" JANE@clinic.org", "secret")
            .unwrap();
        assert_eq!(found.map(|c| c.clinician_id), Some(clinician.clinician_id));

        assert!(db
            .find_clinician_by_credentials("jane@clinic.org", "wrong")
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.insert_clinician(&make_clinician(), "a").unwrap();

        let err = db.insert_clinician(&make_clinician(), "b").unwrap_err();
        assert!(matches!(err, DbError::Constraint(_)));
    }
}
