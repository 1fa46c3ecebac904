//! Signed-in clinician context.
//!
//! The session is an explicit object passed to whoever needs the current
//! clinician. Logout is announced through registered listeners.

use std::sync::Mutex;

use thiserror::Error;
use tracing::{info, warn};

use crate::db::{lock_db, Database, DbError};
use crate::models::Clinician;

/// Session key holding the signed-in clinician id.
pub const SESSION_KEY: &str = "current_clinician";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("No clinician is signed in")]
    NotSignedIn,

    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

type LogoutListener = Box<dyn Fn(&str) + Send + Sync>;

/// Login state plus logout listeners.
#[derive(Default)]
pub struct Session {
    listeners: Mutex<Vec<LogoutListener>>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check credentials and remember the clinician.
    pub fn login(&self, db: &Database, email: &str, password: &str) -> Result<Clinician, SessionError> {
        let clinician = db
            .find_clinician_by_credentials(email, password)?
            .ok_or(SessionError::InvalidCredentials)?;
        db.set_session_value(SESSION_KEY, &clinician.clinician_id)?;
        info!(clinician_id = %clinician.clinician_id, "Signed in");
        Ok(clinician)
    }

    /// The signed-in clinician, if any.
    ///
    /// A stored id whose clinician no longer exists counts as signed out.
    pub fn current(&self, db: &Database) -> Result<Option<Clinician>, SessionError> {
        let Some(clinician_id) = db.get_session_value(SESSION_KEY)? else {
            return Ok(None);
        };
        let clinician = db.get_clinician(&clinician_id)?;
        if clinician.is_none() {
            warn!(clinician_id = %clinician_id, "Session refers to an unknown clinician");
        }
        Ok(clinician)
    }

    pub fn require_clinician(&self, db: &Database) -> Result<Clinician, SessionError> {
        self.current(db)?.ok_or(SessionError::NotSignedIn)
    }

    /// Register a callback fired with the clinician id on every logout.
    pub fn on_logout<F>(&self, listener: F)
    where
        F: Fn(&str) + Send + Sync + 'static,
    {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(Box::new(listener));
        }
    }

    /// Forget the signed-in clinician and notify listeners. Returns the id
    /// that was signed in, if any.
    pub fn logout(&self, db: &Mutex<Database>) -> Result<Option<String>, SessionError> {
        let clinician_id = {
            let db = lock_db(db)?;
            let clinician_id = db.get_session_value(SESSION_KEY)?;
            db.remove_session_value(SESSION_KEY)?;
            clinician_id
        };

        if let Some(id) = &clinician_id {
            info!(clinician_id = %id, "Signed out");
            let listeners = self
                .listeners
                .lock()
                .map_err(|e| DbError::LockPoisoned(e.to_string()))?;
            for listener in listeners.iter() {
                listener(id);
            }
        }
        Ok(clinician_id)
    }
}
