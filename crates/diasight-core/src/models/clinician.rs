//! Clinician accounts.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::now_timestamp;

/// A clinician who can sign in and submit assessments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinician {
    pub clinician_id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub specialization: Option<String>,
    pub created_at: String,
}

impl Clinician {
    /// Create a clinician with a fresh id.
    pub fn new(email: String, first_name: String, last_name: String) -> Self {
        Self {
            clinician_id: uuid::Uuid::new_v4().to_string(),
            email: normalize_email(&email),
            first_name,
            last_name,
            specialization: None,
            created_at: now_timestamp(),
        }
    }

    pub fn display_name(&self) -> String {
        format!("Dr. {} {}", self.first_name, self.last_name)
    }
}

/// Emails compare trimmed and lowercase.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// SHA-256 hex digest of a password.
pub fn hash_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_clinician() {
        let clinician = Clinician::new(" Dr.John@Example.com ".into(), "John".into(), "Doe".into());
        assert_eq!(clinician.email, "dr.john@example.com");
        assert_eq!(clinician.display_name(), "Dr. John Doe");
        assert_eq!(clinician.clinician_id.len(), 36);
    }

    #[test]
    fn test_hash_password() {
        let hash = hash_password("password123");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_password("password123"));
        assert_ne!(hash, hash_password("password124"));
    }
}
