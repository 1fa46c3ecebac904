//! Classifier errors.

use thiserror::Error;

/// Every way a classification call can fail.
///
/// None of these are fatal to an assessment submission; the caller decides
/// how to degrade.
#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("Classifier request timed out after {0} ms")]
    Timeout(u64),

    #[error("Classifier transport error: {0}")]
    Transport(String),

    #[error("Classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Classifier response is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid classifier response: {0}")]
    InvalidResponse(String),

    #[error("Unknown feature key: {0}")]
    UnknownKey(String),
}

pub type ClassifierResult<T> = Result<T, ClassifierError>;
