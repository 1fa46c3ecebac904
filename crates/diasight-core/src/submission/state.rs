//! Submission lifecycle and outcome types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use diasight_classifier::ClassificationResult;

use crate::models::{FeatureField, ValidationError};

/// Stages of one submission, in the only order they can occur.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SubmissionState {
    Validating,
    FeaturesPersisted,
    Classifying,
    Classified,
    AuditRecorded,
}

/// Forward-only record of the states a submission passed through.
#[derive(Debug, Clone, PartialEq)]
pub struct Lifecycle {
    trail: Vec<SubmissionState>,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            trail: vec![SubmissionState::Validating],
        }
    }

    pub fn current(&self) -> SubmissionState {
        self.trail
            .last()
            .copied()
            .unwrap_or(SubmissionState::Validating)
    }

    /// Move to `next`. Returns false, and stays put, for anything that is
    /// not strictly later than the current state.
    pub fn advance(&mut self, next: SubmissionState) -> bool {
        if next <= self.current() {
            return false;
        }
        self.trail.push(next);
        true
    }

    pub fn into_trail(self) -> Vec<SubmissionState> {
        self.trail
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

/// Why a stored submission ended without a durable classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartialReason {
    /// The classifier call failed
    NoClassification,
    /// The classifier answered but the classification write failed
    ClassificationNotRecorded,
}

/// Terminal status of a submission whose feature record was stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionStatus {
    Success,
    PartialSuccess(PartialReason),
}

/// A non-fatal problem recorded on the outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SubmissionWarning {
    /// Optional fields kept as text instead of numbers
    FlaggedFields(Vec<FeatureField>),
    /// Classifier call failed
    Classifier(String),
    /// Classification could not be stored
    ClassificationNotRecorded(String),
    /// Audit entry could not be written
    Audit(String),
}

impl SubmissionWarning {
    pub fn message(&self) -> String {
        match self {
            SubmissionWarning::FlaggedFields(fields) => format!(
                "Non-numeric values kept for: {}",
                fields
                    .iter()
                    .map(|f| f.name())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
            SubmissionWarning::Classifier(message) => format!("Classification failed: {}", message),
            SubmissionWarning::ClassificationNotRecorded(message) => {
                format!("Classification could not be saved: {}", message)
            }
            SubmissionWarning::Audit(message) => format!("Audit entry could not be saved: {}", message),
        }
    }
}

/// Result of a submission whose feature record was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionOutcome {
    /// Always present: the record is durable
    pub record_id: String,
    pub status: SubmissionStatus,
    /// Present whenever the classifier answered, even if it was not stored
    pub classification: Option<ClassificationResult>,
    pub classification_id: Option<i64>,
    pub audit_id: Option<i64>,
    /// States passed through, in order
    pub trail: Vec<SubmissionState>,
    pub warnings: Vec<SubmissionWarning>,
}

impl SubmissionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == SubmissionStatus::Success
    }

    pub fn risk_label(&self) -> Option<&'static str> {
        self.classification.as_ref().map(|c| c.label())
    }

    pub fn final_state(&self) -> SubmissionState {
        self.trail
            .last()
            .copied()
            .unwrap_or(SubmissionState::Validating)
    }
}

/// Failures that leave nothing stored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SubmissionError {
    #[error("Invalid assessment: {0}")]
    Validation(#[from] ValidationError),

    #[error("No signed-in clinician")]
    MissingClinician,

    /// The feature record write failed; carries the backend's message.
    #[error("{message}")]
    Persistence { message: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle_is_forward_only() {
        let mut lifecycle = Lifecycle::new();
        assert!(lifecycle.advance(SubmissionState::FeaturesPersisted));
        assert!(lifecycle.advance(SubmissionState::Classifying));
        assert!(!lifecycle.advance(SubmissionState::FeaturesPersisted));
        assert!(!lifecycle.advance(SubmissionState::Classifying));
        assert_eq!(lifecycle.current(), SubmissionState::Classifying);

        assert_eq!(
            lifecycle.into_trail(),
            vec![
                SubmissionState::Validating,
                SubmissionState::FeaturesPersisted,
                SubmissionState::Classifying,
            ]
        );
    }

    #[test]
    fn test_persistence_error_shows_backend_message() {
        let err = SubmissionError::Persistence {
            message: "disk I/O error".into(),
        };
        assert_eq!(err.to_string(), "disk I/O error");
    }

    #[test]
    fn test_warning_messages() {
        let warning =
            SubmissionWarning::FlaggedFields(vec![FeatureField::Ucr, FeatureField::Alt]);
        assert_eq!(warning.message(), "Non-numeric values kept for: ucr, alt");
    }
}
