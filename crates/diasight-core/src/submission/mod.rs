//! Assessment submission.
//!
//! Drives validate → store feature record → classify → store
//! classification → record audit entry. Only the feature record write is
//! fatal; later failures are recorded on the outcome and nothing already
//! stored is rolled back.

mod state;

pub use state::*;

use std::sync::Mutex;

use tracing::{info, warn};

use diasight_classifier::{Classifier, ClassifierResult, ClassificationResult, MissingValuePolicy};

use crate::db::{lock_db, Database, DbError};
use crate::models::{AuditAction, FeatureInput, FeatureRecord, NewAuditEntry};

/// Runs submissions against a shared database and a classifier.
///
/// The database lock is taken per step and never held across the
/// classifier call.
pub struct SubmissionPipeline<'a> {
    db: &'a Mutex<Database>,
    classifier: &'a dyn Classifier,
    missing_values: MissingValuePolicy,
}

impl<'a> SubmissionPipeline<'a> {
    pub fn new(db: &'a Mutex<Database>, classifier: &'a dyn Classifier) -> Self {
        Self {
            db,
            classifier,
            missing_values: MissingValuePolicy::default(),
        }
    }

    /// Encode missing markers with `policy` in classifier requests.
    pub fn with_missing_values(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_values = policy;
        self
    }

    /// Submit one assessment on behalf of `clinician_id`.
    ///
    /// `Err` means nothing was stored. `Ok` always carries the stored
    /// record id; its status tells whether classification made it through.
    pub fn submit(
        &self,
        features: &FeatureInput,
        clinician_id: &str,
    ) -> Result<SubmissionOutcome, SubmissionError> {
        let clinician_id = clinician_id.trim();
        if clinician_id.is_empty() {
            return Err(SubmissionError::MissingClinician);
        }

        let mut lifecycle = Lifecycle::new();
        let mut warnings = Vec::new();

        let normalized = features.normalize()?;
        if !normalized.flagged.is_empty() {
            warn!(fields = ?normalized.flagged, "Keeping non-numeric values");
            warnings.push(SubmissionWarning::FlaggedFields(normalized.flagged.clone()));
        }

        // The id exists before any write so every later step can reference it.
        let record = FeatureRecord::new(normalized, clinician_id.to_string());
        let record_id = record.record_id.clone();

        let mut audit_id = {
            let db = lock_db(self.db).map_err(persistence)?;
            db.insert_feature_record(&record).map_err(persistence)?;
            lifecycle.advance(SubmissionState::FeaturesPersisted);
            info!(record_id = %record_id, "Feature record stored");

            match db.insert_audit_entry(&NewAuditEntry::created(&record_id, clinician_id)) {
                Ok(id) => Some(id),
                Err(e) => {
                    warn!(record_id = %record_id, error = %e, "Could not create audit entry");
                    warnings.push(SubmissionWarning::Audit(e.backend_message()));
                    None
                }
            }
        };

        lifecycle.advance(SubmissionState::Classifying);
        let result = match self.classify(&record) {
            Ok(result) => result,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Classification failed, record kept");
                warnings.push(SubmissionWarning::Classifier(e.to_string()));
                return Ok(SubmissionOutcome {
                    record_id,
                    status: SubmissionStatus::PartialSuccess(PartialReason::NoClassification),
                    classification: None,
                    classification_id: None,
                    audit_id,
                    trail: lifecycle.into_trail(),
                    warnings,
                });
            }
        };
        lifecycle.advance(SubmissionState::Classified);
        info!(record_id = %record_id, label = result.label(), "Classified");

        let stored =
            lock_db(self.db).and_then(|db| db.insert_classification(&record_id, result.risk_class));
        let classification = match stored {
            Ok(classification) => classification,
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Could not store classification");
                warnings.push(SubmissionWarning::ClassificationNotRecorded(e.backend_message()));
                return Ok(SubmissionOutcome {
                    record_id,
                    status: SubmissionStatus::PartialSuccess(
                        PartialReason::ClassificationNotRecorded,
                    ),
                    classification: Some(result),
                    classification_id: None,
                    audit_id,
                    trail: lifecycle.into_trail(),
                    warnings,
                });
            }
        };

        let attached = lock_db(self.db).and_then(|db| {
            db.attach_or_insert_classification(
                &record_id,
                clinician_id,
                &classification,
                AuditAction::Classify,
            )
        });
        match attached {
            Ok(id) => {
                audit_id = Some(id);
                lifecycle.advance(SubmissionState::AuditRecorded);
                info!(record_id = %record_id, audit_id = id, "Audit entry recorded");
            }
            Err(e) => {
                warn!(record_id = %record_id, error = %e, "Could not record audit entry");
                warnings.push(SubmissionWarning::Audit(e.backend_message()));
            }
        }

        Ok(SubmissionOutcome {
            record_id,
            status: SubmissionStatus::Success,
            classification: Some(result),
            classification_id: Some(classification.classification_id),
            audit_id,
            trail: lifecycle.into_trail(),
            warnings,
        })
    }

    fn classify(&self, record: &FeatureRecord) -> ClassifierResult<ClassificationResult> {
        let vector = record.to_feature_vector(self.missing_values)?;
        self.classifier.classify(&vector)
    }
}

fn persistence(e: DbError) -> SubmissionError {
    SubmissionError::Persistence {
        message: e.backend_message(),
    }
}
