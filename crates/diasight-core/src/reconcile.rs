//! Re-classification of records the submission pipeline left unclassified.
//!
//! Submissions are not atomic across stores: a record can be stored and
//! never classified. [`Reconciler::run`] picks those records up once they
//! are old enough and classifies them the way a submission would have.
//! It is never run by a submission itself.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use diasight_classifier::{Classifier, MissingValuePolicy};

use crate::db::{lock_db, Database, DbResult};
use crate::models::AuditAction;

/// What one reconciliation pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    /// Unclassified records old enough to be retried
    pub examined: u32,
    pub classified: u32,
    pub failed: u32,
}

pub struct Reconciler<'a> {
    db: &'a Mutex<Database>,
    classifier: &'a dyn Classifier,
    missing_values: MissingValuePolicy,
}

impl<'a> Reconciler<'a> {
    pub fn new(db: &'a Mutex<Database>, classifier: &'a dyn Classifier) -> Self {
        Self {
            db,
            classifier,
            missing_values: MissingValuePolicy::default(),
        }
    }

    pub fn with_missing_values(mut self, policy: MissingValuePolicy) -> Self {
        self.missing_values = policy;
        self
    }

    /// Classify every record older than `min_age` that has no
    /// classification. Running it again only touches records that are
    /// still unclassified.
    pub fn run(&self, min_age: chrono::Duration) -> DbResult<ReconcileReport> {
        let cutoff = (chrono::Utc::now() - min_age)
            .to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        let pending = lock_db(self.db)?.list_unclassified_records(&cutoff)?;

        let mut report = ReconcileReport {
            examined: u32::try_from(pending.len()).unwrap_or(u32::MAX),
            ..ReconcileReport::default()
        };

        for record in pending {
            let result = record
                .to_feature_vector(self.missing_values)
                .and_then(|vector| self.classifier.classify(&vector));
            let result = match result {
                Ok(result) => result,
                Err(e) => {
                    warn!(record_id = %record.record_id, error = %e, "Reconciliation classify failed");
                    report.failed += 1;
                    continue;
                }
            };

            let db = lock_db(self.db)?;
            // another pass may have classified it while the lock was released
            if db.latest_classification(&record.record_id)?.is_some() {
                continue;
            }
            let classification = match db.insert_classification(&record.record_id, result.risk_class) {
                Ok(classification) => classification,
                Err(e) => {
                    warn!(record_id = %record.record_id, error = %e, "Reconciliation store failed");
                    report.failed += 1;
                    continue;
                }
            };
            report.classified += 1;

            if let Err(e) = db.attach_or_insert_classification(
                &record.record_id,
                &record.created_by,
                &classification,
                AuditAction::Reconcile,
            ) {
                warn!(record_id = %record.record_id, error = %e, "Reconciliation audit failed");
            }
        }

        info!(
            examined = report.examined,
            classified = report.classified,
            failed = report.failed,
            "Reconciliation finished"
        );
        Ok(report)
    }
}
