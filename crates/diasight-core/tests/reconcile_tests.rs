//! Reconciliation of submissions that were stored but never classified.

use std::sync::Mutex;

use diasight_classifier::{MockClassifier, MockReply};
use diasight_core::audit::{AuditFilter, AuditReader, LabelSource};
use diasight_core::db::Database;
use diasight_core::models::FeatureInput;
use diasight_core::reconcile::{ReconcileReport, Reconciler};
use diasight_core::submission::{PartialReason, SubmissionPipeline, SubmissionStatus};

fn backdate_all(db: &Mutex<Database>) {
    db.lock()
        .unwrap()
        .conn()
        .execute_batch("UPDATE feature_records SET created_at = '2024-01-01T00:00:00.000000Z';")
        .unwrap();
}

#[test]
fn test_failed_submission_is_reconciled() {
    let db = Mutex::new(Database::open_in_memory().unwrap());
    let classifier = MockClassifier::failing_with_status(503);

    let input = FeatureInput::new().with("age", "58").with("sex", "2");
    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&input, "doc-1")
        .unwrap();
    assert_eq!(
        outcome.status,
        SubmissionStatus::PartialSuccess(PartialReason::NoClassification)
    );

    // too recent to retry
    let reconciler = Reconciler::new(&db, &classifier);
    assert_eq!(
        reconciler.run(chrono::Duration::minutes(15)).unwrap(),
        ReconcileReport::default()
    );

    backdate_all(&db);
    classifier.set_reply(MockReply::Body(r#"{"prediction": "Mild DR"}"#.into()));
    let report = reconciler.run(chrono::Duration::minutes(15)).unwrap();
    assert_eq!(report.classified, 1);

    let guard = db.lock().unwrap();
    let views = AuditReader::new(&guard)
        .list_audit_entries(&AuditFilter::new())
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].record_id, outcome.record_id);
    assert_eq!(views[0].risk_label, "Mild DR");
    assert_eq!(views[0].label_source, LabelSource::Classification);
    assert_eq!(views[0].action, "RECONCILE");
}

#[test]
fn test_reconcile_never_deletes() {
    let db = Mutex::new(Database::open_in_memory().unwrap());
    let failing = MockClassifier::failing_with_status(500);
    let pipeline = SubmissionPipeline::new(&db, &failing);
    for age in ["40", "50", "60"] {
        pipeline
            .submit(&FeatureInput::new().with("age", age).with("sex", "1"), "doc-1")
            .unwrap();
    }
    backdate_all(&db);

    let report = Reconciler::new(&db, &failing)
        .run(chrono::Duration::minutes(1))
        .unwrap();
    assert_eq!(report.examined, 3);
    assert_eq!(report.failed, 3);

    let guard = db.lock().unwrap();
    assert_eq!(guard.count_feature_records().unwrap(), 3);
    assert_eq!(guard.count_audit_entries().unwrap(), 3);
    assert_eq!(guard.count_classifications().unwrap(), 0);
}
