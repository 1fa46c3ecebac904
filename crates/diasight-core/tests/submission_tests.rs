//! Submission pipeline integration tests.

use std::sync::Mutex;

use diasight_classifier::{MissingValuePolicy, MockClassifier, MockReply, RiskClass};
use diasight_core::audit::{AuditFilter, AuditReader, LabelSource, PENDING_LABEL};
use diasight_core::db::Database;
use diasight_core::models::{AuditAction, FeatureField, FeatureInput, FieldValue};
use diasight_core::submission::{
    PartialReason, SubmissionError, SubmissionPipeline, SubmissionState, SubmissionStatus,
    SubmissionWarning,
};

const MILD_BODY: &str = r#"{
    "prediction": "Mild DR",
    "probabilities": {"No DR": 0.1, "Mild DR": 0.7, "Severe DR": 0.2},
    "confidence": 0.7,
    "risk_score": 0.45
}"#;

fn new_db() -> Mutex<Database> {
    Mutex::new(Database::open_in_memory().unwrap())
}

fn add_trigger(db: &Mutex<Database>, sql: &str) {
    db.lock().unwrap().conn().execute_batch(sql).unwrap();
}

fn minimal_input() -> FeatureInput {
    FeatureInput::new()
        .with("age", "54")
        .with("sex", "1")
        .with("hba1c", "8.2")
}

fn full_input() -> FeatureInput {
    FeatureInput::from_pairs([
        ("age", "61"),
        ("sex", "2"),
        ("duration", "12"),
        ("sbp", "142"),
        ("dbp", "88"),
        ("hbp", "2"),
        ("hba1c", "9.1"),
        ("ldl", "130"),
        ("hdl", "38"),
        ("cholesterol", "215"),
        ("triglycerides", "190"),
        ("urea", "41"),
        ("bun", "19"),
        ("egfr", "64"),
        ("ucr", "1.3"),
        ("uric", "6.8"),
        ("alt", "33"),
        ("ast", "29"),
    ])
}

#[test]
fn test_minimal_submission_scenario() {
    let db = new_db();
    let classifier = MockClassifier::responding(MILD_BODY);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap();

    assert_eq!(outcome.status, SubmissionStatus::Success);
    let result = outcome.classification.as_ref().unwrap();
    assert_eq!(result.label(), "Mild DR");
    assert_eq!(result.probability(RiskClass::MildRisk), Some(0.7));
    assert_eq!(result.confidence, Some(0.7));
    assert_eq!(result.risk_score, Some(0.45));

    let guard = db.lock().unwrap();
    let record = guard.get_feature_record(&outcome.record_id).unwrap().unwrap();
    assert_eq!(record.hba1c, Some(FieldValue::Number(8.2)));
    for field in FeatureField::ALL {
        if !matches!(field, FeatureField::Age | FeatureField::Sex | FeatureField::Hba1c) {
            assert_eq!(record.value(field), None, "{} should be null", field);
        }
    }

    let classification = guard.latest_classification(&outcome.record_id).unwrap().unwrap();
    assert_eq!(classification.label(), "Mild DR");
    assert_eq!(outcome.classification_id, Some(classification.classification_id));

    let entries = guard.list_audit_entries_for_record(&outcome.record_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].risk_class.as_deref(), Some("Mild DR"));
    assert_eq!(entries[0].classification_id, Some(classification.classification_id));
    assert_eq!(entries[0].action, AuditAction::Classify);
    assert_eq!(entries[0].clinician_id, "doc-1");
}

#[test]
fn test_classifier_receives_mapped_keys() {
    let db = new_db();
    let classifier = MockClassifier::responding(MILD_BODY);

    SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input().with("cholesterol", "190"), "doc-1")
        .unwrap();

    let vector = classifier.last_vector().unwrap();
    assert_eq!(vector.get("age"), Some(54.0));
    assert_eq!(vector.get("sex"), Some(1.0));
    assert_eq!(vector.get("hb1ac"), Some(8.2));
    assert_eq!(vector.get("chol"), Some(190.0));
    assert!(vector.get("ldl").unwrap().is_nan());
    assert_eq!(vector.iter().count(), 18);
}

#[test]
fn test_full_submission_listed_once() {
    let db = new_db();
    let classifier = MockClassifier::responding(r#"{"prediction": "Severe DR", "confidence": 0.9}"#);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .with_missing_values(MissingValuePolicy::Zero)
        .submit(&full_input(), "doc-1")
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(outcome.final_state(), SubmissionState::AuditRecorded);
    assert_eq!(
        outcome.trail,
        vec![
            SubmissionState::Validating,
            SubmissionState::FeaturesPersisted,
            SubmissionState::Classifying,
            SubmissionState::Classified,
            SubmissionState::AuditRecorded,
        ]
    );

    let guard = db.lock().unwrap();
    let views = AuditReader::new(&guard)
        .list_audit_entries(&AuditFilter::new())
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].risk_label, "Severe DR");
    assert_eq!(views[0].record_id, outcome.record_id);
    assert!(views[0].lab_values.iter().all(|lab| lab.display != "—"));
}

#[test]
fn test_feature_write_failure_is_fatal() {
    let db = new_db();
    add_trigger(
        &db,
        "CREATE TRIGGER outage BEFORE INSERT ON feature_records
         BEGIN SELECT RAISE(ABORT, 'simulated outage'); END;",
    );
    let classifier = MockClassifier::responding(MILD_BODY);

    let err = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap_err();

    assert_eq!(
        err,
        SubmissionError::Persistence {
            message: "simulated outage".into()
        }
    );
    assert_eq!(classifier.call_count(), 0);

    let guard = db.lock().unwrap();
    assert_eq!(guard.count_feature_records().unwrap(), 0);
    assert_eq!(guard.count_classifications().unwrap(), 0);
    assert_eq!(guard.count_audit_entries().unwrap(), 0);
}

#[test]
fn test_classifier_error_keeps_record() {
    let db = new_db();
    let classifier = MockClassifier::failing_with_status(500);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap();

    assert_eq!(
        outcome.status,
        SubmissionStatus::PartialSuccess(PartialReason::NoClassification)
    );
    assert!(!outcome.record_id.is_empty());
    assert!(outcome.risk_label().is_none());

    let guard = db.lock().unwrap();
    assert!(guard.get_feature_record(&outcome.record_id).unwrap().is_some());
    assert_eq!(guard.count_classifications().unwrap(), 0);

    let views = AuditReader::new(&guard)
        .list_audit_entries(&AuditFilter::new())
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].risk_label, PENDING_LABEL);
}

#[test]
fn test_timeout_and_bad_body_are_partial() {
    let db = new_db();
    let classifier = MockClassifier::timing_out();
    let pipeline = SubmissionPipeline::new(&db, &classifier);

    let outcome = pipeline.submit(&minimal_input(), "doc-1").unwrap();
    assert_eq!(
        outcome.status,
        SubmissionStatus::PartialSuccess(PartialReason::NoClassification)
    );

    classifier.set_reply(MockReply::Body("<html>502</html>".into()));
    let outcome = pipeline.submit(&minimal_input(), "doc-1").unwrap();
    assert_eq!(
        outcome.status,
        SubmissionStatus::PartialSuccess(PartialReason::NoClassification)
    );

    classifier.set_reply(MockReply::Body(r#"{"prediction": "Moderate DR"}"#.into()));
    let outcome = pipeline.submit(&minimal_input(), "doc-1").unwrap();
    assert!(outcome.classification.is_none());

    assert_eq!(db.lock().unwrap().count_feature_records().unwrap(), 3);
}

#[test]
fn test_classification_write_failure_still_returns_result() {
    let db = new_db();
    add_trigger(
        &db,
        "CREATE TRIGGER outage BEFORE INSERT ON classifications
         BEGIN SELECT RAISE(ABORT, 'classifications offline'); END;",
    );
    let classifier = MockClassifier::responding(MILD_BODY);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap();

    assert_eq!(
        outcome.status,
        SubmissionStatus::PartialSuccess(PartialReason::ClassificationNotRecorded)
    );
    assert_eq!(outcome.risk_label(), Some("Mild DR"));
    assert!(outcome.classification_id.is_none());
    assert!(outcome
        .warnings
        .contains(&SubmissionWarning::ClassificationNotRecorded(
            "classifications offline".into()
        )));

    let guard = db.lock().unwrap();
    assert_eq!(guard.count_classifications().unwrap(), 0);
    let views = AuditReader::new(&guard)
        .list_audit_entries(&AuditFilter::new())
        .unwrap();
    assert_eq!(views[0].label_source, LabelSource::Pending);
}

#[test]
fn test_audit_update_failure_does_not_change_outcome() {
    let db = new_db();
    add_trigger(
        &db,
        "CREATE TRIGGER outage BEFORE UPDATE ON audit_entries
         BEGIN SELECT RAISE(ABORT, 'audit offline'); END;",
    );
    let classifier = MockClassifier::responding(MILD_BODY);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap();

    assert_eq!(outcome.status, SubmissionStatus::Success);
    assert_eq!(outcome.final_state(), SubmissionState::Classified);
    assert!(outcome
        .warnings
        .contains(&SubmissionWarning::Audit("audit offline".into())));

    // the CREATE entry survives and the live classification resolves its label
    let guard = db.lock().unwrap();
    let views = AuditReader::new(&guard)
        .list_audit_entries(&AuditFilter::new())
        .unwrap();
    assert_eq!(views.len(), 1);
    assert_eq!(views[0].action, "CREATE");
    assert_eq!(views[0].risk_label, "Mild DR");
    assert_eq!(views[0].label_source, LabelSource::Classification);
}

#[test]
fn test_missing_create_entry_is_inserted_on_classify() {
    let db = new_db();
    add_trigger(
        &db,
        "CREATE TRIGGER outage BEFORE INSERT ON audit_entries
         WHEN NEW.classification_id IS NULL
         BEGIN SELECT RAISE(ABORT, 'audit offline'); END;",
    );
    let classifier = MockClassifier::responding(MILD_BODY);

    let outcome = SubmissionPipeline::new(&db, &classifier)
        .submit(&minimal_input(), "doc-1")
        .unwrap();

    assert_eq!(outcome.final_state(), SubmissionState::AuditRecorded);
    assert_eq!(outcome.warnings.len(), 1);

    let guard = db.lock().unwrap();
    let entries = guard.list_audit_entries_for_record(&outcome.record_id).unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].action, AuditAction::Classify);
    assert_eq!(entries[0].classification_id, outcome.classification_id);
}

#[test]
fn test_each_submission_gets_a_new_record() {
    let db = new_db();
    let classifier = MockClassifier::responding(MILD_BODY);
    let pipeline = SubmissionPipeline::new(&db, &classifier);

    let a = pipeline.submit(&minimal_input(), "doc-1").unwrap();
    let b = pipeline.submit(&minimal_input(), "doc-1").unwrap();

    assert_ne!(a.record_id, b.record_id);
    assert_eq!(db.lock().unwrap().count_feature_records().unwrap(), 2);
}
