//! DiaSight Core Library
//!
//! Assessment submission and audit reconstruction for diabetic retinopathy
//! risk screening.
//!
//! # Architecture
//!
//! ```text
//! Intake form (5 steps) → FeatureInput
//!                              │
//!                     validate + normalize
//!                              │
//!                  ┌───────────▼───────────┐
//!                  │  feature_records      │  fatal on failure
//!                  └───────────┬───────────┘
//!                              │  audit entry (CREATE)
//!                     Classifier (HTTP POST)   non-fatal
//!                              │
//!                  ┌───────────▼───────────┐
//!                  │  classifications      │  non-fatal
//!                  └───────────┬───────────┘
//!                              │  audit entry (CLASSIFY)
//!                              ▼
//!                     Audit reconstruction
//!            (joins + fallbacks → display-ready views)
//! ```
//!
//! Nothing is rolled back across stores: a stored feature record stays
//! stored whatever happens later. [`reconcile::Reconciler`] can classify
//! records that were left behind.
//!
//! # Modules
//!
//! - [`db`]: SQLite stores
//! - [`models`]: Domain types (FeatureRecord, Classification, AuditEntry, Clinician)
//! - [`intake`]: Multi-step form state
//! - [`submission`]: The write pipeline
//! - [`audit`]: The read-side projection
//! - [`session`]: Signed-in clinician context
//! - [`reconcile`]: Re-classification of unclassified records
//! - [`config`]: Layered configuration
//! - [`logging`]: Subscriber setup

pub mod audit;
pub mod config;
pub mod db;
pub mod intake;
pub mod logging;
pub mod models;
pub mod reconcile;
pub mod session;
pub mod submission;

// Re-export commonly used types
pub use audit::{AuditFilter, AuditPage, AuditReader, AuditView, RiskSummary};
pub use config::DiaSightConfig;
pub use db::Database;
pub use intake::{IntakeForm, IntakeStep};
pub use models::{
    AuditAction, AuditEntry, Classification, Clinician, FeatureField, FeatureInput, FeatureRecord,
    FieldValue, RiskClass,
};
pub use reconcile::{ReconcileReport, Reconciler};
pub use session::Session;
pub use submission::{SubmissionError, SubmissionOutcome, SubmissionPipeline, SubmissionStatus};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use diasight_classifier::{Classifier, HttpClassifier};

use crate::db::lock_db;
use crate::submission::PartialReason;

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum DiaSightError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    /// A required store write failed; the backend's message, unmodified.
    #[error("{0}")]
    PersistenceError(String),

    #[error("Session error: {0}")]
    SessionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Classifier error: {0}")]
    ClassifierError(String),
}

impl From<db::DbError> for DiaSightError {
    fn from(e: db::DbError) -> Self {
        DiaSightError::DatabaseError(e.to_string())
    }
}

impl From<session::SessionError> for DiaSightError {
    fn from(e: session::SessionError) -> Self {
        match e {
            session::SessionError::Db(e) => e.into(),
            other => DiaSightError::SessionError(other.to_string()),
        }
    }
}

impl From<SubmissionError> for DiaSightError {
    fn from(e: SubmissionError) -> Self {
        match e {
            SubmissionError::Validation(e) => DiaSightError::ValidationError(e.to_string()),
            SubmissionError::MissingClinician => DiaSightError::SessionError(e.to_string()),
            SubmissionError::Persistence { message } => DiaSightError::PersistenceError(message),
        }
    }
}

impl From<config::ConfigError> for DiaSightError {
    fn from(e: config::ConfigError) -> Self {
        DiaSightError::ConfigError(e.to_string())
    }
}

impl From<diasight_classifier::ClassifierError> for DiaSightError {
    fn from(e: diasight_classifier::ClassifierError) -> Self {
        DiaSightError::ClassifierError(e.to_string())
    }
}

// =========================================================================
// Factory Functions (exported to FFI)
// =========================================================================

/// Install the global log subscriber. Returns false if one already exists.
#[uniffi::export]
pub fn init_logging(filter: String, json: bool) -> bool {
    logging::init_logging(&filter, json)
}

/// Open the configured database, creating it if needed.
///
/// `config_path` replaces the default `diasight.toml` lookup.
#[uniffi::export]
pub fn open_database(config_path: Option<String>) -> Result<Arc<DiaSightCore>, DiaSightError> {
    let config = match config_path {
        Some(path) => DiaSightConfig::load_from(path)?,
        None => DiaSightConfig::load()?,
    };
    let db = Database::open(&config.database.path)?;
    let classifier = HttpClassifier::new(&config.classifier)?;
    Ok(Arc::new(DiaSightCore::with_classifier(
        db,
        Arc::new(classifier),
        config,
    )))
}

/// Create an in-memory database with default settings (for testing).
#[uniffi::export]
pub fn open_database_in_memory() -> Result<Arc<DiaSightCore>, DiaSightError> {
    let config = DiaSightConfig::default();
    let db = Database::open_in_memory()?;
    let classifier = HttpClassifier::new(&config.classifier)?;
    Ok(Arc::new(DiaSightCore::with_classifier(
        db,
        Arc::new(classifier),
        config,
    )))
}

// =========================================================================
// Main API Object
// =========================================================================

/// Thread-safe entry point for the front end.
#[derive(uniffi::Object)]
pub struct DiaSightCore {
    db: Arc<Mutex<Database>>,
    classifier: Arc<dyn Classifier>,
    session: Session,
    config: DiaSightConfig,
}

impl DiaSightCore {
    /// Build around any classifier (tests use a mock).
    pub fn with_classifier(
        db: Database,
        classifier: Arc<dyn Classifier>,
        config: DiaSightConfig,
    ) -> Self {
        Self {
            db: Arc::new(Mutex::new(db)),
            classifier,
            session: Session::new(),
            config,
        }
    }

    /// The session, for registering logout listeners.
    pub fn session(&self) -> &Session {
        &self.session
    }

    fn signed_in_clinician(&self) -> Result<Clinician, DiaSightError> {
        let db = lock_db(&self.db)?;
        Ok(self.session.require_clinician(&db)?)
    }

    fn own_entries_filter(&self, risk_class: Option<String>) -> Result<AuditFilter, DiaSightError> {
        let clinician = self.signed_in_clinician()?;
        Ok(AuditFilter {
            risk_class,
            clinician_id: Some(clinician.clinician_id),
        })
    }
}

#[uniffi::export]
impl DiaSightCore {
    // =========================================================================
    // Clinician & Session Operations
    // =========================================================================

    /// Register a clinician account.
    pub fn register_clinician(
        &self,
        email: String,
        password: String,
        first_name: String,
        last_name: String,
        specialization: Option<String>,
    ) -> Result<FfiClinician, DiaSightError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(DiaSightError::ValidationError(
                "email and password are required".to_string(),
            ));
        }
        let db = lock_db(&self.db)?;
        let mut clinician = Clinician::new(email, first_name, last_name);
        clinician.specialization = specialization;
        db.insert_clinician(&clinician, &password)?;
        Ok(clinician.into())
    }

    /// Sign in with email and password.
    pub fn login(&self, email: String, password: String) -> Result<FfiClinician, DiaSightError> {
        let db = lock_db(&self.db)?;
        let clinician = self.session.login(&db, &email, &password)?;
        Ok(clinician.into())
    }

    /// Sign out. Returns the id that was signed in, if any.
    pub fn logout(&self) -> Result<Option<String>, DiaSightError> {
        Ok(self.session.logout(&self.db)?)
    }

    pub fn current_clinician(&self) -> Result<Option<FfiClinician>, DiaSightError> {
        let db = lock_db(&self.db)?;
        let clinician = self.session.current(&db)?;
        Ok(clinician.map(|c| c.into()))
    }

    // =========================================================================
    // Submission
    // =========================================================================

    /// Submit an assessment as the signed-in clinician.
    ///
    /// Keys are feature names (`age`, `sex`, `hba1c`, ...), values exactly
    /// as entered.
    pub fn submit_assessment(
        &self,
        features: HashMap<String, String>,
    ) -> Result<FfiSubmissionOutcome, DiaSightError> {
        let clinician = self.signed_in_clinician()?;
        let input = FeatureInput::from_pairs(features);
        let outcome = SubmissionPipeline::new(&self.db, self.classifier.as_ref())
            .with_missing_values(self.config.classifier.missing_values)
            .submit(&input, &clinician.clinician_id)?;
        Ok(outcome.into())
    }

    // =========================================================================
    // Audit Trail
    // =========================================================================

    /// The signed-in clinician's audit trail, most recent first.
    pub fn list_audit_entries(
        &self,
        risk_class: Option<String>,
    ) -> Result<Vec<FfiAuditEntry>, DiaSightError> {
        let filter = self.own_entries_filter(risk_class)?;
        let db = lock_db(&self.db)?;
        let views = AuditReader::new(&db).list_audit_entries(&filter)?;
        Ok(views.into_iter().map(|v| v.into()).collect())
    }

    /// One page of the signed-in clinician's audit trail.
    pub fn audit_page(
        &self,
        risk_class: Option<String>,
        page: u32,
    ) -> Result<FfiAuditPage, DiaSightError> {
        let filter = self.own_entries_filter(risk_class)?;
        let db = lock_db(&self.db)?;
        let page = AuditReader::new(&db).page(&filter, self.config.audit.page_size, page)?;
        Ok(page.into())
    }

    /// Risk-class counts for the signed-in clinician.
    pub fn risk_summary(&self) -> Result<FfiRiskSummary, DiaSightError> {
        let clinician = self.signed_in_clinician()?;
        let db = lock_db(&self.db)?;
        let summary = AuditReader::new(&db).risk_summary(Some(&clinician.clinician_id))?;
        Ok(summary.into())
    }

    /// Get a stored feature record by ID.
    pub fn get_feature_record(
        &self,
        record_id: String,
    ) -> Result<Option<FfiFeatureRecord>, DiaSightError> {
        let db = lock_db(&self.db)?;
        let record = db.get_feature_record(&record_id)?;
        Ok(record.map(|r| r.into()))
    }

    // =========================================================================
    // Maintenance
    // =========================================================================

    /// Classify records left unclassified for longer than the configured age.
    pub fn reconcile(&self) -> Result<FfiReconcileReport, DiaSightError> {
        let report = Reconciler::new(&self.db, self.classifier.as_ref())
            .with_missing_values(self.config.classifier.missing_values)
            .run(self.config.reconcile.min_age())?;
        Ok(report.into())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe clinician.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiClinician {
    pub clinician_id: String,
    pub email: String,
    pub display_name: String,
    pub specialization: Option<String>,
}

impl From<Clinician> for FfiClinician {
    fn from(clinician: Clinician) -> Self {
        Self {
            display_name: clinician.display_name(),
            clinician_id: clinician.clinician_id,
            email: clinician.email,
            specialization: clinician.specialization,
        }
    }
}

/// FFI-safe submission outcome.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiSubmissionOutcome {
    pub record_id: String,
    /// `success`, `partial_no_classification` or `partial_not_recorded`
    pub status: String,
    pub risk_label: Option<String>,
    pub probabilities: HashMap<String, f64>,
    pub confidence: Option<f64>,
    pub risk_score: Option<f64>,
    pub classification_id: Option<i64>,
    pub audit_id: Option<i64>,
    pub warnings: Vec<String>,
}

impl From<SubmissionOutcome> for FfiSubmissionOutcome {
    fn from(outcome: SubmissionOutcome) -> Self {
        let status = match outcome.status {
            SubmissionStatus::Success => "success",
            SubmissionStatus::PartialSuccess(PartialReason::NoClassification) => {
                "partial_no_classification"
            }
            SubmissionStatus::PartialSuccess(PartialReason::ClassificationNotRecorded) => {
                "partial_not_recorded"
            }
        };
        let classification = outcome.classification;

        Self {
            record_id: outcome.record_id,
            status: status.to_string(),
            risk_label: classification.as_ref().map(|c| c.label().to_string()),
            probabilities: classification
                .as_ref()
                .map(|c| {
                    c.probabilities
                        .iter()
                        .map(|(class, p)| (class.label().to_string(), *p))
                        .collect()
                })
                .unwrap_or_default(),
            confidence: classification.as_ref().and_then(|c| c.confidence),
            risk_score: classification.as_ref().and_then(|c| c.risk_score),
            classification_id: outcome.classification_id,
            audit_id: outcome.audit_id,
            warnings: outcome.warnings.iter().map(|w| w.message()).collect(),
        }
    }
}

/// FFI-safe lab value.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiLabValue {
    pub field: String,
    pub label: String,
    pub display: String,
}

impl From<audit::LabValue> for FfiLabValue {
    fn from(value: audit::LabValue) -> Self {
        Self {
            field: value.field.name().to_string(),
            label: value.field.label().to_string(),
            display: value.display,
        }
    }
}

/// FFI-safe audit trail entry.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditEntry {
    pub audit_id: i64,
    pub record_id: String,
    pub created_at: String,
    pub date_created: String,
    pub clinician_id: String,
    pub clinician_name: String,
    pub action: String,
    pub risk_label: String,
    /// Slug of the resolved class; None when pending or unrecognized
    pub risk_class: Option<String>,
    pub is_pending: bool,
    /// "classification", "audit_entry" or "pending"
    pub label_source: String,
    pub classification_id: Option<i64>,
    pub lab_values: Vec<FfiLabValue>,
    /// "feature_record", "snapshot" or "missing"
    pub lab_source: String,
}

impl From<AuditView> for FfiAuditEntry {
    fn from(view: AuditView) -> Self {
        Self {
            is_pending: view.is_pending(),
            audit_id: view.audit_id,
            record_id: view.record_id,
            created_at: view.created_at,
            date_created: view.date_created,
            clinician_id: view.clinician_id,
            clinician_name: view.clinician_name,
            action: view.action,
            risk_label: view.risk_label,
            risk_class: view.risk_class.map(|class| class.slug().to_string()),
            label_source: view.label_source.as_str().to_string(),
            classification_id: view.classification_id,
            lab_values: view.lab_values.into_iter().map(|v| v.into()).collect(),
            lab_source: view.lab_source.as_str().to_string(),
        }
    }
}

/// FFI-safe audit page.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAuditPage {
    pub entries: Vec<FfiAuditEntry>,
    pub page: u32,
    pub page_size: u32,
    pub total_entries: u32,
    pub total_pages: u32,
}

impl From<AuditPage> for FfiAuditPage {
    fn from(page: AuditPage) -> Self {
        Self {
            entries: page.entries.into_iter().map(|e| e.into()).collect(),
            page: page.page,
            page_size: page.page_size,
            total_entries: page.total_entries,
            total_pages: page.total_pages,
        }
    }
}

/// FFI-safe risk summary.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiRiskSummary {
    pub no_risk: u32,
    pub mild_risk: u32,
    pub severe_risk: u32,
    pub pending: u32,
    pub other: u32,
    pub total: u32,
}

impl From<RiskSummary> for FfiRiskSummary {
    fn from(summary: RiskSummary) -> Self {
        Self {
            no_risk: summary.no_risk,
            mild_risk: summary.mild_risk,
            severe_risk: summary.severe_risk,
            pending: summary.pending,
            other: summary.other,
            total: summary.total,
        }
    }
}

/// FFI-safe feature record; values rendered for display.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiFeatureRecord {
    pub record_id: String,
    pub created_by: String,
    pub created_at: String,
    pub values: Vec<FfiLabValue>,
}

impl From<FeatureRecord> for FfiFeatureRecord {
    fn from(record: FeatureRecord) -> Self {
        let values = FeatureField::ALL
            .into_iter()
            .map(|field| FfiLabValue {
                field: field.name().to_string(),
                label: field.label().to_string(),
                display: record
                    .value(field)
                    .map(|v| v.to_string())
                    .unwrap_or_else(|| audit::MISSING_VALUE.to_string()),
            })
            .collect();

        Self {
            record_id: record.record_id,
            created_by: record.created_by,
            created_at: record.created_at,
            values,
        }
    }
}

/// FFI-safe reconciliation report.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiReconcileReport {
    pub examined: u32,
    pub classified: u32,
    pub failed: u32,
}

impl From<ReconcileReport> for FfiReconcileReport {
    fn from(report: ReconcileReport) -> Self {
        Self {
            examined: report.examined,
            classified: report.classified,
            failed: report.failed,
        }
    }
}
