//! Audit reconstruction: a read-only, display-ready projection of the
//! audit trail.
//!
//! The reader never fails on missing joined data. A record that was never
//! written renders its labs as [`MISSING_VALUE`], a missing classification
//! renders as [`PENDING_LABEL`], an unknown clinician as `Doctor {id}`.

mod resolve;

pub use resolve::{
    date_created, LabSource, LabValue, LabelSource, DEFAULT_ACTION, MISSING_VALUE, PENDING_LABEL,
};

use serde::{Deserialize, Serialize};
use tracing::debug;

use diasight_classifier::{labels_match, RiskClass};

use crate::db::{AuditRow, Database, DbResult};

/// Optional restrictions on the audit listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Resolved label to match (label or slug, trimmed, case-insensitive)
    pub risk_class: Option<String>,
    /// Only entries owned by this clinician
    pub clinician_id: Option<String>,
}

impl AuditFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn risk_class(mut self, label: impl Into<String>) -> Self {
        self.risk_class = Some(label.into());
        self
    }

    pub fn clinician(mut self, clinician_id: impl Into<String>) -> Self {
        self.clinician_id = Some(clinician_id.into());
        self
    }

    fn matches_label(&self, label: &str) -> bool {
        match self.risk_class.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(wanted) => labels_match(label, wanted),
        }
    }
}

/// One audit entry, flattened for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditView {
    pub audit_id: i64,
    pub record_id: String,
    /// Full creation timestamp
    pub created_at: String,
    /// Creation date only (`YYYY-MM-DD`)
    pub date_created: String,
    pub clinician_id: String,
    pub clinician_name: String,
    pub action: String,
    /// Resolved label, or [`PENDING_LABEL`]
    pub risk_label: String,
    pub label_source: LabelSource,
    /// Parsed class, when the label is a known one
    pub risk_class: Option<RiskClass>,
    pub classification_id: Option<i64>,
    /// Every feature field, in intake order
    pub lab_values: Vec<LabValue>,
    pub lab_source: LabSource,
}

impl AuditView {
    fn from_row(row: &AuditRow) -> Self {
        let (risk_label, label_source) = resolve::resolve_label(row);
        let (lab_values, lab_source) = resolve::resolve_labs(row);

        Self {
            audit_id: row.audit_id,
            record_id: row.record_id.clone(),
            created_at: row.created_at.clone(),
            date_created: date_created(&row.created_at),
            clinician_id: row.clinician_id.clone(),
            clinician_name: resolve::resolve_clinician_name(row),
            action: resolve::resolve_action(row),
            risk_class: RiskClass::parse(&risk_label),
            risk_label,
            label_source,
            classification_id: row.classification_id.or(row.entry_classification_id),
            lab_values,
            lab_source,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.label_source == LabelSource::Pending
    }
}

/// A window of the filtered, ordered listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    pub entries: Vec<AuditView>,
    /// 1-based page index actually served
    pub page: u32,
    pub page_size: u32,
    pub total_entries: u32,
    /// Always at least 1
    pub total_pages: u32,
}

/// Entry counts by resolved risk class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskSummary {
    pub no_risk: u32,
    pub mild_risk: u32,
    pub severe_risk: u32,
    pub pending: u32,
    /// Historical labels outside the known classes
    pub other: u32,
    pub total: u32,
}

impl RiskSummary {
    pub fn count(&self, class: RiskClass) -> u32 {
        match class {
            RiskClass::NoRisk => self.no_risk,
            RiskClass::MildRisk => self.mild_risk,
            RiskClass::SevereRisk => self.severe_risk,
        }
    }
}

/// Read-only view over the audit trail.
pub struct AuditReader<'a> {
    db: &'a Database,
}

impl<'a> AuditReader<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// All matching entries, most recent first.
    pub fn list_audit_entries(&self, filter: &AuditFilter) -> DbResult<Vec<AuditView>> {
        let rows = self.db.query_audit_rows(filter.clinician_id.as_deref())?;
        let views: Vec<AuditView> = rows
            .iter()
            .map(AuditView::from_row)
            .filter(|view| filter.matches_label(&view.risk_label))
            .collect();

        debug!(
            total = rows.len(),
            matched = views.len(),
            "Reconstructed audit entries"
        );
        Ok(views)
    }

    /// One page of the listing. Page index and size are clamped rather than
    /// rejected: 0 becomes 1, and a page past the end serves the last page.
    pub fn page(&self, filter: &AuditFilter, page_size: u32, page: u32) -> DbResult<AuditPage> {
        let entries = self.list_audit_entries(filter)?;
        Ok(paginate(entries, page_size, page))
    }

    /// Counts per resolved class for one clinician, or everyone.
    pub fn risk_summary(&self, clinician_id: Option<&str>) -> DbResult<RiskSummary> {
        let filter = AuditFilter {
            risk_class: None,
            clinician_id: clinician_id.map(str::to_string),
        };

        let mut summary = RiskSummary::default();
        for view in self.list_audit_entries(&filter)? {
            summary.total += 1;
            match (view.risk_class, view.label_source) {
                (Some(RiskClass::NoRisk), _) => summary.no_risk += 1,
                (Some(RiskClass::MildRisk), _) => summary.mild_risk += 1,
                (Some(RiskClass::SevereRisk), _) => summary.severe_risk += 1,
                (None, LabelSource::Pending) => summary.pending += 1,
                (None, _) => summary.other += 1,
            }
        }
        Ok(summary)
    }
}

fn paginate(entries: Vec<AuditView>, page_size: u32, page: u32) -> AuditPage {
    let page_size = page_size.max(1);
    let total_entries = u32::try_from(entries.len()).unwrap_or(u32::MAX);
    let total_pages = total_entries.div_ceil(page_size).max(1);
    let page = page.clamp(1, total_pages);

    let start = ((page - 1) as usize).saturating_mul(page_size as usize);
    let entries = entries
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .collect();

    AuditPage {
        entries,
        page,
        page_size,
        total_entries,
        total_pages,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Clinician, FeatureInput, FeatureRecord, NewAuditEntry};

    fn add_entry(db: &Database, clinician_id: &str, created_at: &str) -> FeatureRecord {
        let record = FeatureRecord::new(
            FeatureInput::new()
                .with("age", "54")
                .with("sex", "1")
                .normalize()
                .unwrap(),
            clinician_id.into(),
        );
        db.insert_feature_record(&record).unwrap();
        let mut entry = NewAuditEntry::created(&record.record_id, clinician_id);
        entry.created_at = created_at.into();
        db.insert_audit_entry(&entry).unwrap();
        record
    }

    #[test]
    fn test_list_orders_most_recent_first() {
        let db = Database::open_in_memory().unwrap();
        let older = add_entry(&db, "doc-1", "2024-01-01T00:00:00.000000Z");
        let newer = add_entry(&db, "doc-1", "2024-06-01T00:00:00.000000Z");

        let views = AuditReader::new(&db)
            .list_audit_entries(&AuditFilter::new())
            .unwrap();
        assert_eq!(views.len(), 2);
        assert_eq!(views[0].record_id, newer.record_id);
        assert_eq!(views[1].record_id, older.record_id);
    }

    #[test]
    fn test_unclassified_entry_is_pending() {
        let db = Database::open_in_memory().unwrap();
        add_entry(&db, "doc-1", "2024-01-01T00:00:00.000000Z");

        let views = AuditReader::new(&db)
            .list_audit_entries(&AuditFilter::new())
            .unwrap();
        assert_eq!(views[0].risk_label, "Pending Classification");
        assert!(views[0].is_pending());
        assert_eq!(views[0].clinician_name, "Doctor doc-1");
        assert_eq!(views[0].lab_source, LabSource::FeatureRecord);
        assert_eq!(views[0].date_created, "2024-01-01");
    }

    #[test]
    fn test_clinician_name_from_join() {
        let db = Database::open_in_memory().unwrap();
        let clinician = Clinician::new("ana@clinic.org".into(), "Ana".into(), "Cruz".into());
        db.insert_clinician(&clinician, "pw").unwrap();
        add_entry(&db, &clinician.clinician_id, "2024-01-01T00:00:00.000000Z");

        let views = AuditReader::new(&db)
            .list_audit_entries(&AuditFilter::new())
            .unwrap();
        assert_eq!(views[0].clinician_name, "Dr. Ana Cruz");
    }

    #[test]
    fn test_filter_by_risk_class() {
        let db = Database::open_in_memory().unwrap();
        let severe = add_entry(&db, "doc-1", "2024-01-01T00:00:00.000000Z");
        add_entry(&db, "doc-1", "2024-01-02T00:00:00.000000Z");
        db.insert_classification(&severe.record_id, RiskClass::SevereRisk)
            .unwrap();

        let reader = AuditReader::new(&db);
        for wanted in ["severe-risk", " SEVERE DR ", "Severe DR"] {
            let views = reader
                .list_audit_entries(&AuditFilter::new().risk_class(wanted))
                .unwrap();
            assert_eq!(views.len(), 1, "filter {:?}", wanted);
            assert_eq!(views[0].record_id, severe.record_id);
        }

        let pending = reader
            .list_audit_entries(&AuditFilter::new().risk_class("pending classification"))
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_ne!(pending[0].record_id, severe.record_id);
    }

    #[test]
    fn test_pagination_clamps() {
        let db = Database::open_in_memory().unwrap();
        for day in 1..=5 {
            add_entry(&db, "doc-1", &format!("2024-01-0{}T00:00:00.000000Z", day));
        }
        let reader = AuditReader::new(&db);
        let filter = AuditFilter::new();

        let first = reader.page(&filter, 2, 1).unwrap();
        assert_eq!(first.entries.len(), 2);
        assert_eq!(first.total_entries, 5);
        assert_eq!(first.total_pages, 3);

        let last = reader.page(&filter, 2, 99).unwrap();
        assert_eq!(last.page, 3);
        assert_eq!(last.entries.len(), 1);

        let zero = reader.page(&filter, 0, 0).unwrap();
        assert_eq!(zero.page, 1);
        assert_eq!(zero.page_size, 1);
        assert_eq!(zero.entries.len(), 1);
    }

    #[test]
    fn test_empty_page() {
        let db = Database::open_in_memory().unwrap();
        let page = AuditReader::new(&db)
            .page(&AuditFilter::new(), 10, 3)
            .unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_pages, 1);
        assert!(page.entries.is_empty());
    }

    #[test]
    fn test_risk_summary() {
        let db = Database::open_in_memory().unwrap();
        let a = add_entry(&db, "doc-1", "2024-01-01T00:00:00.000000Z");
        let b = add_entry(&db, "doc-1", "2024-01-02T00:00:00.000000Z");
        add_entry(&db, "doc-1", "2024-01-03T00:00:00.000000Z");
        add_entry(&db, "doc-2", "2024-01-04T00:00:00.000000Z");
        db.insert_classification(&a.record_id, RiskClass::MildRisk)
            .unwrap();
        db.insert_classification(&b.record_id, RiskClass::MildRisk)
            .unwrap();

        let summary = AuditReader::new(&db).risk_summary(Some("doc-1")).unwrap();
        assert_eq!(summary.count(RiskClass::MildRisk), 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.other, 0);
    }
}
