//! Fallback chains that turn a stored audit row into display values.
//!
//! Each chain is an ordered list of resolvers; the first one that yields a
//! value wins and its tag records which source fired.

use serde::{Deserialize, Serialize};
use tracing::debug;

use diasight_classifier::RiskClass;

use crate::db::AuditRow;
use crate::models::{FeatureField, FieldValue};

/// Label shown when no source yields a risk class.
pub const PENDING_LABEL: &str = "Pending Classification";

/// Shown for any lab value that cannot be resolved.
pub const MISSING_VALUE: &str = "—";

/// Action shown when the stored tag is absent.
pub const DEFAULT_ACTION: &str = "CREATE";

/// Where a resolved risk label came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabelSource {
    /// Latest joined classification row
    Classification,
    /// Label denormalized onto the audit entry
    AuditEntry,
    /// Nothing found
    Pending,
}

impl LabelSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabelSource::Classification => "classification",
            LabelSource::AuditEntry => "audit_entry",
            LabelSource::Pending => "pending",
        }
    }
}

/// Where the displayed lab values came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LabSource {
    /// Joined feature record
    FeatureRecord,
    /// Legacy JSON blob on the audit entry
    Snapshot,
    /// Nothing found
    Missing,
}

impl LabSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabSource::FeatureRecord => "feature_record",
            LabSource::Snapshot => "snapshot",
            LabSource::Missing => "missing",
        }
    }
}

/// One lab field ready for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabValue {
    pub field: FeatureField,
    pub display: String,
}

type LabelResolver = fn(&AuditRow) -> Option<String>;
type LabResolver = fn(&AuditRow) -> Option<Vec<LabValue>>;

const LABEL_RESOLVERS: &[(LabelSource, LabelResolver)] = &[
    (LabelSource::Classification, label_from_classification),
    (LabelSource::AuditEntry, label_from_entry),
];

const LAB_RESOLVERS: &[(LabSource, LabResolver)] = &[
    (LabSource::FeatureRecord, labs_from_record),
    (LabSource::Snapshot, labs_from_snapshot),
];

/// Resolve the risk label: live classification, then the entry's own
/// label, then [`PENDING_LABEL`].
pub fn resolve_label(row: &AuditRow) -> (String, LabelSource) {
    LABEL_RESOLVERS
        .iter()
        .find_map(|(source, resolve)| resolve(row).map(|label| (label, *source)))
        .unwrap_or_else(|| (PENDING_LABEL.to_string(), LabelSource::Pending))
}

/// Resolve lab values: joined record, then legacy snapshot, then all
/// [`MISSING_VALUE`].
pub fn resolve_labs(row: &AuditRow) -> (Vec<LabValue>, LabSource) {
    LAB_RESOLVERS
        .iter()
        .find_map(|(source, resolve)| resolve(row).map(|labs| (labs, *source)))
        .unwrap_or_else(|| {
            let labs = FeatureField::ALL
                .into_iter()
                .map(|field| LabValue {
                    field,
                    display: MISSING_VALUE.to_string(),
                })
                .collect();
            (labs, LabSource::Missing)
        })
}

/// "Dr. First Last" when the clinician joined, "Doctor {id}" otherwise.
pub fn resolve_clinician_name(row: &AuditRow) -> String {
    let first = row.clinician_first_name.as_deref().map(str::trim).unwrap_or("");
    let last = row.clinician_last_name.as_deref().map(str::trim).unwrap_or("");
    let name = [first, last]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if name.is_empty() {
        format!("Doctor {}", row.clinician_id)
    } else {
        format!("Dr. {}", name)
    }
}

pub fn resolve_action(row: &AuditRow) -> String {
    non_empty(row.action.as_deref()).unwrap_or_else(|| DEFAULT_ACTION.to_string())
}

/// Calendar date of an RFC 3339 timestamp; the raw value if it does not parse.
pub fn date_created(created_at: &str) -> String {
    chrono::DateTime::parse_from_rfc3339(created_at)
        .map(|ts| ts.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|_| created_at.to_string())
}

fn label_from_classification(row: &AuditRow) -> Option<String> {
    canonical_label(row.classification_label.as_deref())
}

fn label_from_entry(row: &AuditRow) -> Option<String> {
    canonical_label(row.entry_label.as_deref())
}

/// Known labels are normalized to their canonical spelling; unknown
/// historical labels are shown trimmed.
fn canonical_label(label: Option<&str>) -> Option<String> {
    let label = non_empty(label)?;
    Some(
        RiskClass::parse(&label)
            .map(|class| class.label().to_string())
            .unwrap_or(label),
    )
}

fn labs_from_record(row: &AuditRow) -> Option<Vec<LabValue>> {
    let record = row.record.as_ref()?;
    Some(
        FeatureField::ALL
            .into_iter()
            .map(|field| LabValue {
                field,
                display: display_value(record.value(field)),
            })
            .collect(),
    )
}

fn labs_from_snapshot(row: &AuditRow) -> Option<Vec<LabValue>> {
    let raw = non_empty(row.lab_snapshot.as_deref())?;
    let snapshot: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(&raw) {
        Ok(map) => map,
        Err(e) => {
            debug!(audit_id = row.audit_id, error = %e, "Ignoring unreadable lab snapshot");
            return None;
        }
    };

    Some(
        FeatureField::ALL
            .into_iter()
            .map(|field| {
                let value = snapshot
                    .get(field.name())
                    .or_else(|| snapshot.get(field.classifier_key()));
                LabValue {
                    field,
                    display: display_json(value),
                }
            })
            .collect(),
    )
}

fn display_value(value: Option<FieldValue>) -> String {
    match value {
        Some(FieldValue::Text(text)) if text.trim().is_empty() => MISSING_VALUE.to_string(),
        Some(value) => value.to_string(),
        None => MISSING_VALUE.to_string(),
    }
}

fn display_json(value: Option<&serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::Number(n)) => match n.as_f64() {
            Some(f) => FieldValue::Number(f).to_string(),
            None => n.to_string(),
        },
        Some(serde_json::Value::String(s)) => display_value(FieldValue::from_form(s)),
        Some(serde_json::Value::Bool(b)) => b.to_string(),
        _ => MISSING_VALUE.to_string(),
    }
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
