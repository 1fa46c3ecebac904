//! Audit trail entries.

use serde::{Deserialize, Serialize};

use super::now_timestamp;

/// What a submission event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditAction {
    /// Feature record stored
    Create,
    /// Classification attached during submission
    Classify,
    /// Classification attached later by the reconciliation job
    Reconcile,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Classify => "CLASSIFY",
            AuditAction::Reconcile => "RECONCILE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(AuditAction::Create),
            "CLASSIFY" => Some(AuditAction::Classify),
            "RECONCILE" => Some(AuditAction::Reconcile),
            _ => None,
        }
    }
}

/// A stored audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Store-assigned id
    pub audit_id: i64,
    pub record_id: String,
    /// Null until a classification is attached
    pub classification_id: Option<i64>,
    /// Denormalized label for filtering without a join
    pub risk_class: Option<String>,
    /// Owning clinician
    pub clinician_id: String,
    pub action: AuditAction,
    /// Legacy JSON blob of lab inputs (read-only compatibility)
    pub lab_snapshot: Option<String>,
    pub created_at: String,
}

/// An audit entry before the store assigns its id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub record_id: String,
    pub classification_id: Option<i64>,
    pub risk_class: Option<String>,
    pub clinician_id: String,
    pub action: AuditAction,
    pub lab_snapshot: Option<String>,
    pub created_at: String,
}

impl NewAuditEntry {
    /// Entry for a freshly stored, not yet classified record.
    pub fn created(record_id: &str, clinician_id: &str) -> Self {
        Self {
            record_id: record_id.to_string(),
            classification_id: None,
            risk_class: None,
            clinician_id: clinician_id.to_string(),
            action: AuditAction::Create,
            lab_snapshot: None,
            created_at: now_timestamp(),
        }
    }
}
