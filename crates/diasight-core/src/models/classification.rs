//! Derived risk classifications.

use diasight_classifier::RiskClass;
use serde::{Deserialize, Serialize};

/// A persisted classifier verdict for one feature record.
///
/// Normally there is at most one per record, but nothing enforces it;
/// readers prefer the most recent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    /// Store-assigned id
    pub classification_id: i64,
    /// Feature record this classifies
    pub record_id: String,
    pub risk_class: RiskClass,
    pub created_at: String,
}

impl Classification {
    pub fn label(&self) -> &'static str {
        self.risk_class.label()
    }
}
