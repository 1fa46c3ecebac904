//! Risk-class labels.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::ClassifierError;

/// Diabetic retinopathy risk class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskClass {
    #[serde(rename = "No DR")]
    NoRisk,
    #[serde(rename = "Mild DR")]
    MildRisk,
    #[serde(rename = "Severe DR")]
    SevereRisk,
}

impl RiskClass {
    pub const ALL: [RiskClass; 3] = [RiskClass::NoRisk, RiskClass::MildRisk, RiskClass::SevereRisk];

    /// Label as the prediction service spells it.
    pub fn label(&self) -> &'static str {
        match self {
            RiskClass::NoRisk => "No DR",
            RiskClass::MildRisk => "Mild DR",
            RiskClass::SevereRisk => "Severe DR",
        }
    }

    /// Short slug accepted in filters.
    pub fn slug(&self) -> &'static str {
        match self {
            RiskClass::NoRisk => "no-risk",
            RiskClass::MildRisk => "mild-risk",
            RiskClass::SevereRisk => "severe-risk",
        }
    }

    /// Parse a label or slug, ignoring case and surrounding whitespace.
    pub fn parse(text: &str) -> Option<Self> {
        let wanted = text.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|class| class.label().to_lowercase() == wanted || class.slug() == wanted)
    }
}

impl fmt::Display for RiskClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RiskClass {
    type Err = ClassifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
            .ok_or_else(|| ClassifierError::InvalidResponse(format!("unknown risk class '{}'", s)))
    }
}

/// Compare two labels the way the audit trail filter does.
///
/// Known classes compare by class, so a slug matches its label. Anything
/// else (historical free-text labels, the pending sentinel) compares as
/// trimmed, case-insensitive text.
pub fn labels_match(a: &str, b: &str) -> bool {
    match (RiskClass::parse(a), RiskClass::parse(b)) {
        (Some(left), Some(right)) => left == right,
        _ => a.trim().to_lowercase() == b.trim().to_lowercase(),
    }
}
