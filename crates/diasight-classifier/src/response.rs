//! Prediction response parsing.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{ClassifierError, ClassifierResult, RiskClass};

/// Raw payload as the service sends it.
#[derive(Debug, Deserialize)]
struct RawPrediction {
    prediction: String,
    #[serde(default)]
    probabilities: Option<HashMap<String, f64>>,
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    risk_score: Option<f64>,
}

/// A validated prediction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    /// Predicted risk class
    pub risk_class: RiskClass,
    /// Per-class probabilities in [0, 1]; may be empty
    pub probabilities: BTreeMap<RiskClass, f64>,
    /// Model confidence, when reported
    pub confidence: Option<f64>,
    /// Continuous risk score, when reported
    pub risk_score: Option<f64>,
}

impl ClassificationResult {
    /// Label as the service spells it.
    pub fn label(&self) -> &'static str {
        self.risk_class.label()
    }

    pub fn probability(&self, class: RiskClass) -> Option<f64> {
        self.probabilities.get(&class).copied()
    }
}

/// Parse a prediction body.
///
/// The label must be one of the three known classes. Probabilities for
/// unknown keys are dropped with a warning; out-of-range probabilities
/// reject the whole response.
pub fn parse_prediction(body: &str) -> ClassifierResult<ClassificationResult> {
    let raw: RawPrediction = serde_json::from_str(body)?;

    let risk_class = RiskClass::parse(&raw.prediction).ok_or_else(|| {
        ClassifierError::InvalidResponse(format!("unknown prediction label '{}'", raw.prediction))
    })?;

    let mut probabilities = BTreeMap::new();
    for (key, probability) in raw.probabilities.unwrap_or_default() {
        let Some(class) = RiskClass::parse(&key) else {
            warn!(label = %key, "Ignoring probability for unknown class");
            continue;
        };
        if !(0.0..=1.0).contains(&probability) {
            return Err(ClassifierError::InvalidResponse(format!(
                "probability for '{}' out of range: {}",
                key, probability
            )));
        }
        probabilities.insert(class, probability);
    }

    Ok(ClassificationResult {
        risk_class,
        probabilities,
        confidence: raw.confidence,
        risk_score: raw.risk_score,
    })
}
