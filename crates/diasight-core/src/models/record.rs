//! Feature records: one immutable row per assessment.

use diasight_classifier::{ClassifierResult, FeatureVector, MissingValuePolicy};
use serde::{Deserialize, Serialize};

use super::features::{FeatureField, FieldValue, NormalizedFeatures, Sex};
use super::now_timestamp;

/// Raw clinical inputs of one assessment.
///
/// The id is generated locally before anything is persisted so every later
/// write (and the classifier payload) can reference it. Records are never
/// edited; a correction is a new record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Client-generated UUID
    pub record_id: String,
    /// Clinician who submitted the assessment
    pub created_by: String,
    pub age: f64,
    pub sex: Sex,
    pub duration: Option<FieldValue>,
    pub sbp: Option<FieldValue>,
    pub dbp: Option<FieldValue>,
    pub hbp: Option<FieldValue>,
    pub hba1c: Option<FieldValue>,
    pub ldl: Option<FieldValue>,
    pub hdl: Option<FieldValue>,
    pub cholesterol: Option<FieldValue>,
    pub triglycerides: Option<FieldValue>,
    pub urea: Option<FieldValue>,
    pub bun: Option<FieldValue>,
    pub egfr: Option<FieldValue>,
    pub ucr: Option<FieldValue>,
    pub uric: Option<FieldValue>,
    pub alt: Option<FieldValue>,
    pub ast: Option<FieldValue>,
    /// Creation timestamp
    pub created_at: String,
}

impl FeatureRecord {
    /// Create a record with a fresh id from validated features.
    pub fn new(features: NormalizedFeatures, created_by: String) -> Self {
        let NormalizedFeatures {
            age,
            sex,
            mut values,
            ..
        } = features;
        let mut take = |field: FeatureField| values.remove(&field);

        Self {
            record_id: uuid::Uuid::new_v4().to_string(),
            created_by,
            age,
            sex,
            duration: take(FeatureField::Duration),
            sbp: take(FeatureField::Sbp),
            dbp: take(FeatureField::Dbp),
            hbp: take(FeatureField::Hbp),
            hba1c: take(FeatureField::Hba1c),
            ldl: take(FeatureField::Ldl),
            hdl: take(FeatureField::Hdl),
            cholesterol: take(FeatureField::Cholesterol),
            triglycerides: take(FeatureField::Triglycerides),
            urea: take(FeatureField::Urea),
            bun: take(FeatureField::Bun),
            egfr: take(FeatureField::Egfr),
            ucr: take(FeatureField::Ucr),
            uric: take(FeatureField::Uric),
            alt: take(FeatureField::Alt),
            ast: take(FeatureField::Ast),
            created_at: now_timestamp(),
        }
    }

    /// Value of any field; age and sex are always present.
    pub fn value(&self, field: FeatureField) -> Option<FieldValue> {
        let optional = match field {
            FeatureField::Age => return Some(FieldValue::Number(self.age)),
            FeatureField::Sex => return Some(FieldValue::Number(f64::from(self.sex.code()))),
            FeatureField::Duration => &self.duration,
            FeatureField::Sbp => &self.sbp,
            FeatureField::Dbp => &self.dbp,
            FeatureField::Hbp => &self.hbp,
            FeatureField::Hba1c => &self.hba1c,
            FeatureField::Ldl => &self.ldl,
            FeatureField::Hdl => &self.hdl,
            FeatureField::Cholesterol => &self.cholesterol,
            FeatureField::Triglycerides => &self.triglycerides,
            FeatureField::Urea => &self.urea,
            FeatureField::Bun => &self.bun,
            FeatureField::Egfr => &self.egfr,
            FeatureField::Ucr => &self.ucr,
            FeatureField::Uric => &self.uric,
            FeatureField::Alt => &self.alt,
            FeatureField::Ast => &self.ast,
        };
        optional.clone()
    }

    /// Fields holding non-numeric text.
    pub fn flagged_fields(&self) -> Vec<FeatureField> {
        FeatureField::ALL
            .into_iter()
            .filter(|field| self.value(*field).is_some_and(|v| v.is_text()))
            .collect()
    }

    /// Map every field onto the service's keys; text and missing values
    /// become the policy's missing marker.
    pub fn to_feature_vector(&self, policy: MissingValuePolicy) -> ClassifierResult<FeatureVector> {
        FeatureVector::from_entries(
            FeatureField::ALL.into_iter().map(|field| {
                (
                    field.classifier_key(),
                    self.value(field).and_then(|v| v.as_number()),
                )
            }),
            policy,
        )
    }
}
