//! Clinical feature catalogue and form-value normalization.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One of the eighteen clinical inputs of an assessment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureField {
    Age,
    Sex,
    Duration,
    Sbp,
    Dbp,
    Hbp,
    Hba1c,
    Ldl,
    Hdl,
    Cholesterol,
    Triglycerides,
    Urea,
    Bun,
    Egfr,
    Ucr,
    Uric,
    Alt,
    Ast,
}

impl FeatureField {
    /// Every field, in intake order.
    pub const ALL: [FeatureField; 18] = [
        FeatureField::Age,
        FeatureField::Sex,
        FeatureField::Duration,
        FeatureField::Sbp,
        FeatureField::Dbp,
        FeatureField::Hbp,
        FeatureField::Hba1c,
        FeatureField::Ldl,
        FeatureField::Hdl,
        FeatureField::Cholesterol,
        FeatureField::Triglycerides,
        FeatureField::Urea,
        FeatureField::Bun,
        FeatureField::Egfr,
        FeatureField::Ucr,
        FeatureField::Uric,
        FeatureField::Alt,
        FeatureField::Ast,
    ];

    /// Internal (storage and form) name.
    pub fn name(&self) -> &'static str {
        match self {
            FeatureField::Age => "age",
            FeatureField::Sex => "sex",
            FeatureField::Duration => "duration",
            FeatureField::Sbp => "sbp",
            FeatureField::Dbp => "dbp",
            FeatureField::Hbp => "hbp",
            FeatureField::Hba1c => "hba1c",
            FeatureField::Ldl => "ldl",
            FeatureField::Hdl => "hdl",
            FeatureField::Cholesterol => "cholesterol",
            FeatureField::Triglycerides => "triglycerides",
            FeatureField::Urea => "urea",
            FeatureField::Bun => "bun",
            FeatureField::Egfr => "egfr",
            FeatureField::Ucr => "ucr",
            FeatureField::Uric => "uric",
            FeatureField::Alt => "alt",
            FeatureField::Ast => "ast",
        }
    }

    /// Key the prediction service expects for this field.
    pub fn classifier_key(&self) -> &'static str {
        match self {
            FeatureField::Hba1c => "hb1ac",
            FeatureField::Cholesterol => "chol",
            FeatureField::Triglycerides => "trig",
            other => other.name(),
        }
    }

    /// Human-readable label for display.
    pub fn label(&self) -> &'static str {
        match self {
            FeatureField::Age => "Age",
            FeatureField::Sex => "Sex",
            FeatureField::Duration => "Duration of diabetes",
            FeatureField::Sbp => "Systolic blood pressure",
            FeatureField::Dbp => "Diastolic blood pressure",
            FeatureField::Hbp => "High blood pressure",
            FeatureField::Hba1c => "HbA1c",
            FeatureField::Ldl => "Low density lipoprotein",
            FeatureField::Hdl => "High density lipoprotein",
            FeatureField::Cholesterol => "Cholesterol",
            FeatureField::Triglycerides => "Triglycerides",
            FeatureField::Urea => "Serum urea",
            FeatureField::Bun => "Blood urea nitrogen",
            FeatureField::Egfr => "Estimated glomerular filtration rate",
            FeatureField::Ucr => "Urinary creatinine",
            FeatureField::Uric => "Uric acid",
            FeatureField::Alt => "Alanine aminotransferase",
            FeatureField::Ast => "Aspartate aminotransferase",
        }
    }

    /// Look up a field by internal name (trimmed, case-insensitive).
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_lowercase();
        Self::ALL.into_iter().find(|field| field.name() == wanted)
    }

    /// Age and sex must always be present.
    pub fn is_required(&self) -> bool {
        matches!(self, FeatureField::Age | FeatureField::Sex)
    }
}

impl fmt::Display for FeatureField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A stored clinical value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    /// Rare textual entry, passed through and flagged
    Text(String),
}

impl FieldValue {
    /// Normalize a raw form value.
    ///
    /// Empty input is absent (`None`, never zero); anything that parses as a
    /// finite number becomes [`FieldValue::Number`]; everything else is kept
    /// verbatim as [`FieldValue::Text`].
    pub fn from_form(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        match trimmed.parse::<f64>() {
            Ok(number) if number.is_finite() => Some(FieldValue::Number(number)),
            _ => Some(FieldValue::Text(raw.to_string())),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, FieldValue::Text(_))
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => write!(f, "{}", n),
            FieldValue::Text(text) => f.write_str(text),
        }
    }
}

/// Sex code from the closed two-value set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sex {
    Male,
    Female,
}

impl Sex {
    pub fn code(&self) -> u8 {
        match self {
            Sex::Male => 1,
            Sex::Female => 2,
        }
    }

    pub fn from_code(code: f64) -> Option<Self> {
        if code == 1.0 {
            Some(Sex::Male)
        } else if code == 2.0 {
            Some(Sex::Female)
        } else {
            None
        }
    }
}

/// Validation failures that block an assessment from being stored.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Missing required field: {0}")]
    MissingField(FeatureField),

    #[error("Field {field} must be numeric, got '{value}'")]
    NotNumeric { field: FeatureField, value: String },

    #[error("Age must be between 0 and 150, got {0}")]
    AgeOutOfRange(f64),

    #[error("Sex must be 1 (male) or 2 (female), got '{0}'")]
    InvalidSex(String),

    #[error("Field {field} given twice, as '{first}' and '{second}'")]
    DuplicateField {
        field: FeatureField,
        first: String,
        second: String,
    },
}

/// Raw intake form values keyed by field name, exactly as entered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureInput {
    values: BTreeMap<String, String>,
}

impl FeatureInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut input = Self::new();
        for (name, value) in pairs {
            input.set(name, value);
        }
        input
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.values.insert(name.into(), value.into());
    }

    /// Builder form of [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(name, value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Normalize and validate.
    ///
    /// Only age and sex are checked strictly; every other field is optional
    /// and a non-numeric entry is kept and reported in `flagged`.
    pub fn normalize(&self) -> Result<NormalizedFeatures, ValidationError> {
        let mut values = BTreeMap::new();
        let mut sources: BTreeMap<FeatureField, &str> = BTreeMap::new();
        for (name, raw) in &self.values {
            let field = FeatureField::from_name(name)
                .ok_or_else(|| ValidationError::UnknownField(name.clone()))?;
            // "AGE" and " age" name the same field; neither may win silently
            if let Some(first) = sources.insert(field, name) {
                return Err(ValidationError::DuplicateField {
                    field,
                    first: first.to_string(),
                    second: name.clone(),
                });
            }
            if let Some(value) = FieldValue::from_form(raw) {
                values.insert(field, value);
            }
        }

        let age = match values.remove(&FeatureField::Age) {
            None => return Err(ValidationError::MissingField(FeatureField::Age)),
            Some(FieldValue::Text(value)) => {
                return Err(ValidationError::NotNumeric {
                    field: FeatureField::Age,
                    value,
                })
            }
            Some(FieldValue::Number(age)) if !(0.0..=150.0).contains(&age) => {
                return Err(ValidationError::AgeOutOfRange(age))
            }
            Some(FieldValue::Number(age)) => age,
        };

        let sex = match values.remove(&FeatureField::Sex) {
            None => return Err(ValidationError::MissingField(FeatureField::Sex)),
            Some(FieldValue::Number(code)) => {
                Sex::from_code(code).ok_or_else(|| ValidationError::InvalidSex(code.to_string()))?
            }
            Some(FieldValue::Text(value)) => return Err(ValidationError::InvalidSex(value)),
        };

        let flagged = values
            .iter()
            .filter(|(_, value)| value.is_text())
            .map(|(field, _)| *field)
            .collect();

        Ok(NormalizedFeatures {
            age,
            sex,
            values,
            flagged,
        })
    }
}

/// Validated features ready to become a record.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFeatures {
    pub age: f64,
    pub sex: Sex,
    /// Optional fields that were present; absent fields are simply missing
    pub values: BTreeMap<FeatureField, FieldValue>,
    /// Optional fields holding non-numeric text
    pub flagged: Vec<FeatureField>,
}
