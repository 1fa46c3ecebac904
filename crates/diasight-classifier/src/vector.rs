//! Numeric feature vector sent to the prediction service.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::{ClassifierError, ClassifierResult};

/// Keys the prediction service expects, in request order.
///
/// Note the service's own spellings: `hb1ac`, `chol`, `trig`.
pub const REQUEST_KEYS: [&str; 18] = [
    "age", "sex", "sbp", "dbp", "hbp", "duration", "hb1ac", "ldl", "hdl", "chol", "urea", "bun",
    "uric", "egfr", "trig", "ucr", "alt", "ast",
];

/// What to send for a marker that is missing or not numeric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MissingValuePolicy {
    /// `NaN`, which goes over the wire as JSON `null`
    #[default]
    Nan,
    /// `0`, matching the legacy form behaviour
    Zero,
}

impl MissingValuePolicy {
    pub fn fill(&self) -> f64 {
        match self {
            MissingValuePolicy::Nan => f64::NAN,
            MissingValuePolicy::Zero => 0.0,
        }
    }
}

/// A complete request vector: every key in [`REQUEST_KEYS`] always has a value.
#[derive(Debug, Clone)]
pub struct FeatureVector {
    values: [f64; 18],
}

impl FeatureVector {
    /// A vector with every key set to the policy's missing marker.
    pub fn empty(policy: MissingValuePolicy) -> Self {
        Self {
            values: [policy.fill(); 18],
        }
    }

    /// Build a vector from `(key, value)` pairs; keys not given stay missing.
    pub fn from_entries<'k, I>(entries: I, policy: MissingValuePolicy) -> ClassifierResult<Self>
    where
        I: IntoIterator<Item = (&'k str, Option<f64>)>,
    {
        let mut vector = Self::empty(policy);
        for (key, value) in entries {
            vector.set(key, value.unwrap_or_else(|| policy.fill()))?;
        }
        Ok(vector)
    }

    /// Set one key. Unknown keys are rejected rather than silently dropped.
    pub fn set(&mut self, key: &str, value: f64) -> ClassifierResult<()> {
        let index = key_index(key).ok_or_else(|| ClassifierError::UnknownKey(key.to_string()))?;
        self.values[index] = value;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        key_index(key).map(|index| self.values[index])
    }

    /// Iterate `(key, value)` in request order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, f64)> + '_ {
        REQUEST_KEYS.iter().copied().zip(self.values.iter().copied())
    }

    /// Serialize to the JSON body the service expects.
    pub fn to_json(&self) -> ClassifierResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(REQUEST_KEYS.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, &value)?;
        }
        map.end()
    }
}

fn key_index(key: &str) -> Option<usize> {
    REQUEST_KEYS.iter().position(|k| *k == key)
}
