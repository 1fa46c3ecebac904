//! Classifier trait and the hosted HTTP implementation.

use serde::{Deserialize, Serialize};

use crate::{ClassificationResult, ClassifierResult, FeatureVector, MissingValuePolicy};

/// Hosted prediction endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://diasight-deployment-1.onrender.com/predict";

const fn default_timeout_ms() -> u64 {
    10_000
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

/// Anything that can turn a feature vector into a risk classification.
///
/// Implementations make exactly one attempt per call: no retries, no caching.
pub trait Classifier: Send + Sync {
    fn classify(&self, vector: &FeatureVector) -> ClassifierResult<ClassificationResult>;
}

/// Classifier connection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Prediction URL (POST, JSON in and out)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Upper bound on the whole request, in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// How missing or non-numeric markers are encoded
    #[serde(default)]
    pub missing_values: MissingValuePolicy,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            timeout_ms: default_timeout_ms(),
            missing_values: MissingValuePolicy::default(),
        }
    }
}

#[cfg(feature = "http")]
pub use http::HttpClassifier;

#[cfg(feature = "http")]
mod http {
    use std::time::Duration;

    use tracing::{debug, warn};

    use super::{Classifier, ClassifierConfig};
    use crate::{parse_prediction, ClassificationResult, ClassifierError, ClassifierResult, FeatureVector};

    /// Blocking HTTP client for the hosted prediction service.
    pub struct HttpClassifier {
        endpoint: String,
        timeout_ms: u64,
        client: reqwest::blocking::Client,
    }

    impl HttpClassifier {
        /// Build a client with the configured endpoint and timeout.
        pub fn new(config: &ClassifierConfig) -> ClassifierResult<Self> {
            let client = reqwest::blocking::Client::builder()
                .timeout(Duration::from_millis(config.timeout_ms))
                .build()
                .map_err(|e| ClassifierError::Transport(e.to_string()))?;

            Ok(Self {
                endpoint: config.endpoint.clone(),
                timeout_ms: config.timeout_ms,
                client,
            })
        }

        pub fn endpoint(&self) -> &str {
            &self.endpoint
        }

        fn transport_error(&self, error: reqwest::Error) -> ClassifierError {
            if error.is_timeout() {
                ClassifierError::Timeout(self.timeout_ms)
            } else {
                ClassifierError::Transport(error.to_string())
            }
        }
    }

    impl Classifier for HttpClassifier {
        fn classify(&self, vector: &FeatureVector) -> ClassifierResult<ClassificationResult> {
            debug!(endpoint = %self.endpoint, "Requesting risk classification");

            let response = self
                .client
                .post(&self.endpoint)
                .json(vector)
                .send()
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            let body = response.text().map_err(|e| self.transport_error(e))?;

            if !status.is_success() {
                warn!(status = status.as_u16(), "Classifier rejected request");
                return Err(ClassifierError::Status {
                    status: status.as_u16(),
                    body,
                });
            }

            parse_prediction(&body)
        }
    }
}
