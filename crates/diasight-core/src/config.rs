//! Layered configuration.
//!
//! Sources, highest priority first:
//! 1. Environment variables (`DIASIGHT_*`, `__` separates sections)
//! 2. A TOML file (`diasight.toml` in the working directory, or an explicit path)
//! 3. Built-in defaults
//!
//! `DIASIGHT_CLASSIFIER__TIMEOUT_MS=5000` maps to `classifier.timeout_ms`.

use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use diasight_classifier::ClassifierConfig;

/// File looked up in the working directory by [`DiaSightConfig::load`].
pub const CONFIG_FILE: &str = "diasight.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment extraction or merge error.
    #[error("Configuration error: {0}")]
    Figment(#[from] figment::Error),

    /// A configuration field has an invalid value.
    #[error("Invalid configuration value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, created if missing
    pub path: PathBuf,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("diasight.db"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Entries per audit page
    pub page_size: u32,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self { page_size: 10 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Records younger than this are never retried
    pub min_age_minutes: u32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self { min_age_minutes: 15 }
    }
}

impl ReconcileConfig {
    pub fn min_age(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.min_age_minutes))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, overridden by `DIASIGHT_LOG`
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiaSightConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub audit: AuditConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl DiaSightConfig {
    /// Load from defaults, `diasight.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::extract(Self::figment())
    }

    /// Load with an explicit TOML file in place of `diasight.toml`.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("DIASIGHT_").split("__"));
        Self::extract(figment)
    }

    /// Build the provider chain used by [`load`](Self::load).
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        let local_path = PathBuf::from(CONFIG_FILE);
        if local_path.exists() {
            figment = figment.merge(Toml::file(local_path));
        }

        figment.merge(Env::prefixed("DIASIGHT_").split("__"))
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values no component can work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.classifier.endpoint.trim().is_empty() {
            return Err(invalid("classifier.endpoint", "must not be empty"));
        }
        if self.classifier.timeout_ms == 0 {
            return Err(invalid("classifier.timeout_ms", "must be greater than zero"));
        }
        if self.audit.page_size == 0 {
            return Err(invalid("audit.page_size", "must be greater than zero"));
        }
        if self.database.path.as_os_str().is_empty() {
            return Err(invalid("database.path", "must not be empty"));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use diasight_classifier::{MissingValuePolicy, DEFAULT_ENDPOINT};
    use figment::Jail;

    #[test]
    fn test_defaults() {
        Jail::expect_with(|_jail| {
            let config = DiaSightConfig::load().expect("defaults load");
            assert_eq!(config.classifier.endpoint, DEFAULT_ENDPOINT);
            assert_eq!(config.classifier.timeout_ms, 10_000);
            assert_eq!(config.classifier.missing_values, MissingValuePolicy::Nan);
            assert_eq!(config.audit.page_size, 10);
            assert_eq!(config.reconcile.min_age_minutes, 15);
            assert_eq!(config.logging.filter, "info");
            assert!(!config.logging.json);
            Ok(())
        });
    }

    #[test]
    fn test_local_toml_and_env() {
        Jail::expect_with(|jail| {
            jail.create_file(
                CONFIG_FILE,
                r#"
                [classifier]
                endpoint = "http://localhost:8000/predict"
                missing_values = "zero"

                [audit]
                page_size = 25
                "#,
            )?;
            jail.set_env("DIASIGHT_CLASSIFIER__TIMEOUT_MS", "2500");

            let config = DiaSightConfig::load().expect("config loads");
            assert_eq!(config.classifier.endpoint, "http://localhost:8000/predict");
            assert_eq!(config.classifier.missing_values, MissingValuePolicy::Zero);
            assert_eq!(config.classifier.timeout_ms, 2500);
            assert_eq!(config.audit.page_size, 25);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_values_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("DIASIGHT_AUDIT__PAGE_SIZE", "0");
            let err = DiaSightConfig::load().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { ref field, .. } if field == "audit.page_size"));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[database]\npath = \"/tmp/assessments.db\"\n[reconcile]\nmin_age_minutes = 60\n",
        )
        .unwrap();

        let config = DiaSightConfig::load_from(&path).unwrap();
        assert_eq!(config.database.path, PathBuf::from("/tmp/assessments.db"));
        assert_eq!(config.reconcile.min_age(), chrono::Duration::minutes(60));
    }
}
