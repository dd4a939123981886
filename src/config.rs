use serde::Deserialize;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::detection::{DetectionError, DetectionSettings};
use crate::logging::{LogRotation, LoggingConfig};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Validation(#[from] DetectionError),
    #[error("Invalid logging configuration: {0}")]
    Logging(String),
}

/// Logging configuration from config.toml
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingTomlConfig {
    pub log_dir: Option<String>,
    pub level_filter: Option<String>,
    /// "daily", "hourly" or "never"
    pub rotation: Option<String>,
    pub console_timestamps: Option<bool>,
    pub file_json_format: Option<bool>,
    /// Write rotating log files next to console output
    pub file_output: Option<bool>,
    /// Days to keep log files
    pub cleanup_days: Option<u32>,
}

impl LoggingTomlConfig {
    pub fn file_output(&self) -> bool {
        self.file_output.unwrap_or(false)
    }

    /// Fill unset fields from the logging defaults
    pub fn to_logging_config(&self) -> Result<LoggingConfig, ConfigError> {
        let defaults = LoggingConfig::default();
        let rotation = match &self.rotation {
            Some(rotation) => rotation.parse::<LogRotation>().map_err(ConfigError::Logging)?,
            None => defaults.rotation,
        };

        Ok(LoggingConfig {
            log_dir: self.log_dir.clone().unwrap_or(defaults.log_dir),
            level_filter: self.level_filter.clone().unwrap_or(defaults.level_filter),
            rotation,
            console_timestamps: self.console_timestamps.unwrap_or(defaults.console_timestamps),
            file_json_format: self.file_json_format.unwrap_or(defaults.file_json_format),
        })
    }
}

/// Full TOML configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub detection: DetectionSettings,
    #[serde(default)]
    pub logging: LoggingTomlConfig,
}

impl AppConfig {
    /// Load and validate configuration from a TOML file
    pub fn from_toml<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let config_content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_toml_str(&config_content)?;
        info!(path = %path.display(), "📋 Configuration loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: AppConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.detection.validate()?;
        self.logging.to_logging_config()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.detection, DetectionSettings::default());
        assert!(!config.logging.file_output());
        assert_eq!(config.logging.to_logging_config().unwrap(), LoggingConfig::default());
    }

    #[test]
    fn test_detector_sections_override_defaults() {
        let content = r#"
            [[detection.slow_span]]
            duration_threshold = 250.0
            allowed_span_ops = ["db.redis"]

            [detection.render_blocking_assets]
            fcp_minimum_threshold = 1000.0
            fcp_maximum_threshold = 5000.0
            fcp_ratio_threshold = 0.5
            allowed_span_ops = ["resource.script"]

            [[detection.n_plus_one]]
            allowed_span_ops = ["http.client"]

            [logging]
            level_filter = "debug"
            rotation = "hourly"
        "#;
        let config = AppConfig::from_toml_str(content).unwrap();

        assert_eq!(config.detection.slow_span.len(), 1);
        assert_eq!(config.detection.slow_span[0].duration_threshold, 250.0);
        assert_eq!(config.detection.render_blocking_asset_span.fcp_ratio_threshold, 0.5);
        assert_eq!(config.detection.n_plus_one_spans[0].count, 10);
        assert_eq!(config.detection.n_plus_one_spans[0].start_time_threshold, 0.0);
        // Untouched sections keep their defaults
        assert_eq!(config.detection.duplicate_spans, DetectionSettings::default().duplicate_spans);

        let logging = config.logging.to_logging_config().unwrap();
        assert_eq!(logging.level_filter, "debug");
        assert_eq!(logging.rotation, LogRotation::Hourly);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let content = r#"
            [detection.render_blocking_assets]
            fcp_minimum_threshold = 9000.0
            fcp_maximum_threshold = 3000.0
            fcp_ratio_threshold = 0.25
        "#;
        match AppConfig::from_toml_str(content) {
            Err(ConfigError::Validation(DetectionError::InvalidSettings { detector, .. })) => {
                assert_eq!(detector, "render_blocking_assets");
            }
            other => panic!("Expected validation error, got: {:?}", other),
        }

        let bad_rotation = "[logging]\nrotation = \"weekly\"\n";
        assert!(matches!(AppConfig::from_toml_str(bad_rotation), Err(ConfigError::Logging(_))));
    }

    #[test]
    fn test_from_toml_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[[detection.duplicates]]").unwrap();
        writeln!(file, "count = 2").unwrap();
        writeln!(file, "cumulative_duration = 100.0").unwrap();
        writeln!(file, "allowed_span_ops = [\"db\"]").unwrap();

        let config = AppConfig::from_toml(file.path()).unwrap();
        assert_eq!(config.detection.duplicate_spans[0].count, 2);

        let missing = AppConfig::from_toml("/nonexistent/config.toml");
        assert!(matches!(missing, Err(ConfigError::Io { .. })));
    }

    #[test]
    fn test_malformed_toml_rejected() {
        assert!(matches!(
            AppConfig::from_toml_str("[detection\nslow_span = 1"),
            Err(ConfigError::Toml(_))
        ));
    }
}
