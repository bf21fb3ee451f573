//! # Feature: Configuration System
//!
//! YAML-based monitoring configuration with environment variable interpolation,
//! falling back to plain environment variables when no file is present.
//!
//! - **Version**: 1.0.0
//! - **Since**: 0.1.0
//! - **Toggleable**: false

use crate::error::MonitorError;
use anyhow::{Context, Result};
use log::info;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

// ============================================================================
// Threshold Sections
// ============================================================================

/// Slowness thresholds in seconds, one per timing kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceThresholds {
    #[serde(default = "default_command_slow")]
    pub command_slow: f64,
    #[serde(default = "default_voice_connect_slow")]
    pub voice_connect_slow: f64,
    #[serde(default = "default_response_slow")]
    pub response_slow: f64,
}

impl Default for PerformanceThresholds {
    fn default() -> Self {
        PerformanceThresholds {
            command_slow: default_command_slow(),
            voice_connect_slow: default_voice_connect_slow(),
            response_slow: default_response_slow(),
        }
    }
}

impl PerformanceThresholds {
    pub fn validate(&self) -> Result<(), MonitorError> {
        positive("thresholds.command_slow", self.command_slow)?;
        positive("thresholds.voice_connect_slow", self.voice_connect_slow)?;
        positive("thresholds.response_slow", self.response_slow)?;
        Ok(())
    }
}

/// Status bands for the health checks. Percentages are 0-100.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthThresholds {
    #[serde(default = "default_resource_warning")]
    pub memory_warning: f64,
    #[serde(default = "default_resource_critical")]
    pub memory_critical: f64,
    #[serde(default = "default_resource_warning")]
    pub cpu_warning: f64,
    #[serde(default = "default_resource_critical")]
    pub cpu_critical: f64,
    #[serde(default = "default_database_slow_secs")]
    pub database_slow_secs: f64,
    #[serde(default = "default_error_rate_warning")]
    pub error_rate_warning: f64,
    #[serde(default = "default_error_rate_critical")]
    pub error_rate_critical: f64,
}

impl Default for HealthThresholds {
    fn default() -> Self {
        HealthThresholds {
            memory_warning: default_resource_warning(),
            memory_critical: default_resource_critical(),
            cpu_warning: default_resource_warning(),
            cpu_critical: default_resource_critical(),
            database_slow_secs: default_database_slow_secs(),
            error_rate_warning: default_error_rate_warning(),
            error_rate_critical: default_error_rate_critical(),
        }
    }
}

impl HealthThresholds {
    pub fn validate(&self) -> Result<(), MonitorError> {
        band("health.memory", self.memory_warning, self.memory_critical)?;
        band("health.cpu", self.cpu_warning, self.cpu_critical)?;
        band("health.error_rate", self.error_rate_warning, self.error_rate_critical)?;
        positive("health.database_slow_secs", self.database_slow_secs)?;
        Ok(())
    }
}

fn positive(name: &str, value: f64) -> Result<(), MonitorError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(MonitorError::config(format!("{name} must be a positive number, got {value}")));
    }
    Ok(())
}

fn band(name: &str, warning: f64, critical: f64) -> Result<(), MonitorError> {
    positive(&format!("{name}_warning"), warning)?;
    positive(&format!("{name}_critical"), critical)?;
    if warning >= critical {
        return Err(MonitorError::config(format!(
            "{name}_warning ({warning}) must be below {name}_critical ({critical})"
        )));
    }
    Ok(())
}

// ============================================================================
// Monitoring Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// SQLite database used by `MonitoringSystem::open`
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Samples kept per metric name
    #[serde(default = "default_metrics_capacity")]
    pub metrics_capacity: usize,

    /// Health samples kept in history
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,

    /// Upper bound for any single store round trip or resource sample
    #[serde(default = "default_operation_timeout_secs")]
    pub operation_timeout_secs: f64,

    #[serde(default)]
    pub thresholds: PerformanceThresholds,

    #[serde(default)]
    pub health: HealthThresholds,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            database_path: default_database_path(),
            log_level: default_log_level(),
            metrics_capacity: default_metrics_capacity(),
            history_capacity: default_history_capacity(),
            operation_timeout_secs: default_operation_timeout_secs(),
            thresholds: PerformanceThresholds::default(),
            health: HealthThresholds::default(),
        }
    }
}

// Default value functions for serde
fn default_database_path() -> String {
    "monitoring.db".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_capacity() -> usize {
    1000
}

fn default_history_capacity() -> usize {
    100
}

fn default_operation_timeout_secs() -> f64 {
    5.0
}

fn default_command_slow() -> f64 {
    2.0
}

fn default_voice_connect_slow() -> f64 {
    5.0
}

fn default_response_slow() -> f64 {
    1.0
}

fn default_resource_warning() -> f64 {
    70.0
}

fn default_resource_critical() -> f64 {
    85.0
}

fn default_database_slow_secs() -> f64 {
    1.0
}

fn default_error_rate_warning() -> f64 {
    5.0
}

fn default_error_rate_critical() -> f64 {
    15.0
}

impl MonitoringConfig {
    /// Load configuration from a YAML file with environment variable interpolation
    ///
    /// Supports `${VAR_NAME}` syntax for environment variable substitution.
    /// Example: `database_path: "${BOT_DATA_DIR}/monitoring.db"`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to load config file: {}", path.display()))?;

        info!("Loaded monitoring config from {}", path.display());
        Ok(config)
    }

    /// Parse and validate YAML content after interpolating environment variables
    pub fn from_yaml(content: &str) -> Result<Self> {
        let interpolated = interpolate_env_vars(content)?;
        let config: MonitoringConfig = serde_yaml::from_str(&interpolated).context("Failed to parse YAML")?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `MONITORING_*` environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = MonitoringConfig::default();
        let config = MonitoringConfig {
            database_path: env::var("MONITORING_DATABASE_PATH").unwrap_or(defaults.database_path),
            log_level: env::var("MONITORING_LOG_LEVEL").unwrap_or(defaults.log_level),
            metrics_capacity: parse_env("MONITORING_METRICS_CAPACITY", defaults.metrics_capacity)?,
            history_capacity: parse_env("MONITORING_HISTORY_CAPACITY", defaults.history_capacity)?,
            operation_timeout_secs: parse_env("MONITORING_TIMEOUT_SECS", defaults.operation_timeout_secs)?,
            thresholds: defaults.thresholds,
            health: defaults.health,
        };
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect and load configuration
    ///
    /// Priority order:
    /// 1. If MONITORING_CONFIG env var is set, load from that file
    /// 2. If monitoring.yaml exists in current directory, load from it
    /// 3. Fall back to environment variables
    pub fn auto_load() -> Result<Self> {
        if let Ok(config_path) = env::var("MONITORING_CONFIG") {
            info!("Loading config from MONITORING_CONFIG: {}", config_path);
            return Self::from_file(&config_path);
        }

        let default_config_path = "monitoring.yaml";
        if Path::new(default_config_path).exists() {
            info!("Loading config from {}", default_config_path);
            return Self::from_file(default_config_path);
        }

        info!("No config file found, using environment variables");
        Self::from_env()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), MonitorError> {
        if self.database_path.is_empty() {
            return Err(MonitorError::config("database_path is required"));
        }
        if self.metrics_capacity == 0 {
            return Err(MonitorError::config("metrics_capacity must be greater than zero"));
        }
        if self.history_capacity == 0 {
            return Err(MonitorError::config("history_capacity must be greater than zero"));
        }
        positive("operation_timeout_secs", self.operation_timeout_secs)?;
        self.thresholds.validate()?;
        self.health.validate()?;
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs_f64(self.operation_timeout_secs)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{name} has invalid value '{raw}': {e}")),
        Err(_) => Ok(default),
    }
}

// ============================================================================
// Environment Variable Interpolation
// ============================================================================

/// Interpolate environment variables in a string
///
/// Supports `${VAR_NAME}` syntax. If a variable is not set, returns an error.
/// Use `${VAR_NAME:-default}` for default values.
fn interpolate_env_vars(content: &str) -> Result<String> {
    // Pattern: ${VAR_NAME} or ${VAR_NAME:-default}
    let re = Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")?;

    let mut result = content.to_string();
    let mut errors = Vec::new();

    for cap in re.captures_iter(content) {
        let full_match = &cap[0];
        let var_name = &cap[1];
        let default_value = cap.get(2).map(|m| m.as_str());

        let value = match env::var(var_name) {
            Ok(v) => v,
            Err(_) => {
                if let Some(default) = default_value {
                    default.to_string()
                } else {
                    errors.push(format!("Environment variable '{}' is not set", var_name));
                    continue;
                }
            }
        };

        result = result.replace(full_match, &value);
    }

    if !errors.is_empty() {
        anyhow::bail!("Missing environment variables:\n  - {}", errors.join("\n  - "));
    }

    Ok(result)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = MonitoringConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.metrics_capacity, 1000);
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.thresholds.command_slow, 2.0);
        assert_eq!(config.thresholds.voice_connect_slow, 5.0);
        assert_eq!(config.thresholds.response_slow, 1.0);
        assert_eq!(config.operation_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_interpolate_env_vars_simple() {
        env::set_var("MONITORING_TEST_VAR_1", "value1");
        let input = "key: ${MONITORING_TEST_VAR_1}";
        let result = interpolate_env_vars(input).unwrap();
        assert_eq!(result, "key: value1");
        env::remove_var("MONITORING_TEST_VAR_1");
    }

    #[test]
    fn test_interpolate_env_vars_with_default() {
        env::remove_var("MONITORING_NONEXISTENT_VAR");
        let input = "key: ${MONITORING_NONEXISTENT_VAR:-default_value}";
        let result = interpolate_env_vars(input).unwrap();
        assert_eq!(result, "key: default_value");
    }

    #[test]
    fn test_interpolate_env_vars_missing_no_default() {
        env::remove_var("MONITORING_MISSING_VAR_FOR_TEST");
        let input = "key: ${MONITORING_MISSING_VAR_FOR_TEST}";
        assert!(interpolate_env_vars(input).is_err());
    }

    #[test]
    fn test_config_from_yaml() {
        env::set_var("MONITORING_TEST_DATA_DIR", "/var/lib/bot");

        let yaml = r#"
database_path: "${MONITORING_TEST_DATA_DIR}/monitoring.db"
log_level: "debug"
metrics_capacity: 250
thresholds:
  command_slow: 3.0
health:
  memory_warning: 60
  memory_critical: 80
"#;

        let config = MonitoringConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.database_path, "/var/lib/bot/monitoring.db");
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.metrics_capacity, 250);
        assert_eq!(config.history_capacity, 100);
        assert_eq!(config.thresholds.command_slow, 3.0);
        assert_eq!(config.thresholds.voice_connect_slow, 5.0);
        assert_eq!(config.health.memory_warning, 60.0);
        assert_eq!(config.health.cpu_critical, 85.0);

        env::remove_var("MONITORING_TEST_DATA_DIR");
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let config = MonitoringConfig {
            metrics_capacity: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, MonitorError::Config(_)));
        assert!(err.to_string().contains("metrics_capacity"));
    }

    #[test]
    fn test_validation_rejects_inverted_band() {
        let mut config = MonitoringConfig::default();
        config.health.error_rate_warning = 20.0;
        config.health.error_rate_critical = 15.0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("health.error_rate_warning"));
    }

    #[test]
    fn test_validation_rejects_non_finite_threshold() {
        let mut config = MonitoringConfig::default();
        config.thresholds.response_slow = f64::NAN;
        assert!(config.validate().is_err());

        config.thresholds.response_slow = 1.0;
        config.operation_timeout_secs = 0.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_yaml_with_invalid_values_fails() {
        let yaml = "history_capacity: 0\n";
        assert!(MonitoringConfig::from_yaml(yaml).is_err());
    }
}
