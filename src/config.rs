use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::baseline::BaselineConfig;
use crate::error::{ConfigError, VitalRsError};
use crate::illness::IllnessConfig;
use crate::load::LoadConfig;
use crate::logging::LogConfig;
use crate::models::UserPhysiology;
use crate::pipeline::PipelineConfig;
use crate::pmc::PmcConfig;
use crate::recovery::RecoveryConfig;
use crate::sleep::SleepConfig;
use crate::strain::StrainConfig;
use crate::stress::StressWeights;

/// Main application configuration
///
/// Every section is optional in the TOML file; missing sections and keys
/// take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub metadata: ConfigMetadata,

    /// User physiological constants used by load estimation
    pub physiology: UserPhysiology,

    pub pipeline: PipelineConfig,
    pub baseline: BaselineConfig,
    pub load: LoadConfig,

    /// Performance Management Chart settings
    pub pmc: PmcConfig,

    pub recovery: RecoveryConfig,
    pub sleep: SleepConfig,
    pub strain: StrainConfig,
    pub illness: IllnessConfig,
    pub stress: StressWeights,
    pub logging: LogConfig,
}

/// Configuration metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigMetadata {
    /// Configuration format version
    pub version: String,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Default for ConfigMetadata {
    fn default() -> Self {
        let now = Utc::now();
        ConfigMetadata {
            version: "1.0".to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            metadata: ConfigMetadata::default(),
            physiology: UserPhysiology::default(),
            pipeline: PipelineConfig::default(),
            baseline: BaselineConfig::default(),
            load: LoadConfig::default(),
            pmc: PmcConfig::default(),
            recovery: RecoveryConfig::default(),
            sleep: SleepConfig::default(),
            strain: StrainConfig::default(),
            illness: IllnessConfig::default(),
            stress: StressWeights::default(),
            logging: LogConfig::default(),
        }
    }
}

/// Configuration management implementation
impl AppConfig {
    /// Load configuration from TOML file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: AppConfig =
            toml::from_str(&content).with_context(|| "Failed to parse TOML configuration")?;

        config
            .validate()
            .with_context(|| format!("Invalid configuration in {}", path.as_ref().display()))?;

        Ok(config)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        self.metadata.updated_at = Utc::now();

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let toml_content = toml::to_string_pretty(self)
            .with_context(|| "Failed to serialize configuration to TOML")?;

        fs::write(&path, toml_content)
            .with_context(|| format!("Failed to write config file: {}", path.as_ref().display()))?;

        Ok(())
    }

    /// Get default configuration file path
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".vitalrs")
            .join("config.toml")
    }

    /// Load configuration with fallback to defaults
    pub fn load_or_default() -> Self {
        let config_path = Self::default_config_path();

        match Self::load_from_file(&config_path) {
            Ok(config) => config,
            Err(e) => {
                tracing::debug!(
                    path = %config_path.display(),
                    error = %e,
                    "Using default configuration"
                );
                Self::default()
            }
        }
    }

    /// Check values that would make the engines meaningless
    pub fn validate(&self) -> std::result::Result<(), VitalRsError> {
        let invalid = |key: &str, reason: &str| -> VitalRsError {
            ConfigError::InvalidValue {
                key: key.to_string(),
                reason: reason.to_string(),
            }
            .into()
        };

        if self.baseline.min_samples == 0 {
            return Err(invalid("baseline.min_samples", "must be at least 1"));
        }

        self.pmc
            .validate()
            .map_err(|e| invalid("pmc", &e.to_string()))?;

        let w = &self.recovery.weights;
        check_weights(&[w.hrv, w.resting_hr, w.sleep, w.respiratory_rate, w.form])
            .map_err(|reason| invalid("recovery.weights", reason))?;

        let w = &self.sleep.weights;
        check_weights(&[w.duration, w.efficiency, w.stages, w.continuity])
            .map_err(|reason| invalid("sleep.weights", reason))?;

        if !(self.sleep.sleep_need_hours > 0.0 && self.sleep.sleep_need_hours <= 16.0) {
            return Err(invalid("sleep.sleep_need_hours", "must be within (0, 16]"));
        }

        let s = &self.strain;
        check_weights(&[s.cardio_weight, s.strength_weight, s.activity_weight])
            .map_err(|reason| invalid("strain", reason))?;

        if !(0.0..=1.0).contains(&self.illness.min_confidence) {
            return Err(invalid("illness.min_confidence", "must be within [0, 1]"));
        }

        let i = &self.illness;
        if !(i.moderate_excess_ratio >= 1.0 && i.high_excess_ratio >= i.moderate_excess_ratio) {
            return Err(invalid(
                "illness.high_excess_ratio",
                "severity ratios must satisfy 1 <= moderate <= high",
            ));
        }

        if self.illness.window_days < 2 {
            return Err(invalid("illness.window_days", "must be at least 2"));
        }

        if self.pipeline.history_days == 0 {
            return Err(invalid("pipeline.history_days", "must be at least 1"));
        }

        Ok(())
    }
}

fn check_weights(weights: &[f64]) -> std::result::Result<(), &'static str> {
    if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
        return Err("weights must be finite and non-negative");
    }
    if weights.iter().sum::<f64>() <= 0.0 {
        return Err("at least one weight must be positive");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let deserialized: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.metadata.version, deserialized.metadata.version);
        assert_eq!(config.pmc, deserialized.pmc);
        assert_eq!(config.illness, deserialized.illness);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml_str = r#"
            [physiology]
            ftp = 260
            max_hr = 188

            [illness.thresholds]
            hrv_drop_pct = 12.5
        "#;

        let config: AppConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.physiology.ftp, Some(260));
        assert_eq!(config.illness.thresholds.hrv_drop_pct, 12.5);
        assert_eq!(config.illness.thresholds.resting_hr_rise_pct, 3.0);
        assert_eq!(config.pmc.ctl_time_constant, 42);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.recovery.weights.hrv = -1.0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.illness.min_confidence = 1.5;
        let err = config.validate().unwrap_err();
        assert!(err.user_message().contains("illness.min_confidence"));

        let mut config = AppConfig::default();
        config.illness.high_excess_ratio = 2.0;
        let err = config.validate().unwrap_err();
        assert!(err.user_message().contains("illness.high_excess_ratio"));

        let mut config = AppConfig::default();
        config.pmc.ctl_time_constant = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_io() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original_config = AppConfig::default();
        original_config.physiology.resting_hr = Some(48);
        original_config.sleep.sleep_need_hours = 7.5;

        original_config.save_to_file(&config_path).unwrap();
        let loaded_config = AppConfig::load_from_file(&config_path).unwrap();

        assert_eq!(loaded_config.physiology.resting_hr, Some(48));
        assert_eq!(loaded_config.sleep.sleep_need_hours, 7.5);
    }

    #[test]
    fn test_load_missing_file_fails_with_context() {
        let temp_dir = tempdir().unwrap();
        let err = AppConfig::load_from_file(temp_dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
