use std::collections::BTreeSet;
use std::fmt;

use contracts::{EngineConfig, SCHEMA_VERSION_V1};

use crate::policy::{PolicyError, ThresholdPolicy};

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    Policy(PolicyError),
    UnsupportedSchemaVersion { got: String },
    EmptyDriveSet,
    DuplicateDrive { name: String },
    ThresholdNotPositive { drive: String, value: f64 },
    InvalidRate { drive: String, field: &'static str, value: f64 },
    NegativeCooldown { minutes: i64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Policy(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion { got } => write!(
                f,
                "unsupported config schema_version {got}, expected {SCHEMA_VERSION_V1}"
            ),
            Self::EmptyDriveSet => write!(f, "config defines no drives"),
            Self::DuplicateDrive { name } => write!(f, "drive {name} is defined more than once"),
            Self::ThresholdNotPositive { drive, value } => {
                write!(f, "drive {drive}: threshold must be positive, got {value}")
            }
            Self::InvalidRate { drive, field, value } => {
                write!(f, "drive {drive}: {field} must be a non-negative number, got {value}")
            }
            Self::NegativeCooldown { minutes } => {
                write!(f, "cooldown_minutes must be non-negative, got {minutes}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<PolicyError> for ConfigError {
    fn from(value: PolicyError) -> Self {
        Self::Policy(value)
    }
}

/// Fail-fast validation of a whole config. Returns the band policy so
/// callers classify with the same ratios they validated.
pub fn validate_config(config: &EngineConfig) -> Result<ThresholdPolicy, ConfigError> {
    if config.schema_version != SCHEMA_VERSION_V1 {
        return Err(ConfigError::UnsupportedSchemaVersion {
            got: config.schema_version.clone(),
        });
    }
    if config.cooldown_minutes < 0 {
        return Err(ConfigError::NegativeCooldown {
            minutes: config.cooldown_minutes,
        });
    }
    let policy = ThresholdPolicy::new(config.ratios)?;
    if config.drives.is_empty() {
        return Err(ConfigError::EmptyDriveSet);
    }

    let mut seen = BTreeSet::new();
    for spec in &config.drives {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateDrive {
                name: spec.name.clone(),
            });
        }
        if !spec.threshold.is_finite() || spec.threshold <= 0.0 {
            return Err(ConfigError::ThresholdNotPositive {
                drive: spec.name.clone(),
                value: spec.threshold,
            });
        }
        check_rate(&spec.name, "gain_rate", spec.gain_rate)?;
        check_rate(&spec.name, "decay_rate", spec.decay_rate)?;
        if let Some(boost) = &spec.gain_boost {
            check_rate(&spec.name, "gain_boost.boosted_rate", boost.boosted_rate)?;
        }
    }

    Ok(policy)
}

fn check_rate(drive: &str, field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < 0.0 {
        return Err(ConfigError::InvalidRate {
            drive: drive.to_string(),
            field,
            value,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{BandRatios, DriveSpec, GainBoost};

    fn spec(name: &str) -> DriveSpec {
        DriveSpec {
            name: name.to_string(),
            description: String::new(),
            threshold: 20.0,
            gain_rate: 1.0,
            decay_rate: 0.5,
            gain_boost: None,
        }
    }

    #[test]
    fn default_config_validates() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn duplicate_drive_names_are_rejected() {
        let config = EngineConfig {
            drives: vec![spec("focus"), spec("focus")],
            ..EngineConfig::default()
        };
        assert_eq!(
            validate_config(&config).unwrap_err(),
            ConfigError::DuplicateDrive {
                name: "focus".to_string()
            }
        );
    }

    #[test]
    fn non_positive_threshold_is_rejected() {
        let mut bad = spec("focus");
        bad.threshold = 0.0;
        let config = EngineConfig {
            drives: vec![bad],
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::ThresholdNotPositive { .. }
        ));
    }

    #[test]
    fn negative_rates_are_rejected() {
        let mut bad = spec("focus");
        bad.decay_rate = -0.1;
        let config = EngineConfig {
            drives: vec![bad],
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::InvalidRate { field: "decay_rate", .. }
        ));
    }

    #[test]
    fn invalid_boost_rate_is_rejected() {
        let mut bad = spec("focus");
        bad.gain_boost = Some(GainBoost {
            signal: "backlog".to_string(),
            boosted_rate: f64::INFINITY,
        });
        let config = EngineConfig {
            drives: vec![bad],
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::InvalidRate { .. }
        ));
    }

    #[test]
    fn unsupported_schema_version_is_rejected() {
        let config = EngineConfig {
            schema_version: "2.0".to_string(),
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::UnsupportedSchemaVersion { .. }
        ));
    }

    #[test]
    fn empty_drive_set_is_rejected() {
        let config = EngineConfig {
            drives: Vec::new(),
            ..EngineConfig::default()
        };
        assert_eq!(validate_config(&config).unwrap_err(), ConfigError::EmptyDriveSet);
    }

    #[test]
    fn negative_cooldown_is_rejected() {
        let config = EngineConfig {
            cooldown_minutes: -5,
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::NegativeCooldown { minutes: -5 }
        ));
    }

    #[test]
    fn bad_ratios_surface_as_policy_error() {
        let config = EngineConfig {
            ratios: BandRatios {
                triggered: 0.5,
                ..BandRatios::default()
            },
            ..EngineConfig::default()
        };
        assert!(matches!(
            validate_config(&config).unwrap_err(),
            ConfigError::Policy(PolicyError::RatiosNotIncreasing { .. })
        ));
    }
}
