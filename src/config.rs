//! Run Configuration
//!
//! `QualityConfig` is the single immutable parameter set for a benchmark run.
//! It is loaded once (from a TOML file, or built from defaults), validated
//! eagerly before any data is touched, and passed by reference into the
//! injector and the metric calculator. There is no global configuration
//! state anywhere in the crate.
//!
//! # File format
//!
//! Keys are upper-case to match the configuration files shipped alongside
//! the DSMS queries:
//!
//! ```toml
//! DEVIATION = 0.05
//! OUTLIER_FACTOR = 2.0
//! OUTLIER_PERCENTAGE = 0.05
//! MISSING_PERCENTAGE = 0.1
//! VOLATILITY = 4000
//! OUTDATED_PERCENTAGE = 0.2
//! WINDOW_SIZE = 50000
//! CHUNK_SIZE = 30000
//! ```
//!
//! Missing keys take the defaults below; unknown keys are rejected so a
//! typo cannot silently fall back to a default.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::info;

/// Immutable parameter set for defect injection and metric computation.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct QualityConfig {
    /// Standard deviation of the Gaussian noise used for outlier magnitudes.
    #[serde(rename = "DEVIATION", default = "default_deviation")]
    pub deviation: f64,

    /// Multiplier applied to the Gaussian draw to produce the outlier offset.
    #[serde(rename = "OUTLIER_FACTOR", default = "default_outlier_factor")]
    pub outlier_factor: f64,

    /// Fraction of non-null values per chunk perturbed into outliers.
    #[serde(rename = "OUTLIER_PERCENTAGE", default = "default_outlier_percentage")]
    pub outlier_percentage: f64,

    /// Fraction of rows per chunk whose value is nulled.
    #[serde(rename = "MISSING_PERCENTAGE", default = "default_missing_percentage")]
    pub missing_percentage: f64,

    /// Timeliness decay horizon in milliseconds. A reading whose
    /// availability gap reaches this value scores exactly zero.
    #[serde(rename = "VOLATILITY", default = "default_volatility")]
    pub volatility: i64,

    /// Fraction of rows per chunk delayed past the volatility horizon.
    #[serde(rename = "OUTDATED_PERCENTAGE", default = "default_outdated_percentage")]
    pub outdated_percentage: f64,

    /// Rows per tumbling window.
    #[serde(rename = "WINDOW_SIZE", default = "default_window_size")]
    pub window_size: usize,

    /// Rows per processing chunk. Chunking bounds memory only; it is
    /// invisible to windowing.
    #[serde(rename = "CHUNK_SIZE", default = "default_chunk_size")]
    pub chunk_size: usize,
}

fn default_deviation() -> f64 {
    0.05
}
fn default_outlier_factor() -> f64 {
    2.0
}
fn default_outlier_percentage() -> f64 {
    0.05
}
fn default_missing_percentage() -> f64 {
    0.1
}
fn default_volatility() -> i64 {
    4000
}
fn default_outdated_percentage() -> f64 {
    0.2
}
fn default_window_size() -> usize {
    50_000
}
fn default_chunk_size() -> usize {
    30_000
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            deviation: default_deviation(),
            outlier_factor: default_outlier_factor(),
            outlier_percentage: default_outlier_percentage(),
            missing_percentage: default_missing_percentage(),
            volatility: default_volatility(),
            outdated_percentage: default_outdated_percentage(),
            window_size: default_window_size(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl QualityConfig {
    /// Load a configuration file, or fall back to defaults when `path` is
    /// `None`. Validation runs in both cases; a config error here is fatal
    /// to the run before any processing begins.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                info!(path = %path.display(), "loading configuration");
                let raw = fs::read_to_string(path)
                    .with_context(|| format!("failed to read config file {}", path.display()))?;
                toml::from_str::<QualityConfig>(&raw)
                    .with_context(|| format!("failed to parse config file {}", path.display()))?
            }
            None => {
                info!("no config file provided, using default parameters");
                QualityConfig::default()
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter range. Percentages must lie in `[0, 1]`;
    /// `volatility`, `window_size` and `chunk_size` must be positive;
    /// `deviation` and `outlier_factor` must be non-negative.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("OUTLIER_PERCENTAGE", self.outlier_percentage),
            ("MISSING_PERCENTAGE", self.missing_percentage),
            ("OUTDATED_PERCENTAGE", self.outdated_percentage),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Range { field, value });
            }
        }
        if self.deviation < 0.0 {
            return Err(ConfigError::Negative { field: "DEVIATION", value: self.deviation });
        }
        if self.outlier_factor < 0.0 {
            return Err(ConfigError::Negative {
                field: "OUTLIER_FACTOR",
                value: self.outlier_factor,
            });
        }
        if self.volatility <= 0 {
            return Err(ConfigError::NonPositive {
                field: "VOLATILITY",
                value: self.volatility,
            });
        }
        if self.window_size == 0 {
            return Err(ConfigError::NonPositive { field: "WINDOW_SIZE", value: 0 });
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::NonPositive { field: "CHUNK_SIZE", value: 0 });
        }
        Ok(())
    }
}

/// Fatal configuration error, reported before any processing begins.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A percentage parameter outside `[0, 1]`.
    Range { field: &'static str, value: f64 },
    /// A scale parameter below zero.
    Negative { field: &'static str, value: f64 },
    /// A size or horizon parameter that must be strictly positive.
    NonPositive { field: &'static str, value: i64 },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Range { field, value } => {
                write!(f, "{} must be within [0, 1], got {}", field, value)
            }
            Self::Negative { field, value } => {
                write!(f, "{} must be non-negative, got {}", field, value)
            }
            Self::NonPositive { field, value } => {
                write!(f, "{} must be positive, got {}", field, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = QualityConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.window_size, 50_000);
        assert_eq!(config.chunk_size, 30_000);
        assert_eq!(config.volatility, 4000);
    }

    #[test]
    fn test_parse_full_file() {
        let raw = r#"
            DEVIATION = 0.1
            OUTLIER_FACTOR = 3.0
            OUTLIER_PERCENTAGE = 0.02
            MISSING_PERCENTAGE = 0.05
            VOLATILITY = 2000
            OUTDATED_PERCENTAGE = 0.1
            WINDOW_SIZE = 10000
            CHUNK_SIZE = 5000
        "#;
        let config: QualityConfig = toml::from_str(raw).unwrap();
        assert_eq!(config.deviation, 0.1);
        assert_eq!(config.volatility, 2000);
        assert_eq!(config.window_size, 10_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_missing_keys_take_defaults() {
        let config: QualityConfig = toml::from_str("VOLATILITY = 1234").unwrap();
        assert_eq!(config.volatility, 1234);
        assert_eq!(config.missing_percentage, 0.1);
        assert_eq!(config.chunk_size, 30_000);
    }

    #[test]
    fn test_unknown_key_rejected() {
        let result: Result<QualityConfig, _> = toml::from_str("VOLATILTY = 2000");
        assert!(result.is_err());
    }

    #[test]
    fn test_percentage_out_of_range() {
        let mut config = QualityConfig::default();
        config.missing_percentage = 1.5;
        match config.validate() {
            Err(ConfigError::Range { field, .. }) => assert_eq!(field, "MISSING_PERCENTAGE"),
            other => panic!("expected range error, got {:?}", other),
        }

        config = QualityConfig::default();
        config.outlier_percentage = -0.1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_non_positive_rejected() {
        let mut config = QualityConfig::default();
        config.volatility = 0;
        match config.validate() {
            Err(ConfigError::NonPositive { field, .. }) => assert_eq!(field, "VOLATILITY"),
            other => panic!("expected non-positive error, got {:?}", other),
        }

        config = QualityConfig::default();
        config.window_size = 0;
        assert!(config.validate().is_err());

        config = QualityConfig::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }
}
