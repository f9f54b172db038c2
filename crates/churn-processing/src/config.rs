//! Configuration for dataset preparation.
//!
//! [`DatasetConfig`] controls how a cleaned table is split into training and
//! test partitions. Use [`DatasetConfig::builder()`] for a validated value.

use crate::schema::CHURN;
use serde::{Deserialize, Serialize};

/// Configuration for splitting a cleaned churn table.
///
/// # Example
///
/// ```rust
/// use churn_processing::DatasetConfig;
///
/// let config = DatasetConfig::builder()
///     .test_size(0.25)
///     .random_seed(7)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_column, "Churn");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetConfig {
    /// Name of the binary label column.
    /// Default: "Churn"
    pub target_column: String,

    /// Fraction of rows held out as the test partition, in (0.0, 1.0).
    /// Default: 0.2
    pub test_size: f64,

    /// Seed for the row shuffle.
    /// Default: 42
    pub random_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            target_column: CHURN.to_string(),
            test_size: 0.2,
            random_seed: 42,
        }
    }
}

impl DatasetConfig {
    /// Create a new configuration builder.
    pub fn builder() -> DatasetConfigBuilder {
        DatasetConfigBuilder::default()
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if !(self.test_size > 0.0 && self.test_size < 1.0) {
            return Err(ConfigValidationError::InvalidTestSize(self.test_size));
        }
        if self.target_column.trim().is_empty() {
            return Err(ConfigValidationError::EmptyTargetColumn);
        }
        Ok(())
    }
}

/// Errors that can occur during configuration validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("Invalid test size: {0} (must be between 0.0 and 1.0, exclusive)")]
    InvalidTestSize(f64),

    #[error("Target column name must not be empty")]
    EmptyTargetColumn,
}

/// Builder for [`DatasetConfig`] with fluent API.
#[derive(Debug, Default)]
pub struct DatasetConfigBuilder {
    target_column: Option<String>,
    test_size: Option<f64>,
    random_seed: Option<u64>,
}

impl DatasetConfigBuilder {
    /// Set the label column name.
    pub fn target_column(mut self, column: impl Into<String>) -> Self {
        self.target_column = Some(column.into());
        self
    }

    /// Set the held-out fraction.
    ///
    /// # Arguments
    /// * `fraction` - Value strictly between 0.0 and 1.0 (e.g., 0.2 = 20%)
    pub fn test_size(mut self, fraction: f64) -> Self {
        self.test_size = Some(fraction);
        self
    }

    /// Set the shuffle seed.
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.random_seed = Some(seed);
        self
    }

    /// Build the configuration.
    ///
    /// Returns a validated `DatasetConfig` or an error if validation fails.
    pub fn build(self) -> Result<DatasetConfig, ConfigValidationError> {
        let defaults = DatasetConfig::default();
        let config = DatasetConfig {
            target_column: self.target_column.unwrap_or(defaults.target_column),
            test_size: self.test_size.unwrap_or(defaults.test_size),
            random_seed: self.random_seed.unwrap_or(defaults.random_seed),
        };

        config.validate()?;
        Ok(config)
    }
}
