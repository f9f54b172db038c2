//! Configuration types for preprocessing and model selection.
//!
//! This module provides [`TrainingConfig`] and its builder, the
//! hyperparameter [`ParamGrid`], and the declared column lists of
//! [`PreprocessorConfig`].
//!
//! # Example
//!
//! ```
//! use churn_learning::{ParamGrid, TrainingConfig};
//!
//! let config = TrainingConfig::builder()
//!     .cv_folds(3)
//!     .param_grid(ParamGrid::quick())
//!     .n_jobs(2)
//!     .build()
//!     .expect("valid config");
//! assert_eq!(config.param_grid.len(), 1);
//! ```

use crate::classifier::BoostingParams;
use crate::error::{LearningError, Result};
use churn_processing::schema::{
    AVG_CHARGES_PER_MONTH, CONTRACT, DEPENDENTS, FAMILY_SIZE, GENDER, INTERNET_SERVICE,
    MONTHLY_CHARGES, PARTNER, PAYMENT_METHOD, SENIOR_CITIZEN, TENURE, TENURE_GROUP,
    TOTAL_CHARGES,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Metric maximized by the hyperparameter search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ScoringMetric {
    /// Fraction of correctly classified rows.
    #[default]
    Accuracy,
}

impl ScoringMetric {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ScoringMetric::Accuracy => "accuracy",
        }
    }
}

/// Finite grid of classifier hyperparameters.
///
/// Combinations are enumerated with `n_estimators` outermost, then
/// `learning_rate`, then `max_depth`, and `subsample` innermost, each list in
/// its given order. This order decides ties in the search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub n_estimators: Vec<usize>,
    pub learning_rate: Vec<f64>,
    pub max_depth: Vec<usize>,
    pub subsample: Vec<f64>,
}

impl Default for ParamGrid {
    /// The 16-combination grid used for the production model.
    fn default() -> Self {
        Self {
            n_estimators: vec![100, 200],
            learning_rate: vec![0.01, 0.1],
            max_depth: vec![3, 5],
            subsample: vec![0.8, 1.0],
        }
    }
}

impl ParamGrid {
    /// A single-combination grid for smoke runs.
    pub fn quick() -> Self {
        Self {
            n_estimators: vec![100],
            learning_rate: vec![0.1],
            max_depth: vec![3],
            subsample: vec![1.0],
        }
    }

    /// Number of combinations.
    pub fn len(&self) -> usize {
        self.n_estimators.len() * self.learning_rate.len() * self.max_depth.len() * self.subsample.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Expand the grid in enumeration order. Fields the grid does not vary
    /// are taken from `base`.
    pub fn combinations(&self, base: &BoostingParams) -> Vec<BoostingParams> {
        let mut out = Vec::with_capacity(self.len());
        for &n_estimators in &self.n_estimators {
            for &learning_rate in &self.learning_rate {
                for &max_depth in &self.max_depth {
                    for &subsample in &self.subsample {
                        out.push(BoostingParams {
                            n_estimators,
                            learning_rate,
                            max_depth,
                            subsample,
                            ..base.clone()
                        });
                    }
                }
            }
        }
        out
    }

    fn validate(&self, base: &BoostingParams) -> Result<()> {
        if self.is_empty() {
            return Err(LearningError::InvalidConfig(
                "param_grid must contain at least one value per parameter".to_string(),
            ));
        }
        for params in self.combinations(base) {
            params.validate()?;
        }
        Ok(())
    }
}

/// Declared column lists of the column preprocessor.
///
/// The lists are fixed configuration, never inferred from data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreprocessorConfig {
    /// Columns standardized to zero mean and unit variance.
    pub numeric_features: Vec<String>,
    /// Columns one-hot encoded against the categories seen at fit time.
    pub categorical_features: Vec<String>,
}

impl Default for PreprocessorConfig {
    /// Base columns plus the engineered `FamilySize`, `AvgChargesPerMonth`
    /// (numeric) and `TenureGroup` (categorical).
    fn default() -> Self {
        let mut config = Self::base();
        config.numeric_features.push(FAMILY_SIZE.to_string());
        config.numeric_features.push(AVG_CHARGES_PER_MONTH.to_string());
        config.categorical_features.push(TENURE_GROUP.to_string());
        config
    }
}

impl PreprocessorConfig {
    /// Raw attributes only, without engineered columns.
    pub fn base() -> Self {
        Self {
            numeric_features: [TENURE, MONTHLY_CHARGES, TOTAL_CHARGES]
                .map(String::from)
                .to_vec(),
            categorical_features: [
                SENIOR_CITIZEN,
                GENDER,
                PARTNER,
                DEPENDENTS,
                INTERNET_SERVICE,
                CONTRACT,
                PAYMENT_METHOD,
            ]
            .map(String::from)
            .to_vec(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.numeric_features.is_empty() && self.categorical_features.is_empty() {
            return Err(LearningError::InvalidConfig(
                "preprocessor must declare at least one column".to_string(),
            ));
        }
        let mut seen = std::collections::HashSet::new();
        for name in self.numeric_features.iter().chain(&self.categorical_features) {
            if !seen.insert(name.as_str()) {
                return Err(LearningError::InvalidConfig(format!(
                    "column '{name}' is declared more than once"
                )));
            }
        }
        Ok(())
    }
}

/// Configuration for a training run.
///
/// Use [`TrainingConfig::builder()`] to construct a validated configuration.
///
/// # Validation
///
/// The builder validates on [`build()`](TrainingConfigBuilder::build):
/// - `cv_folds` must be at least 2
/// - `n_jobs` must be `-1` or at least 1
/// - every grid combination must be a valid [`BoostingParams`]
/// - the declared preprocessor columns must be non-empty and distinct
/// - a timeout, if set, must be non-zero
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Number of stratified cross-validation folds (default: 3).
    pub cv_folds: usize,

    /// Metric maximized by the search (default: accuracy).
    pub scoring: ScoringMetric,

    /// Seed for fold shuffling and tree subsampling (default: 42).
    pub random_seed: u64,

    /// Number of parallel jobs (default: -1 for all cores).
    ///
    /// - `-1`: Use all available CPU cores
    /// - `1`: Single-threaded
    /// - `n > 1`: Use exactly `n` threads
    pub n_jobs: i32,

    /// Hyperparameter grid.
    pub param_grid: ParamGrid,

    /// Classifier settings the grid does not vary.
    pub base_params: BoostingParams,

    /// Declared preprocessing columns.
    pub preprocessor: PreprocessorConfig,

    /// Wall-clock budget for the whole search (default: none).
    pub timeout: Option<Duration>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            cv_folds: 3,
            scoring: ScoringMetric::default(),
            random_seed: 42,
            n_jobs: -1,
            param_grid: ParamGrid::default(),
            base_params: BoostingParams::default(),
            preprocessor: PreprocessorConfig::default(),
            timeout: None,
        }
    }
}

impl TrainingConfig {
    /// Create a new builder for `TrainingConfig`.
    #[must_use]
    pub fn builder() -> TrainingConfigBuilder {
        TrainingConfigBuilder::default()
    }

    /// Grid combinations with the run seed applied.
    pub fn candidates(&self) -> Vec<BoostingParams> {
        let base = BoostingParams {
            random_seed: self.random_seed,
            ..self.base_params.clone()
        };
        self.param_grid.combinations(&base)
    }

    /// Validate all settings.
    pub fn validate(&self) -> Result<()> {
        if self.cv_folds < 2 {
            return Err(LearningError::InvalidConfig(
                "cv_folds must be at least 2".to_string(),
            ));
        }
        if self.n_jobs == 0 || self.n_jobs < -1 {
            return Err(LearningError::InvalidConfig(
                "n_jobs must be -1 (all cores) or at least 1".to_string(),
            ));
        }
        if self.timeout.is_some_and(|t| t.is_zero()) {
            return Err(LearningError::InvalidConfig(
                "timeout must be greater than zero".to_string(),
            ));
        }
        self.param_grid.validate(&self.base_params)?;
        self.preprocessor.validate()
    }
}

/// Builder for [`TrainingConfig`].
///
/// Created via [`TrainingConfig::builder()`]. All setters return `self` to
/// allow method chaining.
#[derive(Debug, Clone, Default)]
pub struct TrainingConfigBuilder {
    config: TrainingConfig,
}

impl TrainingConfigBuilder {
    /// Set the number of cross-validation folds (default: 3).
    #[must_use]
    pub fn cv_folds(mut self, folds: usize) -> Self {
        self.config.cv_folds = folds;
        self
    }

    #[must_use]
    pub fn scoring(mut self, scoring: ScoringMetric) -> Self {
        self.config.scoring = scoring;
        self
    }

    /// Set the random seed for reproducibility (default: 42).
    #[must_use]
    pub fn random_seed(mut self, seed: u64) -> Self {
        self.config.random_seed = seed;
        self
    }

    /// Set the number of parallel jobs (default: -1 for all cores).
    #[must_use]
    pub fn n_jobs(mut self, jobs: i32) -> Self {
        self.config.n_jobs = jobs;
        self
    }

    #[must_use]
    pub fn param_grid(mut self, grid: ParamGrid) -> Self {
        self.config.param_grid = grid;
        self
    }

    /// Set `reg_lambda`, `min_child_weight` and the other fixed classifier
    /// settings. Grid-varied fields are overwritten per combination.
    #[must_use]
    pub fn base_params(mut self, params: BoostingParams) -> Self {
        self.config.base_params = params;
        self
    }

    #[must_use]
    pub fn preprocessor(mut self, preprocessor: PreprocessorConfig) -> Self {
        self.config.preprocessor = preprocessor;
        self
    }

    /// Bound the total search time.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Build the configuration, validating all settings.
    ///
    /// # Errors
    ///
    /// Returns [`LearningError::InvalidConfig`] naming the offending setting.
    pub fn build(self) -> Result<TrainingConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = TrainingConfig::default();
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.random_seed, 42);
        assert_eq!(config.n_jobs, -1);
        assert_eq!(config.scoring, ScoringMetric::Accuracy);
        assert_eq!(config.param_grid.len(), 16);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_grid_enumeration_order() {
        let combos = ParamGrid::default().combinations(&BoostingParams::default());
        assert_eq!(combos.len(), 16);

        let first = &combos[0];
        assert_eq!(
            (first.n_estimators, first.learning_rate, first.max_depth, first.subsample),
            (100, 0.01, 3, 0.8)
        );
        // Subsample varies fastest
        assert_eq!(combos[1].subsample, 1.0);
        assert_eq!(combos[1].max_depth, 3);
        // n_estimators varies slowest
        assert_eq!(combos[8].n_estimators, 200);
        assert_eq!(combos[7].n_estimators, 100);

        let last = &combos[15];
        assert_eq!(
            (last.n_estimators, last.learning_rate, last.max_depth, last.subsample),
            (200, 0.1, 5, 1.0)
        );
    }

    #[test]
    fn test_candidates_use_run_seed() {
        let config = TrainingConfig::builder()
            .random_seed(7)
            .param_grid(ParamGrid::quick())
            .build()
            .unwrap();
        let candidates = config.candidates();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].random_seed, 7);
    }

    #[test]
    fn test_preprocessor_lists() {
        let base = PreprocessorConfig::base();
        assert_eq!(base.numeric_features, vec!["tenure", "MonthlyCharges", "TotalCharges"]);
        assert_eq!(base.categorical_features.len(), 7);

        let full = PreprocessorConfig::default();
        assert!(full.numeric_features.contains(&"FamilySize".to_string()));
        assert!(full.numeric_features.contains(&"AvgChargesPerMonth".to_string()));
        assert!(full.categorical_features.contains(&"TenureGroup".to_string()));
    }

    #[test]
    fn test_invalid_cv_folds() {
        let result = TrainingConfig::builder().cv_folds(1).build();
        assert!(result.unwrap_err().to_string().contains("cv_folds"));
    }

    #[test]
    fn test_invalid_n_jobs() {
        assert!(TrainingConfig::builder().n_jobs(0).build().is_err());
        assert!(TrainingConfig::builder().n_jobs(-2).build().is_err());
        assert!(TrainingConfig::builder().n_jobs(4).build().is_ok());
    }

    #[test]
    fn test_invalid_grid() {
        let grid = ParamGrid {
            subsample: vec![],
            ..ParamGrid::default()
        };
        assert!(TrainingConfig::builder().param_grid(grid).build().is_err());

        let grid = ParamGrid {
            learning_rate: vec![0.1, -0.5],
            ..ParamGrid::default()
        };
        assert!(TrainingConfig::builder().param_grid(grid).build().is_err());
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut preprocessor = PreprocessorConfig::base();
        preprocessor.categorical_features.push("tenure".to_string());
        let result = TrainingConfig::builder().preprocessor(preprocessor).build();
        assert!(result.unwrap_err().to_string().contains("tenure"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let result = TrainingConfig::builder().timeout(Duration::ZERO).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_config_serde_roundtrip() {
        let config = TrainingConfig::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap();
        let json = serde_json::to_string(&config).unwrap();
        let back: TrainingConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
