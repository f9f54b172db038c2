//! Gradient boosted tree classifier.
//!
//! - [`BoostingParams`]: the hyperparameters a grid search varies
//! - [`GradientBoostingClassifier`]: the fitted model
//! - [`TreeNode`]: a single fitted tree

mod boosting;
mod tree;

pub use boosting::GradientBoostingClassifier;
pub use tree::TreeNode;

use crate::error::{LearningError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Hyperparameters of the boosted classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingParams {
    /// Number of boosting rounds (trees).
    pub n_estimators: usize,
    /// Shrinkage applied to every tree's output.
    pub learning_rate: f64,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Fraction of rows drawn (without replacement) for each tree.
    pub subsample: f64,
    /// L2 penalty on leaf weights.
    pub reg_lambda: f64,
    /// Minimum hessian sum allowed in a child.
    pub min_child_weight: f64,
    /// Seed for row subsampling.
    pub random_seed: u64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            learning_rate: 0.1,
            max_depth: 3,
            subsample: 1.0,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
            random_seed: 42,
        }
    }
}

impl BoostingParams {
    /// Check parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(invalid("n_estimators must be at least 1"));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(invalid("learning_rate must be a positive number"));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(invalid("subsample must be in (0.0, 1.0]"));
        }
        if !(self.reg_lambda >= 0.0 && self.reg_lambda.is_finite()) {
            return Err(invalid("reg_lambda must be non-negative"));
        }
        if !(self.min_child_weight >= 0.0 && self.min_child_weight.is_finite()) {
            return Err(invalid("min_child_weight must be non-negative"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> LearningError {
    LearningError::InvalidConfig(message.to_string())
}

impl fmt::Display for BoostingParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n_estimators={}, learning_rate={}, max_depth={}, subsample={}",
            self.n_estimators, self.learning_rate, self.max_depth, self.subsample
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_params_are_valid() {
        assert!(BoostingParams::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_params() {
        let cases = [
            BoostingParams {
                n_estimators: 0,
                ..Default::default()
            },
            BoostingParams {
                learning_rate: 0.0,
                ..Default::default()
            },
            BoostingParams {
                subsample: 1.5,
                ..Default::default()
            },
            BoostingParams {
                subsample: 0.0,
                ..Default::default()
            },
            BoostingParams {
                reg_lambda: -1.0,
                ..Default::default()
            },
        ];
        for params in cases {
            let err = params.validate().unwrap_err();
            assert_eq!(err.error_code(), "INVALID_CONFIG");
        }
    }

    #[test]
    fn test_display() {
        let params = BoostingParams {
            n_estimators: 200,
            learning_rate: 0.01,
            max_depth: 5,
            subsample: 0.8,
            ..Default::default()
        };
        assert_eq!(
            params.to_string(),
            "n_estimators=200, learning_rate=0.01, max_depth=5, subsample=0.8"
        );
    }
}
