//! Column-wise preprocessing: standard scaling and one-hot encoding.
//!
//! [`ColumnPreprocessor::fit`] learns per-column statistics from a training
//! batch and returns a [`PreprocessorState`]. The state turns any later batch
//! with the declared columns into a dense matrix laid out as
//!
//! ```text
//! [numeric_0 .. numeric_k | col_a=cat_0 .. col_a=cat_m | col_b=cat_0 ..]
//! ```
//!
//! Categories unseen at fit time encode to all zeros for their column.

use crate::config::PreprocessorConfig;
use crate::error::{LearningError, Result};
use churn_processing::ProcessingError;
use churn_processing::utils::{numeric_column, string_column};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Learned centering and scale of one numeric column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NumericScaler {
    pub column: String,
    pub mean: f64,
    /// Population standard deviation, or 1 for a constant column.
    pub scale: f64,
}

impl NumericScaler {
    fn fit(column: &str, values: &[f64]) -> Self {
        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
        let std = variance.sqrt();
        Self {
            column: column.to_string(),
            mean,
            scale: if std > 0.0 { std } else { 1.0 },
        }
    }

    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        (value - self.mean) / self.scale
    }
}

/// Categories observed for one categorical column, sorted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEncoder {
    pub column: String,
    pub categories: Vec<String>,
}

impl CategoryEncoder {
    /// Position of `value` in the indicator block, `None` when unseen.
    pub fn index_of(&self, value: &str) -> Option<usize> {
        self.categories
            .binary_search_by(|c| c.as_str().cmp(value))
            .ok()
    }
}

/// Unfitted preprocessor holding the declared column lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPreprocessor {
    config: PreprocessorConfig,
}

impl ColumnPreprocessor {
    pub fn new(config: PreprocessorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Learn scaling statistics and category sets from `df`.
    ///
    /// # Errors
    ///
    /// Fails if a declared column is missing, holds nulls, or (for numeric
    /// columns) holds non-finite values, or if `df` has no rows.
    pub fn fit(&self, df: &DataFrame) -> Result<PreprocessorState> {
        if df.height() == 0 {
            return Err(LearningError::InvalidData(
                "cannot fit preprocessor on an empty batch".to_string(),
            ));
        }

        let scalers = self
            .config
            .numeric_features
            .iter()
            .map(|name| {
                let values = dense_numeric(df, name)?;
                Ok(NumericScaler::fit(name, &values))
            })
            .collect::<Result<Vec<_>>>()?;

        let encoders = self
            .config
            .categorical_features
            .iter()
            .map(|name| {
                let values = dense_strings(df, name)?;
                let categories: BTreeSet<String> = values.into_iter().collect();
                Ok(CategoryEncoder {
                    column: name.clone(),
                    categories: categories.into_iter().collect(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let state = PreprocessorState { scalers, encoders };
        debug!(
            "Fitted preprocessor: {} numeric, {} categorical -> {} features",
            state.scalers.len(),
            state.encoders.len(),
            state.n_features()
        );
        Ok(state)
    }
}

/// Fitted preprocessing state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessorState {
    scalers: Vec<NumericScaler>,
    encoders: Vec<CategoryEncoder>,
}

impl PreprocessorState {
    /// Width of the transformed matrix.
    pub fn n_features(&self) -> usize {
        self.scalers.len() + self.encoders.iter().map(|e| e.categories.len()).sum::<usize>()
    }

    pub fn scalers(&self) -> &[NumericScaler] {
        &self.scalers
    }

    pub fn encoders(&self) -> &[CategoryEncoder] {
        &self.encoders
    }

    /// The column lists this state was fitted on.
    pub fn declared_config(&self) -> PreprocessorConfig {
        PreprocessorConfig {
            numeric_features: self.scalers.iter().map(|s| s.column.clone()).collect(),
            categorical_features: self.encoders.iter().map(|e| e.column.clone()).collect(),
        }
    }

    /// Output column names, e.g. `tenure` and `Contract_Two year`.
    pub fn feature_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scalers.iter().map(|s| s.column.clone()).collect();
        for encoder in &self.encoders {
            for category in &encoder.categories {
                names.push(format!("{}_{}", encoder.column, category));
            }
        }
        names
    }

    /// Apply the fitted transform.
    ///
    /// Unknown categories never fail; missing columns and null or non-finite
    /// values reject the batch.
    pub fn transform(&self, df: &DataFrame) -> Result<Array2<f64>> {
        let n = df.height();
        let mut out = Array2::<f64>::zeros((n, self.n_features()));

        for (j, scaler) in self.scalers.iter().enumerate() {
            let values = dense_numeric(df, &scaler.column)?;
            for (i, value) in values.into_iter().enumerate() {
                out[[i, j]] = scaler.apply(value);
            }
        }

        let mut offset = self.scalers.len();
        for encoder in &self.encoders {
            let values = dense_strings(df, &encoder.column)?;
            for (i, value) in values.iter().enumerate() {
                if let Some(k) = encoder.index_of(value) {
                    out[[i, offset + k]] = 1.0;
                }
            }
            offset += encoder.categories.len();
        }

        Ok(out)
    }
}

/// Numeric column as a dense vector; nulls and non-finite values are errors.
fn dense_numeric(df: &DataFrame, name: &str) -> Result<Vec<f64>> {
    let column = numeric_column(df, name)?;
    let values: Result<Vec<f64>> = column
        .into_iter()
        .enumerate()
        .map(|(row, value)| match value {
            Some(v) if v.is_finite() => Ok(v),
            Some(v) => Err(LearningError::InvalidData(format!(
                "column '{name}' has non-finite value {v} at row {row}"
            ))),
            None => Err(missing_value(name, row)),
        })
        .collect();
    values
}

/// Categorical column as owned strings; integer columns are rendered as text.
fn dense_strings(df: &DataFrame, name: &str) -> Result<Vec<String>> {
    let column = string_column(df, name)?;
    let values: Result<Vec<String>> = column
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.map(str::to_string).ok_or_else(|| missing_value(name, row)))
        .collect();
    values
}

fn missing_value(column: &str, row: usize) -> LearningError {
    ProcessingError::MissingValue {
        column: column.to_string(),
        row,
    }
    .into()
}
