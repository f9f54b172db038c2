//! Pipeline stage interface.
//!
//! A stage has two capabilities: [`Transform::fit`] learns state from a
//! batch, and [`Apply::apply`] uses that state to turn one batch into the
//! next. The pipeline holds its stages as an ordered list of [`Stage`]
//! values and their fitted counterparts as [`FittedStage`] values, so the
//! whole chain serializes as plain data.

use crate::error::{LearningError, Result};
use crate::preprocess::{ColumnPreprocessor, PreprocessorState};
use churn_processing::FeatureEngineer;
use ndarray::Array2;
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};

/// Data flowing between stages.
#[derive(Debug, Clone)]
pub enum Batch {
    /// Named columns, before encoding.
    Frame(DataFrame),
    /// Dense encoded features.
    Matrix(Array2<f64>),
}

impl Batch {
    pub fn n_rows(&self) -> usize {
        match self {
            Batch::Frame(df) => df.height(),
            Batch::Matrix(m) => m.nrows(),
        }
    }

    pub fn as_frame(&self, stage: &str) -> Result<&DataFrame> {
        match self {
            Batch::Frame(df) => Ok(df),
            Batch::Matrix(_) => Err(wrong_kind(stage, "a table")),
        }
    }

    pub fn into_matrix(self, stage: &str) -> Result<Array2<f64>> {
        match self {
            Batch::Matrix(m) => Ok(m),
            Batch::Frame(_) => Err(wrong_kind(stage, "an encoded matrix")),
        }
    }
}

fn wrong_kind(stage: &str, expected: &str) -> LearningError {
    LearningError::InvalidData(format!("stage '{stage}' expects {expected} as input"))
}

/// Learns a fitted stage from a batch.
pub trait Transform {
    type Fitted: Apply;

    fn fit(&self, batch: &Batch) -> Result<Self::Fitted>;
}

/// Applies fitted state to a batch. Must not mutate the state.
pub trait Apply {
    fn apply(&self, batch: Batch) -> Result<Batch>;
}

impl Transform for FeatureEngineer {
    type Fitted = FeatureEngineer;

    /// Stateless: fitting returns the engineer unchanged.
    fn fit(&self, _batch: &Batch) -> Result<FeatureEngineer> {
        Ok(*self)
    }
}

impl Apply for FeatureEngineer {
    fn apply(&self, batch: Batch) -> Result<Batch> {
        let df = batch.as_frame("features")?;
        Ok(Batch::Frame(self.transform(df)?))
    }
}

impl Transform for ColumnPreprocessor {
    type Fitted = PreprocessorState;

    fn fit(&self, batch: &Batch) -> Result<PreprocessorState> {
        ColumnPreprocessor::fit(self, batch.as_frame("preprocess")?)
    }
}

impl Apply for PreprocessorState {
    fn apply(&self, batch: Batch) -> Result<Batch> {
        let df = batch.as_frame("preprocess")?;
        Ok(Batch::Matrix(self.transform(df)?))
    }
}

/// An unfitted stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "state", rename_all = "snake_case")]
pub enum Stage {
    Features(FeatureEngineer),
    Preprocess(ColumnPreprocessor),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Features(_) => "features",
            Stage::Preprocess(_) => "preprocess",
        }
    }
}

impl Transform for Stage {
    type Fitted = FittedStage;

    fn fit(&self, batch: &Batch) -> Result<FittedStage> {
        Ok(match self {
            Stage::Features(engineer) => FittedStage::Features(Transform::fit(engineer, batch)?),
            Stage::Preprocess(preprocessor) => {
                FittedStage::Preprocess(Transform::fit(preprocessor, batch)?)
            }
        })
    }
}

/// A fitted stage in a pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", content = "state", rename_all = "snake_case")]
pub enum FittedStage {
    Features(FeatureEngineer),
    Preprocess(PreprocessorState),
}

impl FittedStage {
    pub fn name(&self) -> &'static str {
        match self {
            FittedStage::Features(_) => "features",
            FittedStage::Preprocess(_) => "preprocess",
        }
    }

    /// The unfitted stage this was produced from.
    pub fn unfitted(&self) -> Stage {
        match self {
            FittedStage::Features(engineer) => Stage::Features(*engineer),
            FittedStage::Preprocess(state) => {
                Stage::Preprocess(ColumnPreprocessor::new(state.declared_config()))
            }
        }
    }
}

impl Apply for FittedStage {
    fn apply(&self, batch: Batch) -> Result<Batch> {
        match self {
            FittedStage::Features(engineer) => engineer.apply(batch),
            FittedStage::Preprocess(state) => state.apply(batch),
        }
    }
}
