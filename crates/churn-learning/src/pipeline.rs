//! Fit/predict pipeline: feature engineering, preprocessing, classifier.
//!
//! A [`Pipeline`] holds its stages as an ordered list and the classifier
//! parameters. [`Pipeline::fit`] runs every stage's fit then apply in order
//! and fits the classifier on the resulting matrix, producing a
//! [`FittedPipeline`]. The fitted pipeline is immutable: prediction takes
//! `&self` and can be shared across threads.
//!
//! # Example
//!
//! ```rust,ignore
//! use churn_learning::{BoostingParams, Pipeline, PreprocessorConfig};
//!
//! let mut pipeline = Pipeline::new(PreprocessorConfig::default(), BoostingParams::default());
//! pipeline.fit(&x_train, &y_train)?;
//! let proba = pipeline.predict_proba(&x_test)?;
//! ```

use crate::classifier::{BoostingParams, GradientBoostingClassifier};
use crate::config::PreprocessorConfig;
use crate::error::{LearningError, Result};
use crate::preprocess::ColumnPreprocessor;
use crate::stage::{Apply, Batch, FittedStage, Stage, Transform};
use churn_processing::{CustomerRecord, FeatureEngineer, records_to_frame};
use ndarray::{Array1, Array2};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// An ordered list of stages followed by a boosted-tree classifier.
#[derive(Debug, Clone)]
pub struct Pipeline {
    stages: Vec<Stage>,
    params: BoostingParams,
    fitted: Option<FittedPipeline>,
}

impl Pipeline {
    /// Feature engineering, then column preprocessing with `preprocessor`,
    /// then a classifier with `params`.
    pub fn new(preprocessor: PreprocessorConfig, params: BoostingParams) -> Self {
        Self::with_stages(
            vec![
                Stage::Features(FeatureEngineer::new()),
                Stage::Preprocess(ColumnPreprocessor::new(preprocessor)),
            ],
            params,
        )
    }

    /// Build from an explicit stage list. The last stage must produce a
    /// matrix for fitting to succeed.
    pub fn with_stages(stages: Vec<Stage>, params: BoostingParams) -> Self {
        Self {
            stages,
            params,
            fitted: None,
        }
    }

    /// Wrap an already fitted pipeline, e.g. one loaded from an artifact.
    pub fn from_fitted(fitted: FittedPipeline) -> Self {
        Self {
            stages: fitted.stages.iter().map(FittedStage::unfitted).collect(),
            params: fitted.classifier.params().clone(),
            fitted: Some(fitted),
        }
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fit every stage and the classifier on `x` and labels `y`.
    ///
    /// Replaces any previous fitted state.
    ///
    /// # Errors
    ///
    /// Fails if `x` and `y` differ in length, a stage rejects the batch, or
    /// the classifier cannot be fitted.
    pub fn fit(&mut self, x: &DataFrame, y: &[u8]) -> Result<&FittedPipeline> {
        if x.height() != y.len() {
            return Err(LearningError::InvalidData(format!(
                "table has {} rows but {} labels were given",
                x.height(),
                y.len()
            )));
        }

        let mut batch = Batch::Frame(x.clone());
        let mut fitted_stages = Vec::with_capacity(self.stages.len());
        for stage in &self.stages {
            let fitted = stage.fit(&batch)?;
            batch = fitted.apply(batch)?;
            fitted_stages.push(fitted);
        }

        let matrix = batch.into_matrix("classifier")?;
        let classifier = GradientBoostingClassifier::fit(&self.params, &matrix, y)?;
        let feature_names = output_names(&fitted_stages, matrix.ncols());

        debug!(
            "Fitted pipeline on {} rows: {} stages, {} features",
            x.height(),
            fitted_stages.len(),
            feature_names.len()
        );

        Ok(&*self.fitted.insert(FittedPipeline {
            stages: fitted_stages,
            classifier,
            feature_names,
        }))
    }

    /// The fitted state.
    ///
    /// # Errors
    ///
    /// [`LearningError::NotFitted`] before [`fit`](Self::fit).
    pub fn fitted(&self) -> Result<&FittedPipeline> {
        self.fitted.as_ref().ok_or(LearningError::NotFitted)
    }

    /// Consume the pipeline, keeping only its fitted state.
    pub fn into_fitted(self) -> Result<FittedPipeline> {
        self.fitted.ok_or(LearningError::NotFitted)
    }

    pub fn predict(&self, x: &DataFrame) -> Result<Vec<u8>> {
        self.fitted()?.predict(x)
    }

    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array1<f64>> {
        self.fitted()?.predict_proba(x)
    }
}

/// Names of the final matrix columns, taken from the last preprocessing
/// stage, or positional names when no stage names them.
fn output_names(stages: &[FittedStage], width: usize) -> Vec<String> {
    stages
        .iter()
        .rev()
        .find_map(|stage| match stage {
            FittedStage::Preprocess(state) => Some(state.feature_names()),
            FittedStage::Features(_) => None,
        })
        .unwrap_or_else(|| (0..width).map(|i| format!("f{i}")).collect())
}

/// All fitted state needed to reproduce predictions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPipeline {
    stages: Vec<FittedStage>,
    classifier: GradientBoostingClassifier,
    feature_names: Vec<String>,
}

static_assertions::assert_impl_all!(FittedPipeline: Send, Sync);
static_assertions::assert_impl_all!(Pipeline: Send, Sync);

impl FittedPipeline {
    pub fn stages(&self) -> &[FittedStage] {
        &self.stages
    }

    pub fn classifier(&self) -> &GradientBoostingClassifier {
        &self.classifier
    }

    pub fn params(&self) -> &BoostingParams {
        self.classifier.params()
    }

    /// Names of the encoded features fed to the classifier.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Run the fitted stages on `x`, producing the classifier input.
    pub fn transform(&self, x: &DataFrame) -> Result<Array2<f64>> {
        let mut batch = Batch::Frame(x.clone());
        for stage in &self.stages {
            batch = stage.apply(batch)?;
        }
        batch.into_matrix("classifier")
    }

    /// Churn probability per row.
    pub fn predict_proba(&self, x: &DataFrame) -> Result<Array1<f64>> {
        self.classifier.predict_proba(&self.transform(x)?)
    }

    /// 0/1 churn label per row.
    pub fn predict(&self, x: &DataFrame) -> Result<Vec<u8>> {
        self.classifier.predict(&self.transform(x)?)
    }

    /// Churn probability of a single validated record.
    pub fn predict_record_proba(&self, record: &CustomerRecord) -> Result<f64> {
        record.validate()?;
        let df = records_to_frame(std::slice::from_ref(record))?;
        let proba = self.predict_proba(&df)?;
        proba
            .first()
            .copied()
            .ok_or_else(|| LearningError::InvalidData("pipeline returned no prediction".to_string()))
    }

    /// `(feature, importance)` pairs in matrix column order.
    pub fn feature_importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .cloned()
            .zip(self.classifier.feature_importances().iter().copied())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{new_customer, population};
    use pretty_assertions::assert_eq;

    fn params() -> BoostingParams {
        BoostingParams {
            n_estimators: 20,
            ..BoostingParams::default()
        }
    }

    #[test]
    fn test_predict_before_fit_is_not_fitted() {
        let pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let (x, _) = population(6);

        assert!(!pipeline.is_fitted());
        assert_eq!(pipeline.predict(&x).unwrap_err().error_code(), "NOT_FITTED");
        assert_eq!(pipeline.predict_proba(&x).unwrap_err().error_code(), "NOT_FITTED");
    }

    #[test]
    fn test_fit_then_predict() {
        let (x, y) = population(90);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        pipeline.fit(&x, &y).unwrap();

        let predicted = pipeline.predict(&x).unwrap();
        let hits = predicted.iter().zip(&y).filter(|(a, b)| a == b).count();
        assert!(hits as f64 / y.len() as f64 > 0.9);

        let proba = pipeline.predict_proba(&x).unwrap();
        assert_eq!(proba.len(), 90);
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }

    #[test]
    fn test_prediction_does_not_mutate_state() {
        let (x, y) = population(60);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let before = pipeline.fit(&x, &y).unwrap().clone();

        let first = pipeline.predict_proba(&x).unwrap();
        let second = pipeline.predict_proba(&x).unwrap();
        assert_eq!(first, second);
        assert_eq!(pipeline.fitted().unwrap(), &before);
    }

    #[test]
    fn test_feature_names_follow_preprocessor() {
        let (x, y) = population(60);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let fitted = pipeline.fit(&x, &y).unwrap();

        let names = fitted.feature_names();
        assert_eq!(
            names[..5].to_vec(),
            vec!["tenure", "MonthlyCharges", "TotalCharges", "FamilySize", "AvgChargesPerMonth"]
        );
        assert!(names.contains(&"Contract_Month-to-month".to_string()));
        assert_eq!(fitted.feature_importances().len(), names.len());
    }

    #[test]
    fn test_label_count_mismatch() {
        let (x, y) = population(30);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let err = pipeline.fit(&x, &y[..10]).unwrap_err();
        assert_eq!(err.error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_missing_declared_column_rejects_batch() {
        let (x, y) = population(30);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        pipeline.fit(&x, &y).unwrap();

        let without = x.drop("Contract").unwrap();
        let err = pipeline.predict(&without).unwrap_err();
        assert_eq!(err.error_code(), "MISSING_COLUMN");
    }

    #[test]
    fn test_predict_record_matches_batch() {
        let (x, y) = population(60);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let fitted = pipeline.fit(&x, &y).unwrap();

        let record = new_customer();
        let single = fitted.predict_record_proba(&record).unwrap();
        let batch = fitted
            .predict_proba(&records_to_frame(&[record]).unwrap())
            .unwrap();
        assert_eq!(single.to_bits(), batch[0].to_bits());
    }

    #[test]
    fn test_predict_record_validates() {
        let (x, y) = population(30);
        let mut pipeline = Pipeline::new(PreprocessorConfig::default(), params());
        let fitted = pipeline.fit(&x, &y).unwrap();

        let mut record = new_customer();
        record.tenure = -1;
        assert!(fitted.predict_record_proba(&record).is_err());
    }

    #[test]
    fn test_from_fitted_restores_stages() {
        let (x, y) = population(30);
        let mut pipeline = Pipeline::new(PreprocessorConfig::base(), params());
        let fitted = pipeline.fit(&x, &y).unwrap().clone();

        let restored = Pipeline::from_fitted(fitted);
        assert!(restored.is_fitted());
        assert_eq!(restored.stages(), pipeline.stages());
        assert_eq!(restored.params(), pipeline.params());
    }
}
