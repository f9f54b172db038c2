//! End-to-end training run.
//!
//! [`Trainer::train`] takes a raw table and runs:
//!
//! 1. **Cleaning**: coerce charges, drop incomplete rows
//! 2. **Splitting**: encode labels, hold out the test partition
//! 3. **Searching**: cross-validated grid search, refit of the winner
//! 4. **Evaluating**: classification report on the test partition
//!
//! The result is the fitted pipeline ready to be saved as an artifact, plus
//! a serializable [`TrainingSummary`].

use crate::cancellation::CancellationToken;
use crate::classifier::BoostingParams;
use crate::config::{ScoringMetric, TrainingConfig};
use crate::error::{LearningError, Result};
use crate::metrics::ClassificationReport;
use crate::pipeline::FittedPipeline;
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use crate::search::{CandidateResult, GridSearch};
use chrono::{DateTime, Utc};
use churn_processing::{CleaningReport, DataCleaner, DatasetConfig, train_test_split};
use polars::prelude::DataFrame;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Share of overall progress given to the search.
const SEARCH_SPAN: (f64, f64) = (0.15, 0.85);

/// Importance of one encoded feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// What a training run did and how well the result scores.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub cleaning: CleaningReport,
    pub train_rows: usize,
    pub test_rows: usize,
    pub scoring: ScoringMetric,
    pub best_index: usize,
    pub best_params: BoostingParams,
    /// Mean cross-validation score of the winner.
    pub cv_score: f64,
    pub candidates: Vec<CandidateResult>,
    pub test_report: ClassificationReport,
    /// Features sorted by importance, highest first.
    pub feature_importances: Vec<FeatureImportance>,
    pub search_secs: f64,
    pub trained_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub pipeline: FittedPipeline,
    pub summary: TrainingSummary,
}

/// Runs cleaning, splitting, search and evaluation.
#[derive(Clone)]
pub struct Trainer {
    dataset: DatasetConfig,
    training: TrainingConfig,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("dataset", &self.dataset)
            .field("training", &self.training)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl Trainer {
    pub fn new(dataset: DatasetConfig, training: TrainingConfig) -> Self {
        Self {
            dataset,
            training,
            progress: None,
            cancellation: None,
        }
    }

    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Train on a raw table that still holds the label column.
    pub fn train(&self, raw: DataFrame) -> Result<TrainingOutcome> {
        match self.run(raw) {
            Ok(outcome) => {
                self.report(ProgressUpdate::new(TrainingStage::Complete, 1.0, "Training complete"));
                Ok(outcome)
            }
            Err(e) => {
                let stage = match e {
                    LearningError::Cancelled => TrainingStage::Cancelled,
                    _ => TrainingStage::Failed,
                };
                self.report(ProgressUpdate::new(stage, 1.0, e.to_string()));
                Err(e)
            }
        }
    }

    fn run(&self, raw: DataFrame) -> Result<TrainingOutcome> {
        self.report(ProgressUpdate::new(TrainingStage::Initializing, 0.0, "Validating configuration"));
        self.dataset
            .validate()
            .map_err(|e| LearningError::InvalidConfig(e.to_string()))?;
        self.training.validate()?;

        self.report(ProgressUpdate::new(TrainingStage::Cleaning, 0.05, "Cleaning raw table"));
        let (cleaned, cleaning) = DataCleaner::new().clean(raw)?;

        self.report(ProgressUpdate::new(TrainingStage::Splitting, 0.1, "Splitting train/test"));
        let split = train_test_split(&cleaned, &self.dataset)?;
        info!(
            "Training on {} rows, holding out {} for test",
            split.y_train.len(),
            split.y_test.len()
        );

        let mut search = GridSearch::new(self.training.clone()).progress_callback(self.search_progress());
        if let Some(token) = &self.cancellation {
            search = search.cancellation_token(token.clone());
        }
        let result = search.run(&split.x_train, &split.y_train)?;

        self.report(ProgressUpdate::new(
            TrainingStage::Evaluating,
            0.9,
            "Scoring on held-out rows",
        ));
        let predicted = result.pipeline.predict(&split.x_test)?;
        let test_report = ClassificationReport::new(&predicted, &split.y_test)?;
        info!("Test-set classification report:\n{}", test_report);

        let mut feature_importances: Vec<FeatureImportance> = result
            .pipeline
            .feature_importances()
            .into_iter()
            .map(|(feature, importance)| FeatureImportance { feature, importance })
            .collect();
        feature_importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));

        let summary = TrainingSummary {
            cleaning,
            train_rows: split.y_train.len(),
            test_rows: split.y_test.len(),
            scoring: self.training.scoring,
            best_index: result.best_index,
            best_params: result.best_params,
            cv_score: result.best_score,
            candidates: result.candidates,
            test_report,
            feature_importances,
            search_secs: result.elapsed_secs,
            trained_at: Utc::now(),
        };

        Ok(TrainingOutcome {
            pipeline: result.pipeline,
            summary,
        })
    }

    /// Forward search updates, rescaled into the search's share of the run.
    fn search_progress(&self) -> Option<ProgressCallback> {
        let outer = self.progress.clone()?;
        let (lo, hi) = SEARCH_SPAN;
        Some(Arc::new(move |update: ProgressUpdate| {
            outer(ProgressUpdate {
                progress: lo + (hi - lo) * update.progress,
                ..update
            })
        }))
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress {
            callback(update);
        }
    }
}
