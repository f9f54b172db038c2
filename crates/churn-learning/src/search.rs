//! Hyperparameter grid search with stratified cross-validation.
//!
//! The search expands the grid into candidates, splits the training rows
//! into stratified folds once, and builds one task per
//! (candidate, fold) pair. Tasks run on a rayon pool; each fits a fresh
//! [`Pipeline`] on the other folds and scores it on the held-out fold.
//! Results come back in task order regardless of completion order, and each
//! candidate's mean is summed in fold order, so the outcome depends only on
//! the data, the grid and the seed.
//!
//! The winner is the candidate with the highest mean score. Ties keep the
//! candidate that comes first in grid order. The winner is then refit on the
//! full training split.

use crate::cancellation::CancellationToken;
use crate::classifier::BoostingParams;
use crate::config::TrainingConfig;
use crate::cv::{CvScores, FoldSplit, StratifiedKFold};
use crate::error::{LearningError, Result};
use crate::metrics;
use crate::pipeline::{FittedPipeline, Pipeline};
use crate::progress::{ProgressCallback, ProgressUpdate, TrainingStage};
use churn_processing::utils::take_rows;
use parking_lot::Mutex;
use polars::prelude::DataFrame;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation outcome of one grid combination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in grid enumeration order.
    pub index: usize,
    pub params: BoostingParams,
    /// Fold scores and their summary; `None` when a fold failed.
    pub scores: Option<CvScores>,
    /// First fold failure, if any.
    pub error: Option<String>,
}

impl CandidateResult {
    pub fn mean_score(&self) -> Option<f64> {
        self.scores.as_ref().map(|s| s.mean)
    }
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub best_index: usize,
    pub best_params: BoostingParams,
    pub best_score: f64,
    /// Every candidate, in grid order.
    pub candidates: Vec<CandidateResult>,
    /// The winning combination refit on all training rows.
    pub pipeline: FittedPipeline,
    pub elapsed_secs: f64,
}

/// Rows of one fold, materialized once and shared by every candidate.
struct FoldData {
    x_train: DataFrame,
    y_train: Vec<u8>,
    x_val: DataFrame,
    y_val: Vec<u8>,
}

impl FoldData {
    fn new(x: &DataFrame, y: &[u8], split: &FoldSplit) -> Result<Self> {
        Ok(Self {
            x_train: take_rows(x, &split.train)?,
            y_train: split.train.iter().map(|&row| y[row]).collect(),
            x_val: take_rows(x, &split.validation)?,
            y_val: split.validation.iter().map(|&row| y[row]).collect(),
        })
    }
}

/// Exhaustive search over [`TrainingConfig::param_grid`].
///
/// # Example
///
/// ```rust,ignore
/// let result = GridSearch::new(config)
///     .on_progress(|u| println!("{}", u.message))
///     .run(&x_train, &y_train)?;
/// println!("best: {} ({:.4})", result.best_params, result.best_score);
/// ```
#[derive(Clone)]
pub struct GridSearch {
    config: TrainingConfig,
    progress: Option<ProgressCallback>,
    cancellation: Option<CancellationToken>,
}

impl std::fmt::Debug for GridSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridSearch")
            .field("config", &self.config)
            .field("progress", &self.progress.as_ref().map(|_| "<callback>"))
            .field("cancellation", &self.cancellation)
            .finish()
    }
}

impl GridSearch {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            progress: None,
            cancellation: None,
        }
    }

    /// Report progress of the search. `progress` runs from 0.0 to 1.0 over
    /// the search alone.
    #[must_use]
    pub fn on_progress<F>(mut self, callback: F) -> Self
    where
        F: Fn(ProgressUpdate) + Send + Sync + 'static,
    {
        self.progress = Some(Arc::new(callback));
        self
    }

    #[must_use]
    pub fn progress_callback(mut self, callback: Option<ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run the search on training rows `x` with labels `y`.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] for an invalid configuration
    /// - [`LearningError::Cancelled`] if the token fires before the last fit
    /// - [`LearningError::Timeout`] if the budget runs out before the last fit
    /// - [`LearningError::SearchExhausted`] if every combination failed,
    ///   carrying the first failure
    pub fn run(&self, x: &DataFrame, y: &[u8]) -> Result<SearchResult> {
        self.config.validate()?;
        if x.height() != y.len() {
            return Err(LearningError::InvalidData(format!(
                "table has {} rows but {} labels were given",
                x.height(),
                y.len()
            )));
        }

        let start = Instant::now();
        let candidates = self.config.candidates();
        let splits = StratifiedKFold::new(self.config.cv_folds, self.config.random_seed).split(y)?;
        let folds = splits
            .iter()
            .map(|split| FoldData::new(x, y, split))
            .collect::<Result<Vec<_>>>()?;

        let tasks: Vec<(usize, usize)> = (0..candidates.len())
            .flat_map(|c| (0..folds.len()).map(move |f| (c, f)))
            .collect();
        let total = tasks.len();

        info!(
            "Grid search: {} combinations x {} folds = {} fits",
            candidates.len(),
            folds.len(),
            total
        );
        self.report(ProgressUpdate {
            tasks_completed: Some((0, total as u32)),
            ..ProgressUpdate::new(TrainingStage::Searching, 0.0, "Starting grid search")
        });

        let completed = Mutex::new(0usize);
        let run_task = |&(c, f): &(usize, usize)| -> Result<f64> {
            self.check_budget(start)?;
            let outcome = evaluate(&self.config, &candidates[c], &folds[f]);
            self.task_done(&completed, total);
            outcome
        };

        let outcomes: Vec<Result<f64>> = match self.config.n_jobs {
            n if n > 0 => rayon::ThreadPoolBuilder::new()
                .num_threads(n as usize)
                .build()
                .map_err(|e| LearningError::TrainingFailed(format!("cannot start worker pool: {e}")))?
                .install(|| tasks.par_iter().map(run_task).collect()),
            _ => tasks.par_iter().map(run_task).collect(),
        };

        if let Some(err) = outcomes.iter().find_map(|o| o.as_ref().err().filter(|e| is_interrupt(e))) {
            return Err(match err {
                LearningError::Cancelled => LearningError::Cancelled,
                _ => LearningError::Timeout {
                    elapsed_secs: start.elapsed().as_secs_f64(),
                },
            });
        }

        let (results, first_error) = collect_candidates(&candidates, folds.len(), outcomes);
        let best = select_best(&results).ok_or_else(|| LearningError::SearchExhausted {
            attempted: candidates.len(),
            source: Box::new(first_error.unwrap_or_else(|| {
                LearningError::TrainingFailed("no candidates were evaluated".to_string())
            })),
        })?;
        let best_params = results[best].params.clone();
        let best_score = results[best].mean_score().unwrap_or_default();

        info!(
            "Best combination #{} ({}) with mean {} {:.4}",
            best,
            best_params,
            self.config.scoring.as_str(),
            best_score
        );
        self.report(ProgressUpdate::new(
            TrainingStage::Refitting,
            0.95,
            format!("Refitting {best_params} on {} rows", x.height()),
        ));

        let mut pipeline = Pipeline::new(self.config.preprocessor.clone(), best_params.clone());
        pipeline.fit(x, y)?;
        let pipeline = pipeline.into_fitted()?;

        self.report(ProgressUpdate::new(TrainingStage::Refitting, 1.0, "Search complete"));

        Ok(SearchResult {
            best_index: best,
            best_params,
            best_score,
            candidates: results,
            pipeline,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }

    fn check_budget(&self, start: Instant) -> Result<()> {
        if self.cancellation.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(LearningError::Cancelled);
        }
        if let Some(limit) = self.config.timeout {
            let elapsed = start.elapsed();
            if elapsed > limit {
                return Err(LearningError::Timeout {
                    elapsed_secs: elapsed.as_secs_f64(),
                });
            }
        }
        Ok(())
    }

    /// Count a finished fit and report it. The lock keeps reported counts
    /// in increasing order.
    fn task_done(&self, completed: &Mutex<usize>, total: usize) {
        let mut done = completed.lock();
        *done += 1;
        self.report(ProgressUpdate {
            tasks_completed: Some((*done as u32, total as u32)),
            ..ProgressUpdate::new(
                TrainingStage::Searching,
                0.9 * *done as f64 / total as f64,
                format!("Cross-validation fit {}/{}", *done, total),
            )
        });
    }

    fn report(&self, update: ProgressUpdate) {
        if let Some(callback) = &self.progress {
            callback(update);
        }
    }
}

/// Fit one candidate on one fold and score it on the held-out rows.
fn evaluate(config: &TrainingConfig, params: &BoostingParams, fold: &FoldData) -> Result<f64> {
    let mut pipeline = Pipeline::new(config.preprocessor.clone(), params.clone());
    pipeline.fit(&fold.x_train, &fold.y_train)?;
    let predicted = pipeline.predict(&fold.x_val)?;
    metrics::score(config.scoring, &predicted, &fold.y_val)
}

fn is_interrupt(err: &LearningError) -> bool {
    matches!(err, LearningError::Cancelled | LearningError::Timeout { .. })
}

/// Group task outcomes (candidate-major) into per-candidate results, and
/// return the first failure in grid order.
fn collect_candidates(
    candidates: &[BoostingParams],
    n_folds: usize,
    outcomes: Vec<Result<f64>>,
) -> (Vec<CandidateResult>, Option<LearningError>) {
    let mut outcomes = outcomes.into_iter();
    let mut first_error = None;

    let results = candidates
        .iter()
        .enumerate()
        .map(|(index, params)| {
            let mut scores = Vec::with_capacity(n_folds);
            let mut error = None;
            for outcome in outcomes.by_ref().take(n_folds) {
                match outcome {
                    Ok(score) => scores.push(score),
                    Err(e) if error.is_none() => error = Some(e),
                    Err(_) => {}
                }
            }

            match error {
                None => {
                    let scores = CvScores::from_scores(scores);
                    debug!(
                        "Candidate #{} ({}): mean {:.4} std {:.4}",
                        index, params, scores.mean, scores.std
                    );
                    CandidateResult {
                        index,
                        params: params.clone(),
                        scores: Some(scores),
                        error: None,
                    }
                }
                Some(e) => {
                    warn!("Candidate #{} ({}) failed: {}", index, params, e);
                    let message = e.to_string();
                    first_error.get_or_insert(e);
                    CandidateResult {
                        index,
                        params: params.clone(),
                        scores: None,
                        error: Some(message),
                    }
                }
            }
        })
        .collect();

    (results, first_error)
}

/// Highest mean score; the earliest candidate wins a tie.
fn select_best(results: &[CandidateResult]) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for result in results {
        if let Some(mean) = result.mean_score() {
            if best.is_none_or(|(_, top)| mean > top) {
                best = Some((result.index, mean));
            }
        }
    }
    best.map(|(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ParamGrid;
    use crate::testing::population;
    use std::time::Duration;

    fn small_grid() -> ParamGrid {
        ParamGrid {
            n_estimators: vec![5, 10],
            learning_rate: vec![0.1],
            max_depth: vec![2, 3],
            subsample: vec![1.0],
        }
    }

    fn config() -> TrainingConfig {
        TrainingConfig::builder()
            .param_grid(small_grid())
            .n_jobs(2)
            .build()
            .unwrap()
    }

    fn candidate(index: usize, mean: Option<f64>) -> CandidateResult {
        CandidateResult {
            index,
            params: BoostingParams::default(),
            scores: mean.map(|m| CvScores::from_scores(vec![m])),
            error: mean.is_none().then(|| "failed".to_string()),
        }
    }

    #[test]
    fn test_select_best_keeps_first_of_ties() {
        let results = [
            candidate(0, Some(0.7)),
            candidate(1, Some(0.8)),
            candidate(2, None),
            candidate(3, Some(0.8)),
        ];
        assert_eq!(select_best(&results), Some(1));
        assert_eq!(select_best(&[candidate(0, None)]), None);
    }

    #[test]
    fn test_collect_candidates_groups_in_order() {
        let candidates = vec![BoostingParams::default(); 2];
        let outcomes = vec![
            Ok(0.5),
            Ok(0.7),
            Err(LearningError::InvalidData("one class".to_string())),
            Ok(0.9),
        ];
        let (results, first_error) = collect_candidates(&candidates, 2, outcomes);

        assert_eq!(results[0].scores.as_ref().unwrap().scores, vec![0.5, 0.7]);
        assert!((results[0].mean_score().unwrap() - 0.6).abs() < 1e-12);
        assert!(results[1].scores.is_none());
        assert!(results[1].error.as_ref().unwrap().contains("one class"));
        assert_eq!(first_error.unwrap().error_code(), "INVALID_DATA");
    }

    #[test]
    fn test_search_is_deterministic() {
        let (x, y) = population(90);
        let a = GridSearch::new(config()).run(&x, &y).unwrap();
        let b = GridSearch::new(config()).run(&x, &y).unwrap();

        assert_eq!(a.best_index, b.best_index);
        assert_eq!(a.best_score.to_bits(), b.best_score.to_bits());
        assert_eq!(a.candidates, b.candidates);
        assert_eq!(a.pipeline, b.pipeline);
        assert_eq!(a.candidates.len(), 4);
        assert_eq!(a.pipeline.params(), &a.best_params);
    }

    #[test]
    fn test_thread_count_does_not_change_result() {
        let (x, y) = population(60);
        let parallel = GridSearch::new(config()).run(&x, &y).unwrap();
        let serial = GridSearch::new(TrainingConfig { n_jobs: 1, ..config() })
            .run(&x, &y)
            .unwrap();
        assert_eq!(parallel.candidates, serial.candidates);
        assert_eq!(parallel.best_index, serial.best_index);
    }

    #[test]
    fn test_progress_reports_every_fit() {
        let (x, y) = population(60);
        let updates = Arc::new(Mutex::new(Vec::new()));
        let sink = updates.clone();

        GridSearch::new(config())
            .on_progress(move |u| sink.lock().push(u))
            .run(&x, &y)
            .unwrap();

        let updates = updates.lock();
        let fits: Vec<u32> = updates
            .iter()
            .filter_map(|u| u.tasks_completed.map(|(done, _)| done))
            .collect();
        assert_eq!(fits, (0..=12).collect::<Vec<u32>>());
        assert!(updates.windows(2).all(|w| w[0].progress <= w[1].progress));
        assert_eq!(updates.last().unwrap().progress, 1.0);
    }

    #[test]
    fn test_cancelled_before_start() {
        let (x, y) = population(30);
        let token = CancellationToken::new();
        token.cancel();

        let err = GridSearch::new(config())
            .cancellation_token(token)
            .run(&x, &y)
            .unwrap_err();
        assert_eq!(err.error_code(), "CANCELLED");
    }

    #[test]
    fn test_timeout() {
        let (x, y) = population(30);
        let config = TrainingConfig {
            timeout: Some(Duration::from_nanos(1)),
            ..config()
        };
        let err = GridSearch::new(config).run(&x, &y).unwrap_err();
        assert_eq!(err.error_code(), "TIMEOUT");
    }

    #[test]
    fn test_all_candidates_failing_is_exhausted() {
        let (x, y) = population(30);
        let config = TrainingConfig {
            preprocessor: crate::config::PreprocessorConfig {
                numeric_features: vec!["NoSuchColumn".to_string()],
                categorical_features: vec![],
            },
            ..config()
        };
        let err = GridSearch::new(config).run(&x, &y).unwrap_err();

        assert_eq!(err.error_code(), "SEARCH_EXHAUSTED");
        let source = std::error::Error::source(&err).unwrap();
        assert!(source.to_string().contains("NoSuchColumn"));
    }
}
