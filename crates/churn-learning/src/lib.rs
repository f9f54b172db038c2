//! churn-learning: model training and inference for customer churn.
//!
//! This crate turns cleaned churn tables into a fitted prediction pipeline
//! and serves predictions from it.
//!
//! # Features
//!
//! - **Pipeline**: feature engineering, column preprocessing and a
//!   gradient-boosted tree classifier behind one fit/predict contract
//! - **Grid Search**: stratified cross-validation over a parameter grid,
//!   run in parallel with a deterministic winner
//! - **Artifacts**: versioned, checksummed JSON that reloads bit-for-bit
//! - **Serving**: a shared read-only [`ModelHandle`] with an explicit
//!   not-ready state and a configurable [`RiskPolicy`]
//! - **Progress Reporting**: stage callbacks and cooperative cancellation
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use churn_learning::{ModelHandle, RiskPolicy, Trainer, TrainingConfig};
//! use churn_processing::DatasetConfig;
//!
//! let outcome = Trainer::new(DatasetConfig::default(), TrainingConfig::default())
//!     .on_progress(|u| println!("{:.0}% - {}", u.progress * 100.0, u.message))
//!     .train(raw_table)?;
//! outcome.pipeline.save("churn_model.json")?;
//!
//! let handle = ModelHandle::with_policy(RiskPolicy::default())?;
//! handle.initialize_from_path("churn_model.json")?;
//! let prediction = handle.predict(&record)?;
//! println!("{} ({:.2})", prediction.risk_level, prediction.churn_probability);
//! ```
//!
//! # Architecture
//!
//! ```text
//! raw table ──► DataCleaner ──► train_test_split
//!                                    │
//!                                    ▼
//!              GridSearch: (combination × fold) tasks on rayon
//!                 each task: Pipeline.fit ──► score held-out fold
//!                                    │
//!                                    ▼
//!              refit winner ──► FittedPipeline ──► artifact
//!                                                      │
//!                                                      ▼
//!                                  ModelHandle ──► ChurnPrediction
//! ```
//!
//! # Error Handling
//!
//! All fallible operations return [`Result<T>`], with [`LearningError`]
//! carrying a stable [`error_code`](LearningError::error_code). Errors from
//! data preparation pass through with their own codes.
//!
//! # Thread Safety
//!
//! [`FittedPipeline`] and [`ModelHandle`] are `Send + Sync`; prediction
//! never mutates fitted state.

pub mod artifact;
pub mod cancellation;
pub mod classifier;
pub mod config;
pub mod cv;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod preprocess;
pub mod progress;
pub mod search;
pub mod serving;
pub mod stage;
pub mod training;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenient access
pub use artifact::{ARTIFACT_FORMAT, ARTIFACT_VERSION, ArtifactMetadata, read_metadata};
pub use cancellation::CancellationToken;
pub use classifier::{BoostingParams, GradientBoostingClassifier, TreeNode};
pub use config::{
    ParamGrid, PreprocessorConfig, ScoringMetric, TrainingConfig, TrainingConfigBuilder,
};
pub use cv::{CvScores, FoldSplit, StratifiedKFold};
pub use error::{LearningError, Result};
pub use metrics::{ClassMetrics, ClassificationReport, accuracy};
pub use pipeline::{FittedPipeline, Pipeline};
pub use preprocess::{CategoryEncoder, ColumnPreprocessor, NumericScaler, PreprocessorState};
pub use progress::{ProgressCallback, ProgressUpdate, TrainingStage};
pub use search::{CandidateResult, GridSearch, SearchResult};
pub use serving::{ChurnPrediction, ModelHandle, RiskPolicy};
pub use stage::{Apply, Batch, FittedStage, Stage, Transform};
pub use training::{FeatureImportance, Trainer, TrainingOutcome, TrainingSummary};
