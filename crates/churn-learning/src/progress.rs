//! Progress reporting for training runs.
//!
//! A run moves through [`TrainingStage`]s in order and reports each step as
//! a [`ProgressUpdate`] to an optional [`ProgressCallback`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use churn_learning::{ProgressCallback, ProgressUpdate};
//!
//! let callback: ProgressCallback = Arc::new(|update: ProgressUpdate| {
//!     println!("[{}] {:.0}% - {}", update.stage.as_str(), update.progress * 100.0, update.message);
//!     if let Some((done, total)) = update.tasks_completed {
//!         println!("  fits: {done}/{total}");
//!     }
//! });
//! ```

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;

/// The current stage of a training run.
///
/// Terminal states: [`Complete`](Self::Complete), [`Failed`](Self::Failed),
/// [`Cancelled`](Self::Cancelled).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum TrainingStage {
    /// Validating configuration.
    #[default]
    Initializing,

    /// Coercing charges and dropping incomplete rows.
    Cleaning,

    /// Separating labels and splitting train/test.
    Splitting,

    /// Cross-validating every grid combination.
    Searching,

    /// Fitting the winning combination on the whole training split.
    Refitting,

    /// Scoring the final pipeline on the test split.
    Evaluating,

    Complete,
    Failed,
    Cancelled,
}

const STAGE_NAMES: [(&str, TrainingStage); 9] = [
    ("initializing", TrainingStage::Initializing),
    ("cleaning", TrainingStage::Cleaning),
    ("splitting", TrainingStage::Splitting),
    ("searching", TrainingStage::Searching),
    ("refitting", TrainingStage::Refitting),
    ("evaluating", TrainingStage::Evaluating),
    ("complete", TrainingStage::Complete),
    ("failed", TrainingStage::Failed),
    ("cancelled", TrainingStage::Cancelled),
];

impl TrainingStage {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrainingStage::Initializing => "initializing",
            TrainingStage::Cleaning => "cleaning",
            TrainingStage::Splitting => "splitting",
            TrainingStage::Searching => "searching",
            TrainingStage::Refitting => "refitting",
            TrainingStage::Evaluating => "evaluating",
            TrainingStage::Complete => "complete",
            TrainingStage::Failed => "failed",
            TrainingStage::Cancelled => "cancelled",
        }
    }

    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TrainingStage::Complete | TrainingStage::Failed | TrainingStage::Cancelled
        )
    }
}

/// Error returned when parsing an unknown stage name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid training stage: '{0}'")]
pub struct ParseTrainingStageError(String);

impl FromStr for TrainingStage {
    type Err = ParseTrainingStageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        STAGE_NAMES
            .iter()
            .find(|(name, _)| *name == s)
            .map(|(_, stage)| *stage)
            .ok_or_else(|| ParseTrainingStageError(s.to_string()))
    }
}

/// A progress update from a training run.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub stage: TrainingStage,

    /// Overall progress from 0.0 to 1.0, non-decreasing within a run.
    pub progress: f64,

    pub message: String,

    /// `(completed, total)` fold fits during the search.
    pub tasks_completed: Option<(u32, u32)>,
}

impl ProgressUpdate {
    pub fn new(stage: TrainingStage, progress: f64, message: impl Into<String>) -> Self {
        Self {
            stage,
            progress,
            message: message.into(),
            tasks_completed: None,
        }
    }
}

/// Progress callback. May be invoked from worker threads.
pub type ProgressCallback = Arc<dyn Fn(ProgressUpdate) + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_name_roundtrip() {
        for (name, stage) in STAGE_NAMES {
            assert_eq!(stage.as_str(), name);
            assert_eq!(name.parse::<TrainingStage>(), Ok(stage));
        }
        let err = "training".parse::<TrainingStage>().unwrap_err();
        assert!(err.to_string().contains("training"));
    }

    #[test]
    fn test_terminal_stages() {
        assert!(TrainingStage::Complete.is_terminal());
        assert!(TrainingStage::Cancelled.is_terminal());
        assert!(!TrainingStage::Searching.is_terminal());
    }

    #[test]
    fn test_update_serializes_stage_name() {
        let update = ProgressUpdate::new(TrainingStage::Refitting, 0.9, "refit");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["stage"], "refitting");
        assert!(json["tasks_completed"].is_null());
    }
}
