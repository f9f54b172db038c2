//! Error types for the churn-learning crate.
//!
//! This module defines [`LearningError`], the main error type used throughout
//! the crate. All public API functions return `Result<T, LearningError>`.
//!
//! # Error Handling
//!
//! Errors fall into three groups a caller usually needs to tell apart:
//! - **Per-request**: bad input data or a record that fails validation
//! - **Service**: the model handle is not ready or its artifact failed to load
//! - **Run**: training failures, search exhaustion, cancellation, timeout
//!
//! Every variant maps to a stable code via [`LearningError::error_code`], and
//! errors serialize as `{ "code": ..., "message": ... }`.

use churn_processing::ProcessingError;
use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for churn-learning operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum LearningError {
    /// Invalid configuration provided to a component.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid data provided for fitting or prediction.
    ///
    /// Common causes:
    /// - Feature and label counts differ
    /// - Only one class present in the labels
    /// - A declared numeric column holds a null or non-finite value
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// A declared column is absent from the batch.
    #[error("Required column '{0}' not found")]
    MissingColumn(String),

    /// Predict was called on a pipeline or stage that has not been fitted.
    #[error("Pipeline has not been fitted; call fit() or load an artifact first")]
    NotFitted,

    /// Fitting a single pipeline failed.
    #[error("Training failed: {0}")]
    TrainingFailed(String),

    /// Every grid combination failed. Carries the first underlying failure.
    #[error("All {attempted} parameter combinations failed; first failure: {source}")]
    SearchExhausted {
        attempted: usize,
        #[source]
        source: Box<LearningError>,
    },

    /// The search was cancelled through its token.
    #[error("Training cancelled")]
    Cancelled,

    /// The search exceeded its time budget.
    #[error("Search timed out after {elapsed_secs:.1}s")]
    Timeout { elapsed_secs: f64 },

    /// The artifact file does not exist.
    #[error("Artifact not found: {path}")]
    ArtifactNotFound { path: String },

    /// The artifact exists but cannot be decoded or fails its checksum.
    #[error("Artifact is corrupt: {0}")]
    ArtifactCorrupt(String),

    /// The artifact was written with an incompatible format version.
    #[error("Unsupported artifact version {found} (supported: {supported})")]
    UnsupportedArtifactVersion { found: u32, supported: u32 },

    /// The inference handle has not been initialized.
    #[error("Model is not ready; no artifact has been loaded")]
    ModelNotReady,

    /// The inference handle failed to initialize.
    #[error("Model is unavailable: {0}")]
    ModelUnavailable(String),

    /// Data preparation error.
    #[error(transparent)]
    Processing(#[from] ProcessingError),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// I/O error during artifact save/load.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl LearningError {
    /// Get a stable error code for callers that branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::InvalidData(_) => "INVALID_DATA",
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::NotFitted => "NOT_FITTED",
            Self::TrainingFailed(_) => "TRAINING_FAILED",
            Self::SearchExhausted { .. } => "SEARCH_EXHAUSTED",
            Self::Cancelled => "CANCELLED",
            Self::Timeout { .. } => "TIMEOUT",
            Self::ArtifactNotFound { .. } => "ARTIFACT_NOT_FOUND",
            Self::ArtifactCorrupt(_) => "ARTIFACT_CORRUPT",
            Self::UnsupportedArtifactVersion { .. } => "UNSUPPORTED_ARTIFACT_VERSION",
            Self::ModelNotReady => "MODEL_NOT_READY",
            Self::ModelUnavailable(_) => "MODEL_UNAVAILABLE",
            Self::Processing(e) => e.error_code(),
            Self::Polars(_) => "POLARS_ERROR",
            Self::Io(_) => "IO_ERROR",
            Self::Json(_) => "JSON_ERROR",
        }
    }

    /// Check if this error means the service cannot answer any request, as
    /// opposed to rejecting one bad request.
    pub fn is_service_unavailable(&self) -> bool {
        matches!(
            self,
            Self::ModelNotReady
                | Self::ModelUnavailable(_)
                | Self::ArtifactNotFound { .. }
                | Self::ArtifactCorrupt(_)
                | Self::UnsupportedArtifactVersion { .. }
        )
    }
}

impl Serialize for LearningError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("LearningError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for learning operations.
pub type Result<T> = std::result::Result<T, LearningError>;
