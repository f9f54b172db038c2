//! Custom error types for churn data processing.
//!
//! This module provides the error hierarchy used by the cleaner, the feature
//! engineer and the dataset splitter, built with `thiserror`.
//!
//! Errors are serializable so a serving layer can forward them to clients as
//! `{ "code": ..., "message": ... }`.

use serde::Serialize;
use serde::ser::SerializeStruct;
use thiserror::Error;

/// The main error type for churn data processing.
#[derive(Error, Debug)]
pub enum ProcessingError {
    /// A required column is absent from the batch.
    #[error("Required column '{0}' not found in dataset")]
    MissingColumn(String),

    /// A required value is null in a batch that must be complete.
    #[error("Missing value in required column '{column}' at row {row}")]
    MissingValue { column: String, row: usize },

    /// Tenure outside the range covered by the tenure buckets.
    #[error("Tenure {tenure} at row {row} is outside the supported range [0, 100]")]
    TenureOutOfRange { tenure: f64, row: usize },

    /// A target label other than Yes/No.
    #[error("Invalid churn label '{0}' (expected 'Yes' or 'No')")]
    InvalidLabel(String),

    /// A record failed boundary validation.
    #[error("Invalid record field '{field}': {reason}")]
    InvalidRecord { field: String, reason: String },

    /// Every row was lost during cleaning or the input was empty.
    #[error("Dataset is empty: {0}")]
    EmptyDataset(String),

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Polars error wrapper.
    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<ProcessingError>,
    },
}

impl ProcessingError {
    /// Add context to an error.
    pub fn with_context(self, context: impl Into<String>) -> Self {
        ProcessingError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Get a stable error code for callers that branch on the failure kind.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::MissingColumn(_) => "MISSING_COLUMN",
            Self::MissingValue { .. } => "MISSING_VALUE",
            Self::TenureOutOfRange { .. } => "TENURE_OUT_OF_RANGE",
            Self::InvalidLabel(_) => "INVALID_LABEL",
            Self::InvalidRecord { .. } => "INVALID_RECORD",
            Self::EmptyDataset(_) => "EMPTY_DATASET",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Polars(_) => "POLARS_ERROR",
            Self::Json(_) => "JSON_ERROR",
            Self::WithContext { source, .. } => source.error_code(),
        }
    }

    /// Check if this error is a data-quality problem in the input rather than
    /// a programming or configuration fault.
    pub fn is_data_quality(&self) -> bool {
        match self {
            Self::MissingColumn(_)
            | Self::MissingValue { .. }
            | Self::TenureOutOfRange { .. }
            | Self::InvalidLabel(_)
            | Self::InvalidRecord { .. }
            | Self::EmptyDataset(_) => true,
            Self::WithContext { source, .. } => source.is_data_quality(),
            _ => false,
        }
    }
}

impl Serialize for ProcessingError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut state = serializer.serialize_struct("ProcessingError", 2)?;
        state.serialize_field("code", &self.error_code())?;
        state.serialize_field("message", &self.to_string())?;
        state.end()
    }
}

/// Result type alias for processing operations.
pub type Result<T> = std::result::Result<T, ProcessingError>;

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, polars::error::PolarsError> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| ProcessingError::Polars(e).with_context(context))
    }
}
