//! Customer Churn Data Processing
//!
//! Dataset preparation for churn modelling, built on Polars.
//!
//! # Overview
//!
//! - **Cleaning**: numeric coercion of billing totals, flag normalization,
//!   explicit and counted removal of incomplete rows
//! - **Feature Engineering**: `FamilySize`, `AvgChargesPerMonth` and
//!   `TenureGroup`, derived per row with no fitted state
//! - **Splitting**: label encoding and a seeded train/test split
//! - **Inference Boundary**: a typed [`CustomerRecord`] with validation and
//!   conversion to a one-row table
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use churn_processing::{DataCleaner, DatasetConfig, FeatureEngineer, train_test_split};
//! use polars::prelude::*;
//!
//! let raw = CsvReadOptions::default()
//!     .with_has_header(true)
//!     .try_into_reader_with_file_path(Some("telco.csv".into()))?
//!     .finish()?;
//!
//! let (clean, report) = DataCleaner::new().clean(raw)?;
//! println!("Dropped {} rows", report.rows_dropped);
//!
//! let split = train_test_split(&clean, &DatasetConfig::default())?;
//! let features = FeatureEngineer::new().transform(&split.x_train)?;
//! ```

pub mod cleaner;
pub mod config;
pub mod error;
pub mod features;
pub mod record;
pub mod schema;
pub mod split;
pub mod utils;

// Re-exports for convenient access
pub use cleaner::{CleaningReport, DataCleaner};
pub use config::{ConfigValidationError, DatasetConfig, DatasetConfigBuilder};
pub use error::{ProcessingError, Result as ProcessingResult, ResultExt};
pub use features::{
    DerivedFeatures, FeatureEngineer, avg_charges_per_month, family_size, tenure_group,
};
pub use record::{CustomerRecord, records_to_frame};
pub use split::{
    DatasetSplit, NEGATIVE_CLASS, POSITIVE_CLASS, encode_labels, split_features_target,
    train_test_split,
};
