//! Data cleaning for raw churn exports.
//!
//! This module provides functionality for:
//! - Coercing the total-charges column to numeric (blank strings become missing)
//! - Normalizing the senior-citizen flag to Yes/No
//! - Dropping the customer identifier
//! - Dropping every row that still contains a missing value
//!
//! Dropped rows are unrecoverable, so the count is always returned in a
//! [`CleaningReport`] and logged.

mod converters;

use crate::error::{ProcessingError, Result, ResultExt};
use crate::schema::{CUSTOMER_ID, SENIOR_CITIZEN, TOTAL_CHARGES};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Outcome of a cleaning pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CleaningReport {
    pub rows_before: usize,
    pub rows_after: usize,
    pub rows_dropped: usize,
    /// Total-charges values that failed numeric coercion.
    pub coerced_to_missing: usize,
}

/// Data cleaner for raw churn tables.
#[derive(Debug, Clone, Default)]
pub struct DataCleaner;

impl DataCleaner {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw table.
    ///
    /// 1. Drop the identifier column if present
    /// 2. Coerce total charges to `Float64` (failures become null)
    /// 3. Normalize the senior-citizen flag to Yes/No
    /// 4. Drop every row containing a null
    ///
    /// # Errors
    ///
    /// [`ProcessingError::MissingColumn`] if total charges are absent, and
    /// [`ProcessingError::EmptyDataset`] if no rows survive.
    pub fn clean(&self, df: DataFrame) -> Result<(DataFrame, CleaningReport)> {
        let rows_before = df.height();
        if rows_before == 0 {
            return Err(ProcessingError::EmptyDataset("input table has no rows".to_string()));
        }

        info!("Cleaning dataset with {} rows...", rows_before);
        let mut df = df;

        // 1. Identifier carries no signal
        if df.column(CUSTOMER_ID).is_ok() {
            df = df.drop(CUSTOMER_ID).context("Dropping identifier column")?;
            debug!("Dropped identifier column '{}'", CUSTOMER_ID);
        }

        // 2. Total charges arrive as text with blanks for brand-new customers
        let total = df
            .column(TOTAL_CHARGES)
            .map_err(|_| ProcessingError::MissingColumn(TOTAL_CHARGES.to_string()))?
            .as_materialized_series()
            .clone();
        let nulls_before = total.null_count();
        let coerced = converters::coerce_to_numeric(&total)?;
        let coerced_to_missing = coerced.null_count().saturating_sub(nulls_before);
        df.with_column(coerced).context("Replacing total charges")?;

        if coerced_to_missing > 0 {
            debug!(
                "{} '{}' values could not be parsed and were marked missing",
                coerced_to_missing, TOTAL_CHARGES
            );
        }

        // 3. Senior flag is 0/1 in exports but Yes/No at the inference boundary
        let senior = df
            .column(SENIOR_CITIZEN)
            .ok()
            .map(|c| c.as_materialized_series().clone());
        if let Some(series) = senior {
            let normalized = converters::normalize_yes_no_flag(&series)?;
            df.with_column(normalized).context("Normalizing senior flag")?;
        }

        // 4. Drop incomplete rows
        let df = df.drop_nulls::<String>(None)?;
        let rows_after = df.height();
        let rows_dropped = rows_before - rows_after;

        if rows_dropped > 0 {
            let pct = (rows_dropped as f64 / rows_before as f64) * 100.0;
            warn!(
                "Dropped {} of {} rows ({:.2}%) with missing values after coercion",
                rows_dropped, rows_before, pct
            );
        } else {
            debug!("No rows with missing values found");
        }

        if rows_after == 0 {
            return Err(ProcessingError::EmptyDataset(format!(
                "all {} rows contained missing values",
                rows_before
            )));
        }

        Ok((
            df,
            CleaningReport {
                rows_before,
                rows_after,
                rows_dropped,
                coerced_to_missing,
            },
        ))
    }
}
