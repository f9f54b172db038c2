//! Engineered features derived from raw customer attributes.
//!
//! The [`FeatureEngineer`] is stateless: every derived value is a pure function
//! of one row. It appends three columns:
//!
//! | Column               | Definition                                    |
//! |----------------------|-----------------------------------------------|
//! | `FamilySize`         | count of `Yes` among partner and dependents   |
//! | `AvgChargesPerMonth` | total charges / (tenure + 1)                  |
//! | `TenureGroup`        | ordinal tenure bucket 1 to 5                  |
//!
//! Missing inputs and out-of-range tenure reject the whole batch. Nothing is
//! clipped or defaulted.

use crate::error::{ProcessingError, Result, ResultExt};
use crate::record::CustomerRecord;
use crate::schema::{
    AVG_CHARGES_PER_MONTH, DEPENDENTS, FAMILY_SIZE, PARTNER, TENURE, TENURE_GROUP, TOTAL_CHARGES,
    YES,
};
use crate::utils::{numeric_column, string_column};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Upper edges of the tenure buckets, in months. The lowest bucket also
/// includes tenure 0.
pub const TENURE_BUCKET_EDGES: [f64; 5] = [12.0, 24.0, 48.0, 60.0, 100.0];

/// Number of `Yes` values among the partner and dependents flags.
pub fn family_size(partner: &str, dependents: &str) -> i32 {
    i32::from(partner == YES) + i32::from(dependents == YES)
}

/// Total charges averaged over `tenure + 1` months.
///
/// The `+ 1` keeps brand-new customers (tenure 0) defined.
pub fn avg_charges_per_month(total_charges: f64, tenure: f64) -> f64 {
    total_charges / (tenure + 1.0)
}

/// Ordinal tenure bucket, or `None` outside `[0, 100]`.
pub fn tenure_group(tenure: f64) -> Option<i32> {
    if !tenure.is_finite() || tenure < 0.0 {
        return None;
    }
    TENURE_BUCKET_EDGES
        .iter()
        .position(|&edge| tenure <= edge)
        .map(|idx| idx as i32 + 1)
}

/// Engineered values for a single record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedFeatures {
    #[serde(rename = "FamilySize")]
    pub family_size: i32,
    #[serde(rename = "AvgChargesPerMonth")]
    pub avg_charges_per_month: f64,
    #[serde(rename = "TenureGroup")]
    pub tenure_group: i32,
}

/// Stateless feature engineer. Always the first pipeline stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureEngineer;

impl FeatureEngineer {
    pub fn new() -> Self {
        Self
    }

    /// Columns this engineer reads.
    pub fn required_columns(&self) -> [&'static str; 4] {
        [PARTNER, DEPENDENTS, TENURE, TOTAL_CHARGES]
    }

    /// Columns this engineer appends.
    pub fn output_columns(&self) -> [&'static str; 3] {
        [FAMILY_SIZE, AVG_CHARGES_PER_MONTH, TENURE_GROUP]
    }

    /// Derive the engineered values of one record.
    pub fn derive(&self, record: &CustomerRecord) -> Result<DerivedFeatures> {
        let tenure = record.tenure as f64;
        let group = tenure_group(tenure).ok_or(ProcessingError::TenureOutOfRange { tenure, row: 0 })?;

        Ok(DerivedFeatures {
            family_size: family_size(&record.partner, &record.dependents),
            avg_charges_per_month: avg_charges_per_month(record.total_charges, tenure),
            tenure_group: group,
        })
    }

    /// Return `df` with the three engineered columns appended (or replaced if
    /// they already exist).
    ///
    /// # Errors
    ///
    /// - [`ProcessingError::MissingColumn`] if an input column is absent
    /// - [`ProcessingError::MissingValue`] if an input value is null
    /// - [`ProcessingError::TenureOutOfRange`] for tenure outside `[0, 100]`
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        let partner = string_column(df, PARTNER)?;
        let dependents = string_column(df, DEPENDENTS)?;
        let tenure = numeric_column(df, TENURE)?;
        let total = numeric_column(df, TOTAL_CHARGES)?;

        let height = df.height();
        let mut sizes = Vec::with_capacity(height);
        let mut averages = Vec::with_capacity(height);
        let mut groups = Vec::with_capacity(height);

        for row in 0..height {
            let p = required(partner.get(row), PARTNER, row)?;
            let d = required(dependents.get(row), DEPENDENTS, row)?;
            let t = required(tenure.get(row), TENURE, row)?;
            let c = required(total.get(row), TOTAL_CHARGES, row)?;

            let group = tenure_group(t).ok_or(ProcessingError::TenureOutOfRange { tenure: t, row })?;

            sizes.push(family_size(p, d));
            averages.push(avg_charges_per_month(c, t));
            groups.push(group);
        }

        let mut out = df.clone();
        out.with_column(Series::new(FAMILY_SIZE.into(), sizes))
            .context("Appending family size")?;
        out.with_column(Series::new(AVG_CHARGES_PER_MONTH.into(), averages))
            .context("Appending average charges")?;
        out.with_column(Series::new(TENURE_GROUP.into(), groups))
            .context("Appending tenure group")?;

        debug!("Engineered features for {} rows", height);
        Ok(out)
    }
}

fn required<T>(value: Option<T>, column: &str, row: usize) -> Result<T> {
    value.ok_or_else(|| ProcessingError::MissingValue {
        column: column.to_string(),
        row,
    })
}
