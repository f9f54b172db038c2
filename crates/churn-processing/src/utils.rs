//! Shared utilities for churn data processing.
//!
//! Column accessors that turn polars lookups into typed errors, plus the
//! string parsing rules used when coercing billing amounts.

use crate::error::{ProcessingError, Result};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// Column Access
// =============================================================================

/// Fetch a column as `Float64`, failing with [`ProcessingError::MissingColumn`]
/// when it is absent.
pub fn numeric_column(df: &DataFrame, name: &str) -> Result<Float64Chunked> {
    let column = df
        .column(name)
        .map_err(|_| ProcessingError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::Float64)?;
    Ok(series.f64()?.clone())
}

/// Fetch a column as `String`, failing with [`ProcessingError::MissingColumn`]
/// when it is absent. Non-string columns are cast (`1` becomes `"1"`).
pub fn string_column(df: &DataFrame, name: &str) -> Result<StringChunked> {
    let column = df
        .column(name)
        .map_err(|_| ProcessingError::MissingColumn(name.to_string()))?;
    let series = column.as_materialized_series().cast(&DataType::String)?;
    Ok(series.str()?.clone())
}

/// Check that every named column is present.
pub fn require_columns(df: &DataFrame, names: &[&str]) -> Result<()> {
    for name in names {
        if df.column(name).is_err() {
            return Err(ProcessingError::MissingColumn((*name).to_string()));
        }
    }
    Ok(())
}

/// Select rows by position, in the given order.
pub fn take_rows(df: &DataFrame, rows: &[usize]) -> Result<DataFrame> {
    let idx: Vec<IdxSize> = rows.iter().map(|&row| row as IdxSize).collect();
    let idx = IdxCa::from_vec("rows".into(), idx);
    Ok(df.take(&idx)?)
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Common missing value markers in exported data.
pub const MISSING_MARKERS: [&str; 6] = ["na", "n/a", "nan", "null", "none", "#n/a"];

/// Check if a string is a missing value marker (blank counts as missing).
pub fn is_missing_marker(s: &str) -> bool {
    let lower = s.trim().to_ascii_lowercase();
    lower.is_empty() || MISSING_MARKERS.iter().any(|&marker| lower == marker)
}

/// Parse a string as a finite `f64`, treating markers and garbage as missing.
pub fn parse_numeric(s: &str) -> Option<f64> {
    if is_missing_marker(s) {
        return None;
    }
    s.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
