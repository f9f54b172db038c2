//! Column conversions applied while cleaning.

use crate::error::Result;
use crate::schema::{NO, YES};
use crate::utils::{is_numeric_dtype, parse_numeric};
use polars::prelude::*;

/// Coerce a column to `Float64`.
///
/// String values that do not parse as a finite number become null, the same
/// outcome as a lenient "coerce" conversion. Numeric columns are cast as-is.
pub(crate) fn coerce_to_numeric(series: &Series) -> Result<Series> {
    if series.dtype() == &DataType::String {
        let values: Vec<Option<f64>> = series
            .str()?
            .into_iter()
            .map(|v| v.and_then(parse_numeric))
            .collect();
        return Ok(Series::new(series.name().clone(), values));
    }

    Ok(series.cast(&DataType::Float64)?)
}

/// Normalize a yes/no flag to the `"Yes"`/`"No"` vocabulary.
///
/// Accepts `1`/`0` (numeric or text) and `Yes`/`No`. Anything else becomes
/// null so that the row is dropped rather than encoded as a third category.
pub(crate) fn normalize_yes_no_flag(series: &Series) -> Result<Series> {
    let values: Vec<Option<&'static str>> = if is_numeric_dtype(series.dtype()) {
        series
            .cast(&DataType::Float64)?
            .f64()?
            .into_iter()
            .map(|v| match v {
                Some(x) if x == 1.0 => Some(YES),
                Some(x) if x == 0.0 => Some(NO),
                _ => None,
            })
            .collect()
    } else {
        series
            .cast(&DataType::String)?
            .str()?
            .into_iter()
            .map(|v| match v.map(str::trim) {
                Some("1") | Some("Yes") => Some(YES),
                Some("0") | Some("No") => Some(NO),
                _ => None,
            })
            .collect()
    };

    Ok(Series::new(series.name().clone(), values))
}
