//! Label encoding and the outer train/test split.

use crate::config::DatasetConfig;
use crate::error::{ProcessingError, Result};
use crate::schema::{NO, YES};
use crate::utils::take_rows;
use polars::prelude::*;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::info;

/// Class index of a churned customer.
pub const POSITIVE_CLASS: u8 = 1;
/// Class index of a retained customer.
pub const NEGATIVE_CLASS: u8 = 0;

/// Feature table and labels, partitioned into train and test rows.
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub x_train: DataFrame,
    pub x_test: DataFrame,
    pub y_train: Vec<u8>,
    pub y_test: Vec<u8>,
}

/// Encode a Yes/No label column as `1`/`0`.
///
/// Any other value, including null, fails with [`ProcessingError::InvalidLabel`].
pub fn encode_labels(series: &Series) -> Result<Vec<u8>> {
    let labels = series.cast(&DataType::String)?;
    labels
        .str()?
        .into_iter()
        .map(|value| match value.map(str::trim) {
            Some(YES) => Ok(POSITIVE_CLASS),
            Some(NO) => Ok(NEGATIVE_CLASS),
            Some(other) => Err(ProcessingError::InvalidLabel(other.to_string())),
            None => Err(ProcessingError::InvalidLabel("null".to_string())),
        })
        .collect()
}

/// Separate the label column from the feature columns.
pub fn split_features_target(df: &DataFrame, target: &str) -> Result<(DataFrame, Vec<u8>)> {
    let column = df
        .column(target)
        .map_err(|_| ProcessingError::MissingColumn(target.to_string()))?;
    let labels = encode_labels(column.as_materialized_series())?;
    let features = df.drop(target)?;
    Ok((features, labels))
}

/// Shuffle rows with the configured seed and hold out the first
/// `ceil(n * test_size)` of them as the test partition.
///
/// The split is not stratified.
pub fn train_test_split(df: &DataFrame, config: &DatasetConfig) -> Result<DatasetSplit> {
    config
        .validate()
        .map_err(|e| ProcessingError::InvalidConfig(e.to_string()))?;

    let (features, labels) = split_features_target(df, &config.target_column)?;
    let n = features.height();
    let n_test = (n as f64 * config.test_size).ceil() as usize;
    if n_test == 0 || n_test >= n {
        return Err(ProcessingError::InvalidConfig(format!(
            "test size {} leaves no rows on one side of a {}-row split",
            config.test_size, n
        )));
    }

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = ChaCha8Rng::seed_from_u64(config.random_seed);
    indices.shuffle(&mut rng);
    let (test_idx, train_idx) = indices.split_at(n_test);

    let split = DatasetSplit {
        x_train: take_rows(&features, train_idx)?,
        x_test: take_rows(&features, test_idx)?,
        y_train: train_idx.iter().map(|&i| labels[i]).collect(),
        y_test: test_idx.iter().map(|&i| labels[i]).collect(),
    };

    info!(
        "Split {} rows into {} train / {} test (seed {})",
        n,
        split.y_train.len(),
        split.y_test.len(),
        config.random_seed
    );
    Ok(split)
}
