//! Stratified K-fold cross-validation.

use crate::error::{LearningError, Result};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// A single train/validation split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoldSplit {
    pub fold: usize,
    /// Training rows, ascending.
    pub train: Vec<usize>,
    /// Held-out rows, ascending.
    pub validation: Vec<usize>,
}

/// Stratified K-fold splitter with a seeded shuffle.
///
/// Rows of each class are shuffled, then dealt round-robin across the folds,
/// continuing the rotation from one class to the next so fold sizes differ
/// by at most one. Classes are visited in ascending label order, so the
/// folds depend only on the labels and the seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StratifiedKFold {
    n_splits: usize,
    seed: u64,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize, seed: u64) -> Self {
        Self { n_splits, seed }
    }

    pub fn n_splits(&self) -> usize {
        self.n_splits
    }

    /// Split rows labelled `y` into folds.
    ///
    /// # Errors
    ///
    /// Fails with [`LearningError::InvalidConfig`] for fewer than 2 splits and
    /// with [`LearningError::InvalidData`] when there are fewer rows than
    /// splits.
    pub fn split(&self, y: &[u8]) -> Result<Vec<FoldSplit>> {
        let k = self.n_splits;
        if k < 2 {
            return Err(LearningError::InvalidConfig(
                "cross-validation needs at least 2 folds".to_string(),
            ));
        }
        if y.len() < k {
            return Err(LearningError::InvalidData(format!(
                "cannot split {} rows into {} folds",
                y.len(),
                k
            )));
        }

        let mut by_class: [Vec<usize>; 2] = [Vec::new(), Vec::new()];
        for (row, &label) in y.iter().enumerate() {
            match by_class.get_mut(usize::from(label)) {
                Some(rows) => rows.push(row),
                None => {
                    return Err(LearningError::InvalidData(format!(
                        "label {label} is not 0 or 1"
                    )));
                }
            }
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);
        let mut folds: Vec<Vec<usize>> = vec![Vec::new(); k];
        let mut offset = 0;
        for (label, rows) in by_class.iter_mut().enumerate() {
            if !rows.is_empty() && rows.len() < k {
                warn!(
                    "Class {} has only {} rows for {} folds; some folds will lack it",
                    label,
                    rows.len(),
                    k
                );
            }
            rows.shuffle(&mut rng);
            for (i, &row) in rows.iter().enumerate() {
                folds[(offset + i) % k].push(row);
            }
            offset += rows.len();
        }

        for fold in &mut folds {
            fold.sort_unstable();
        }

        Ok((0..k)
            .map(|fold| {
                let mut train: Vec<usize> = folds
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != fold)
                    .flat_map(|(_, rows)| rows.iter().copied())
                    .collect();
                train.sort_unstable();
                FoldSplit {
                    fold,
                    train,
                    validation: folds[fold].clone(),
                }
            })
            .collect())
    }
}

/// Per-fold scores of one candidate and their summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScores {
    /// Scores in fold order.
    pub scores: Vec<f64>,
    pub mean: f64,
    /// Population standard deviation.
    pub std: f64,
}

impl CvScores {
    /// Summarize scores given in fold order. The sum runs in that order, so
    /// the mean does not depend on which fold finished first.
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len() as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn labels() -> Vec<u8> {
        // 20 negatives, 10 positives
        (0..30).map(|i| u8::from(i % 3 == 0)).collect()
    }

    #[test]
    fn test_folds_partition_rows() {
        let splits = StratifiedKFold::new(3, 42).split(&labels()).unwrap();
        assert_eq!(splits.len(), 3);

        let mut all: Vec<usize> = splits.iter().flat_map(|s| s.validation.clone()).collect();
        all.sort_unstable();
        assert_eq!(all, (0..30).collect::<Vec<_>>());

        for split in &splits {
            assert_eq!(split.train.len() + split.validation.len(), 30);
            assert!(split.validation.iter().all(|row| !split.train.contains(row)));
        }
    }

    #[test]
    fn test_class_ratio_preserved() {
        let y = labels();
        let splits = StratifiedKFold::new(5, 7).split(&y).unwrap();
        for split in &splits {
            let positives = split.validation.iter().filter(|&&row| y[row] == 1).count();
            assert_eq!(split.validation.len(), 6);
            assert_eq!(positives, 2);
        }
    }

    #[test]
    fn test_fold_sizes_balanced_across_classes() {
        // 7 negatives, 4 positives over 3 folds
        let y: Vec<u8> = [0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1].to_vec();
        let splits = StratifiedKFold::new(3, 1).split(&y).unwrap();
        let mut sizes: Vec<usize> = splits.iter().map(|s| s.validation.len()).collect();
        sizes.sort_unstable();
        assert_eq!(sizes, vec![3, 4, 4]);
    }

    #[test]
    fn test_seeded_split_is_deterministic() {
        let a = StratifiedKFold::new(3, 42).split(&labels()).unwrap();
        let b = StratifiedKFold::new(3, 42).split(&labels()).unwrap();
        assert_eq!(a, b);

        let c = StratifiedKFold::new(3, 43).split(&labels()).unwrap();
        assert_ne!(a, c);
    }

    #[test]
    fn test_invalid_inputs() {
        assert_eq!(
            StratifiedKFold::new(1, 0).split(&labels()).unwrap_err().error_code(),
            "INVALID_CONFIG"
        );
        assert_eq!(
            StratifiedKFold::new(3, 0).split(&[0, 1]).unwrap_err().error_code(),
            "INVALID_DATA"
        );
        assert!(StratifiedKFold::new(2, 0).split(&[0, 1, 2, 0]).is_err());
    }

    #[test]
    fn test_cv_scores_summary() {
        let summary = CvScores::from_scores(vec![0.8, 0.9, 1.0]);
        assert!((summary.mean - 0.9).abs() < 1e-12);
        assert!((summary.std - (0.02f64 / 3.0).sqrt()).abs() < 1e-12);
    }
}
