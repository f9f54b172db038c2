//! Gradient boosted trees for binary classification.
//!
//! Trees are fitted to the gradient and hessian of the logistic loss on the
//! raw margin, with leaf weights `-G / (H + lambda)` scaled by the learning
//! rate. The initial margin is the prior log-odds of the training labels.

use super::BoostingParams;
use super::tree::{TreeBuilder, TreeNode, TreeParams, presort};
use crate::error::{LearningError, Result};
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hessian floor keeping saturated rows from producing zero denominators.
const MIN_HESSIAN: f64 = 1e-16;

/// Fitted boosted-tree classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoostingClassifier {
    params: BoostingParams,
    base_score: f64,
    trees: Vec<TreeNode>,
    n_features: usize,
    feature_importances: Vec<f64>,
}

impl GradientBoostingClassifier {
    /// Fit on a dense feature matrix and 0/1 labels.
    ///
    /// # Errors
    ///
    /// - [`LearningError::InvalidConfig`] for out-of-range parameters
    /// - [`LearningError::InvalidData`] for mismatched shapes, non-finite
    ///   features, labels other than 0/1, or a single class
    pub fn fit(params: &BoostingParams, x: &Array2<f64>, y: &[u8]) -> Result<Self> {
        params.validate()?;
        let n = x.nrows();

        if n != y.len() {
            return Err(LearningError::InvalidData(format!(
                "feature matrix has {} rows but {} labels were given",
                n,
                y.len()
            )));
        }
        if n == 0 {
            return Err(LearningError::InvalidData("cannot fit on zero rows".to_string()));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(LearningError::InvalidData(
                "feature matrix contains non-finite values".to_string(),
            ));
        }
        if let Some(bad) = y.iter().find(|&&label| label > 1) {
            return Err(LearningError::InvalidData(format!("label {bad} is not 0 or 1")));
        }

        let positives = y.iter().filter(|&&label| label == 1).count();
        if positives == 0 || positives == n {
            return Err(LearningError::InvalidData(
                "training labels contain a single class".to_string(),
            ));
        }

        let prior = positives as f64 / n as f64;
        let base_score = (prior / (1.0 - prior)).ln();
        let targets: Vec<f64> = y.iter().map(|&label| f64::from(label)).collect();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            reg_lambda: params.reg_lambda,
            min_child_weight: params.min_child_weight,
        };
        let presorted = presort(x);
        let mut rng = ChaCha8Rng::seed_from_u64(params.random_seed);
        let mut margins = vec![base_score; n];
        let mut grad = vec![0.0; n];
        let mut hess = vec![0.0; n];
        let mut importances = vec![0.0; x.ncols()];
        let mut trees = Vec::with_capacity(params.n_estimators);

        for _ in 0..params.n_estimators {
            for i in 0..n {
                let p = sigmoid(margins[i]);
                grad[i] = p - targets[i];
                hess[i] = (p * (1.0 - p)).max(MIN_HESSIAN);
            }

            let (rows, sorted) = sample_rows(n, params.subsample, &presorted, &mut rng);
            let (tree, gains) = TreeBuilder::new(x, &grad, &hess, tree_params).build(rows, sorted);

            for (total, gain) in importances.iter_mut().zip(gains) {
                *total += gain;
            }
            for (i, margin) in margins.iter_mut().enumerate() {
                *margin += params.learning_rate * tree.predict_row(x.row(i));
            }
            trees.push(tree);
        }

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for importance in &mut importances {
                *importance /= total;
            }
        }

        debug!(
            "Fitted {} trees on {} rows x {} features ({})",
            trees.len(),
            n,
            x.ncols(),
            params
        );

        Ok(Self {
            params: params.clone(),
            base_score,
            trees,
            n_features: x.ncols(),
            feature_importances: importances,
        })
    }

    /// Raw log-odds for each row.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.n_features {
            return Err(LearningError::InvalidData(format!(
                "expected {} features, got {}",
                self.n_features,
                x.ncols()
            )));
        }

        let lr = self.params.learning_rate;
        Ok(x.rows()
            .into_iter()
            .map(|row| {
                self.trees
                    .iter()
                    .fold(self.base_score, |margin, tree| margin + lr * tree.predict_row(row))
            })
            .collect())
    }

    /// Probability of the positive class for each row.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    /// Class labels, positive when the probability is at least 0.5.
    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<u8>> {
        Ok(self
            .predict_proba(x)?
            .iter()
            .map(|&p| u8::from(p >= 0.5))
            .collect())
    }

    pub fn params(&self) -> &BoostingParams {
        &self.params
    }

    /// Prior log-odds the trees are added to.
    pub fn base_score(&self) -> f64 {
        self.base_score
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Total split gain per feature, normalized to sum to 1 (all zeros when
    /// no tree split).
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

#[inline]
pub(crate) fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Draw the rows for one tree without replacement and restrict the presorted
/// lists to them.
fn sample_rows(
    n: usize,
    subsample: f64,
    presorted: &[Vec<usize>],
    rng: &mut ChaCha8Rng,
) -> (Vec<usize>, Vec<Vec<usize>>) {
    if subsample >= 1.0 {
        return ((0..n).collect(), presorted.to_vec());
    }

    let size = ((n as f64 * subsample).ceil() as usize).clamp(1, n);
    let mut rows: Vec<usize> = (0..n).collect();
    rows.shuffle(rng);
    rows.truncate(size);
    rows.sort_unstable();

    let mut selected = vec![false; n];
    for &row in &rows {
        selected[row] = true;
    }
    let sorted = presorted
        .iter()
        .map(|list| list.iter().copied().filter(|&row| selected[row]).collect())
        .collect();

    (rows, sorted)
}
