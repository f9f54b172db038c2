//! Regression trees grown on first and second order gradient statistics.
//!
//! Each node keeps, for every feature, its rows sorted by that feature's
//! value. Children inherit the order through a stable partition, so split
//! search is a single linear scan per feature per node.

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// A fitted tree node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node contributing `weight` to the raw margin.
    Leaf { weight: f64 },
    /// Rows with `x[feature] <= threshold` go left.
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    /// Margin contribution for one row.
    pub fn predict_row(&self, row: ArrayView1<'_, f64>) -> f64 {
        let mut node = self;
        loop {
            match node {
                TreeNode::Leaf { weight } => return *weight,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold { left } else { right };
                }
            }
        }
    }

    /// Depth of the deepest leaf (a lone leaf has depth 0).
    pub fn depth(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 0,
            TreeNode::Split { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Number of leaves.
    pub fn n_leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.n_leaves() + right.n_leaves(),
        }
    }
}

/// Growth limits for a single tree.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub reg_lambda: f64,
    pub min_child_weight: f64,
}

#[derive(Debug, Clone, Copy)]
struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

/// Grows one tree against fixed gradients and hessians.
pub(crate) struct TreeBuilder<'a> {
    x: &'a Array2<f64>,
    grad: &'a [f64],
    hess: &'a [f64],
    params: TreeParams,
    goes_left: Vec<bool>,
    gains: Vec<f64>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(x: &'a Array2<f64>, grad: &'a [f64], hess: &'a [f64], params: TreeParams) -> Self {
        Self {
            x,
            grad,
            hess,
            params,
            goes_left: vec![false; x.nrows()],
            gains: vec![0.0; x.ncols()],
        }
    }

    /// Grow a tree over `rows`.
    ///
    /// `sorted[f]` must hold exactly the same rows as `rows`, ordered by
    /// feature `f`. Returns the tree and the split gain accumulated per
    /// feature.
    pub fn build(mut self, rows: Vec<usize>, sorted: Vec<Vec<usize>>) -> (TreeNode, Vec<f64>) {
        let root = self.grow(rows, sorted, 0);
        (root, self.gains)
    }

    fn grow(&mut self, rows: Vec<usize>, sorted: Vec<Vec<usize>>, depth: usize) -> TreeNode {
        let (g, h) = self.sums(&rows);
        let leaf = TreeNode::Leaf {
            weight: leaf_weight(g, h, self.params.reg_lambda),
        };

        if depth >= self.params.max_depth || rows.len() < 2 {
            return leaf;
        }

        let Some(split) = self.best_split(&sorted, g, h) else {
            return leaf;
        };
        self.gains[split.feature] += split.gain;

        for &row in &rows {
            self.goes_left[row] = self.x[[row, split.feature]] <= split.threshold;
        }

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&row| self.goes_left[row]);

        let mut left_sorted = Vec::with_capacity(sorted.len());
        let mut right_sorted = Vec::with_capacity(sorted.len());
        for list in sorted {
            let (l, r): (Vec<usize>, Vec<usize>) =
                list.into_iter().partition(|&row| self.goes_left[row]);
            left_sorted.push(l);
            right_sorted.push(r);
        }

        let left = self.grow(left_rows, left_sorted, depth + 1);
        let right = self.grow(right_rows, right_sorted, depth + 1);

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn sums(&self, rows: &[usize]) -> (f64, f64) {
        rows.iter()
            .fold((0.0, 0.0), |(g, h), &row| (g + self.grad[row], h + self.hess[row]))
    }

    /// Exact greedy search. Features and cut points are scanned in order and
    /// only a strictly larger gain replaces the current best.
    fn best_split(&self, sorted: &[Vec<usize>], g: f64, h: f64) -> Option<SplitCandidate> {
        let lambda = self.params.reg_lambda;
        let min_child = self.params.min_child_weight;
        let parent = score(g, h, lambda);
        let mut best: Option<SplitCandidate> = None;

        for (feature, list) in sorted.iter().enumerate() {
            let mut gl = 0.0;
            let mut hl = 0.0;

            for pair in list.windows(2) {
                let (row, next) = (pair[0], pair[1]);
                gl += self.grad[row];
                hl += self.hess[row];

                let value = self.x[[row, feature]];
                let next_value = self.x[[next, feature]];
                if value >= next_value {
                    continue;
                }

                let hr = h - hl;
                if hl < min_child || hr < min_child {
                    continue;
                }

                let gr = g - gl;
                let gain = 0.5 * (score(gl, hl, lambda) + score(gr, hr, lambda) - parent);
                if gain > best.map_or(0.0, |b| b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: cut_point(value, next_value),
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// Optimal leaf weight for the regularized second order objective.
#[inline]
pub(crate) fn leaf_weight(g: f64, h: f64, lambda: f64) -> f64 {
    -g / (h + lambda)
}

#[inline]
fn score(g: f64, h: f64, lambda: f64) -> f64 {
    g * g / (h + lambda)
}

/// Midpoint between two adjacent distinct values, falling back to the lower
/// value when the midpoint rounds up to the upper one.
#[inline]
fn cut_point(low: f64, high: f64) -> f64 {
    let mid = low + (high - low) / 2.0;
    if mid < high { mid } else { low }
}

/// Row indices ordered by each feature's value (ties keep row order).
pub(crate) fn presort(x: &Array2<f64>) -> Vec<Vec<usize>> {
    (0..x.ncols())
        .map(|feature| {
            let mut rows: Vec<usize> = (0..x.nrows()).collect();
            rows.sort_by(|&a, &b| x[[a, feature]].total_cmp(&x[[b, feature]]));
            rows
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn params(max_depth: usize) -> TreeParams {
        TreeParams {
            max_depth,
            reg_lambda: 1.0,
            min_child_weight: 0.0,
        }
    }

    fn build(x: &Array2<f64>, grad: &[f64], hess: &[f64], p: TreeParams) -> (TreeNode, Vec<f64>) {
        let rows: Vec<usize> = (0..x.nrows()).collect();
        TreeBuilder::new(x, grad, hess, p).build(rows, presort(x))
    }

    #[test]
    fn test_leaf_weight() {
        assert_eq!(leaf_weight(2.0, 3.0, 1.0), -0.5);
        assert_eq!(leaf_weight(0.0, 3.0, 1.0), 0.0);
    }

    #[test]
    fn test_cut_point() {
        assert_eq!(cut_point(1.0, 2.0), 1.5);
        let next = f64::from_bits(1.0f64.to_bits() + 1);
        assert_eq!(cut_point(1.0, next), 1.0);
    }

    #[test]
    fn test_presort_is_stable() {
        let x = array![[3.0, 1.0], [1.0, 1.0], [2.0, 0.0]];
        let sorted = presort(&x);
        assert_eq!(sorted[0], vec![1, 2, 0]);
        assert_eq!(sorted[1], vec![2, 0, 1]);
    }

    #[test]
    fn test_splits_on_informative_feature() {
        // Feature 1 separates the gradient signs; feature 0 is noise
        let x = array![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let grad = [1.0, 1.0, -1.0, -1.0];
        let hess = [1.0; 4];

        let (tree, gains) = build(&x, &grad, &hess, params(1));
        match &tree {
            TreeNode::Split {
                feature, threshold, ..
            } => {
                assert_eq!(*feature, 1);
                assert_eq!(*threshold, 0.5);
            }
            TreeNode::Leaf { .. } => panic!("expected a split"),
        }
        assert!(gains[1] > 0.0);
        assert_eq!(gains[0], 0.0);

        // Left leaf: G = 2, H = 2 -> -2/3
        assert!((tree.predict_row(x.row(0)) + 2.0 / 3.0).abs() < 1e-12);
        assert!((tree.predict_row(x.row(3)) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_depth_zero_is_single_leaf() {
        let x = array![[0.0], [1.0]];
        let (tree, _) = build(&x, &[1.0, -1.0], &[1.0, 1.0], params(0));
        assert_eq!(tree, TreeNode::Leaf { weight: 0.0 });
    }

    #[test]
    fn test_constant_feature_does_not_split() {
        let x = array![[5.0], [5.0], [5.0]];
        let (tree, _) = build(&x, &[1.0, -1.0, 1.0], &[1.0; 3], params(3));
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn test_min_child_weight_blocks_small_children() {
        let x = array![[0.0], [1.0], [2.0]];
        let grad = [5.0, -1.0, -1.0];
        let hess = [0.25; 3];
        let p = TreeParams {
            max_depth: 2,
            reg_lambda: 1.0,
            min_child_weight: 1.0,
        };
        let (tree, _) = build(&x, &grad, &hess, p);
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_respects_max_depth() {
        let x = Array2::from_shape_fn((16, 1), |(i, _)| i as f64);
        let grad: Vec<f64> = (0..16).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect();
        let hess = vec![1.0; 16];
        let (tree, _) = build(&x, &grad, &hess, params(3));
        assert!(tree.depth() <= 3);
    }
}
