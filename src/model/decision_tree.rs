//! CART classification tree with cost-complexity pre-pruning

use crate::error::{FraudlabError, Result};
use ndarray::{Array1, Array2};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Decision tree node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Leaf with the positive-class fraction of its training rows
    Leaf { value: f64, n_samples: usize },
    /// Internal node; rows with `x[feature_idx] <= threshold` go left
    Split {
        feature_idx: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
        n_samples: usize,
        impurity: f64,
    },
}

/// Binary classification tree grown greedily on Gini impurity.
///
/// A split is kept only when its impurity decrease, weighted by the node's
/// share of the training rows and relative to the root impurity, reaches
/// `cost_complexity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: Option<TreeNode>,
    /// Maximum depth (root is depth 0)
    pub max_depth: usize,
    /// Minimum rows in a node for a split to be attempted
    pub min_samples_split: usize,
    /// Minimum rows in each child
    pub min_samples_leaf: usize,
    /// Complexity penalty
    pub cost_complexity: f64,
    n_features: usize,
    feature_importances: Option<Vec<f64>>,
}

impl Default for DecisionTree {
    fn default() -> Self {
        Self::new()
    }
}

fn gini(n: usize, positives: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = positives as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Best (threshold, gain) for one feature, scanning sorted values once
fn best_threshold(
    x: &Array2<f64>,
    y: &Array1<f64>,
    indices: &[usize],
    feature: usize,
    min_leaf: usize,
    parent_impurity: f64,
) -> Option<(f64, f64)> {
    let mut pairs: Vec<(f64, bool)> = indices.iter().map(|&i| (x[[i, feature]], y[i] > 0.5)).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let n = pairs.len();
    let total_pos = pairs.iter().filter(|p| p.1).count();
    let mut left_pos = 0usize;
    let mut best: Option<(f64, f64)> = None;

    for i in 0..n.saturating_sub(1) {
        if pairs[i].1 {
            left_pos += 1;
        }
        let (lo, hi) = (pairs[i].0, pairs[i + 1].0);
        if lo == hi {
            continue;
        }
        let left_n = i + 1;
        let right_n = n - left_n;
        if left_n < min_leaf || right_n < min_leaf {
            continue;
        }

        let weighted = (left_n as f64 * gini(left_n, left_pos)
            + right_n as f64 * gini(right_n, total_pos - left_pos))
            / n as f64;
        let gain = parent_impurity - weighted;
        if gain > best.map_or(0.0, |b| b.1) {
            let mid = lo + (hi - lo) / 2.0;
            let threshold = if mid < hi { mid } else { lo };
            best = Some((threshold, gain));
        }
    }
    best
}

impl DecisionTree {
    pub fn new() -> Self {
        Self {
            root: None,
            max_depth: 30,
            min_samples_split: 2,
            min_samples_leaf: 1,
            cost_complexity: 0.01,
            n_features: 0,
            feature_importances: None,
        }
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set minimum rows to split; the minimum leaf size follows as a third of it
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples.max(2);
        self.min_samples_leaf = ((min_samples as f64 / 3.0).round() as usize).max(1);
        self
    }

    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples.max(1);
        self
    }

    pub fn with_cost_complexity(mut self, cp: f64) -> Self {
        self.cost_complexity = cp;
        self
    }

    /// Fit on a design matrix and 0/1 targets
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(FraudlabError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(FraudlabError::TrainingError("cannot fit on an empty table".to_string()));
        }

        self.n_features = n_features;
        let positives = y.iter().filter(|&&v| v > 0.5).count();
        let root_scale = n_samples as f64 * gini(n_samples, positives);

        let mut importances = vec![0.0; n_features];
        let indices: Vec<usize> = (0..n_samples).collect();
        let root = self.build_tree(x, y, &indices, 0, root_scale, &mut importances);
        self.root = Some(root);

        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            for imp in &mut importances {
                *imp /= total;
            }
        }
        self.feature_importances = Some(importances);
        Ok(self)
    }

    fn build_tree(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        depth: usize,
        root_scale: f64,
        importances: &mut [f64],
    ) -> TreeNode {
        let n_samples = indices.len();
        let positives = indices.iter().filter(|&&i| y[i] > 0.5).count();
        let impurity = gini(n_samples, positives);
        let leaf = TreeNode::Leaf {
            value: positives as f64 / n_samples as f64,
            n_samples,
        };

        if n_samples < self.min_samples_split || depth >= self.max_depth || impurity == 0.0 {
            return leaf;
        }

        let Some((feature_idx, threshold, gain)) = self.find_best_split(x, y, indices, impurity) else {
            return leaf;
        };

        let improvement = n_samples as f64 * gain;
        if root_scale <= 0.0 || improvement / root_scale < self.cost_complexity {
            return leaf;
        }

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .partition(|&&i| x[[i, feature_idx]] <= threshold);

        importances[feature_idx] += improvement;

        let left = Box::new(self.build_tree(x, y, &left_indices, depth + 1, root_scale, importances));
        let right = Box::new(self.build_tree(x, y, &right_indices, depth + 1, root_scale, importances));

        TreeNode::Split {
            feature_idx,
            threshold,
            left,
            right,
            n_samples,
            impurity,
        }
    }

    /// Best split across features; ties go to the lowest feature index
    fn find_best_split(
        &self,
        x: &Array2<f64>,
        y: &Array1<f64>,
        indices: &[usize],
        parent_impurity: f64,
    ) -> Option<(usize, f64, f64)> {
        let per_feature: Vec<Option<(f64, f64)>> = (0..x.ncols())
            .into_par_iter()
            .map(|f| best_threshold(x, y, indices, f, self.min_samples_leaf, parent_impurity))
            .collect();

        let mut best: Option<(usize, f64, f64)> = None;
        for (f, candidate) in per_feature.into_iter().enumerate() {
            if let Some((threshold, gain)) = candidate {
                if best.map_or(true, |b| gain > b.2) {
                    best = Some((f, threshold, gain));
                }
            }
        }
        best
    }

    pub fn is_fitted(&self) -> bool {
        self.root.is_some()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let root = self.root.as_ref().ok_or(FraudlabError::ModelNotFitted)?;
        Ok((0..x.nrows())
            .map(|i| {
                let mut node = root;
                loop {
                    match node {
                        TreeNode::Leaf { value, .. } => break *value,
                        TreeNode::Split { feature_idx, threshold, left, right, .. } => {
                            node = if x[[i, *feature_idx]] <= *threshold { left.as_ref() } else { right.as_ref() };
                        }
                    }
                }
            })
            .collect())
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        self.feature_importances.as_deref()
    }

    pub(crate) fn clear_importances(&mut self) {
        self.feature_importances = None;
    }

    pub fn get_depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
            }
        }
        self.root.as_ref().map_or(0, depth)
    }

    pub fn get_n_leaves(&self) -> usize {
        fn leaves(node: &TreeNode) -> usize {
            match node {
                TreeNode::Leaf { .. } => 1,
                TreeNode::Split { left, right, .. } => leaves(left) + leaves(right),
            }
        }
        self.root.as_ref().map_or(0, leaves)
    }
}
