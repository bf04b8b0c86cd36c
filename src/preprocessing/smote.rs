//! SMOTE oversampling as a recipe step

use super::{Stage, Step, Transform};
use crate::data::{Class, Dataset};
use crate::error::{FraudlabError, Result};
use ndarray::{Array2, ArrayView1};
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap};
use tracing::info;

/// Distance/index pair ordered by distance, then index
#[derive(Debug, Clone, Copy)]
struct DistIdx(f64, usize);

impl PartialEq for DistIdx {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for DistIdx {}
impl PartialOrd for DistIdx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for DistIdx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0).then(self.1.cmp(&other.1))
    }
}

/// Synthetic Minority Over-sampling. Every non-majority class is topped up to
/// `floor(max_count * over_ratio)` rows by interpolating between a class member
/// and one of its `neighbors` nearest same-class rows.
///
/// Runs only on the data the recipe is prepared on; baking new data leaves it untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmoteStep {
    pub neighbors: usize,
    pub over_ratio: f64,
    pub seed: u64,
}

impl SmoteStep {
    pub fn new() -> Self {
        Self {
            neighbors: 5,
            over_ratio: 1.0,
            seed: 42,
        }
    }

    pub fn with_neighbors(mut self, k: usize) -> Self {
        self.neighbors = k;
        self
    }

    pub fn with_over_ratio(mut self, ratio: f64) -> Self {
        self.over_ratio = ratio;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

impl Default for SmoteStep {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedSmote {
    pub neighbors: usize,
    pub seed: u64,
    /// Synthetic rows to generate per class
    pub n_synthetic: BTreeMap<Class, usize>,
}

impl Step for SmoteStep {
    type Params = FittedSmote;

    fn fit(&self, reference: &Dataset) -> Result<FittedSmote> {
        if self.neighbors == 0 {
            return Err(FraudlabError::invalid_parameter("neighbors", self.neighbors, "must be at least 1"));
        }
        if !(self.over_ratio > 0.0 && self.over_ratio <= 1.0) {
            return Err(FraudlabError::invalid_parameter("over_ratio", self.over_ratio, "must be in (0, 1]"));
        }
        if let Some(name) = reference.categorical_names().first() {
            return Err(FraudlabError::PreprocessingError(format!(
                "SMOTE needs all-numeric predictors; encode '{}' first",
                name
            )));
        }

        let counts = reference.class_counts();
        if counts.is_empty() {
            return Err(FraudlabError::ValidationError("SMOTE requires a labelled table".to_string()));
        }
        let max_count = counts.values().copied().max().unwrap_or(0);
        let goal = (max_count as f64 * self.over_ratio).floor() as usize;

        let mut n_synthetic = BTreeMap::new();
        for (&class, &count) in &counts {
            let needed = goal.saturating_sub(count);
            if needed == 0 {
                continue;
            }
            if count < 2 {
                return Err(FraudlabError::PreprocessingError(format!(
                    "class '{}' has {} row(s); SMOTE needs at least 2",
                    class, count
                )));
            }
            n_synthetic.insert(class, needed);
        }

        Ok(FittedSmote {
            neighbors: self.neighbors,
            seed: self.seed,
            n_synthetic,
        })
    }
}

fn distance(a: ArrayView1<f64>, b: ArrayView1<f64>) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum::<f64>()
}

/// Positions (within `members`) of the `k` nearest other members of `members[at]`
fn nearest(x: &Array2<f64>, members: &[usize], at: usize, k: usize) -> Vec<usize> {
    let point = x.row(members[at]);
    let mut heap: BinaryHeap<DistIdx> = BinaryHeap::with_capacity(k + 1);
    for (pos, &row) in members.iter().enumerate() {
        if pos == at {
            continue;
        }
        let candidate = DistIdx(distance(point, x.row(row)), pos);
        if heap.len() < k {
            heap.push(candidate);
        } else if heap.peek().map_or(false, |worst| candidate < *worst) {
            heap.pop();
            heap.push(candidate);
        }
    }
    heap.into_sorted_vec().into_iter().map(|DistIdx(_, pos)| pos).collect()
}

impl Transform for FittedSmote {
    fn apply(&self, data: Dataset, stage: Stage) -> Result<Dataset> {
        if stage == Stage::New || self.n_synthetic.is_empty() {
            return Ok(data);
        }

        let x = data.numeric_matrix()?;
        let groups = data.class_indices()?;
        let n_cols = x.ncols();
        let mut rng = ChaCha8Rng::seed_from_u64(self.seed);

        let total: usize = self.n_synthetic.values().sum();
        let mut rows = Vec::with_capacity(total * n_cols);
        let mut classes = Vec::with_capacity(total);

        for (&class, &n_new) in &self.n_synthetic {
            let members = groups.get(&class).map(Vec::as_slice).unwrap_or(&[]);
            if members.len() < 2 {
                return Err(FraudlabError::PreprocessingError(format!(
                    "class '{}' has {} row(s); SMOTE needs at least 2",
                    class,
                    members.len()
                )));
            }
            let k = self.neighbors.min(members.len() - 1);
            let neighbours: Vec<Vec<usize>> = (0..members.len())
                .into_par_iter()
                .map(|at| nearest(&x, members, at, k))
                .collect();

            for _ in 0..n_new {
                let at = rng.gen_range(0..members.len());
                let nb = neighbours[at][rng.gen_range(0..k)];
                let gap: f64 = rng.gen();
                let base = x.row(members[at]);
                let other = x.row(members[nb]);
                rows.extend(base.iter().zip(other.iter()).map(|(p, q)| p + gap * (q - p)));
                classes.push(class);
            }
        }

        let synthetic = Array2::from_shape_vec((classes.len(), n_cols), rows)?;
        let out = data.append_numeric_rows(&synthetic, &classes)?;
        info!(
            rows_in = data.n_rows(),
            synthetic = classes.len(),
            rows_out = out.n_rows(),
            "SMOTE oversampling"
        );
        Ok(out)
    }
}
