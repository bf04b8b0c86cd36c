//! Stratified train/test splitting

use super::Dataset;
use crate::error::{FraudlabError, Result};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Disjoint training and test row indices over one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Split {
    /// Sorted training rows
    pub train_indices: Vec<usize>,
    /// Sorted held-out rows
    pub test_indices: Vec<usize>,
    /// Requested training proportion
    pub prop: f64,
    pub seed: u64,
}

impl Split {
    pub fn training(&self, data: &Dataset) -> Result<Dataset> {
        data.take(&self.train_indices)
    }

    pub fn testing(&self, data: &Dataset) -> Result<Dataset> {
        data.take(&self.test_indices)
    }

    pub fn n_train(&self) -> usize {
        self.train_indices.len()
    }

    pub fn n_test(&self) -> usize {
        self.test_indices.len()
    }
}

/// Split `data` into training and test rows, stratified on the target.
///
/// Each class is shuffled independently and `round(prop * n_class)` of its rows
/// go to training. Deterministic for a given seed.
pub fn initial_split(data: &Dataset, prop: f64, seed: u64) -> Result<Split> {
    if !(prop > 0.0 && prop < 1.0) {
        return Err(FraudlabError::invalid_parameter("prop", prop, "must lie strictly between 0 and 1"));
    }

    let groups = data.class_indices()?;
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train_indices = Vec::with_capacity(data.n_rows());
    let mut test_indices = Vec::with_capacity(data.n_rows());

    for (class, mut indices) in groups {
        let n = indices.len();
        let n_train = (prop * n as f64).round() as usize;
        if n_train == 0 || n_train == n {
            return Err(FraudlabError::DegenerateSplit {
                class: class.to_string(),
                count: n,
            });
        }
        indices.shuffle(&mut rng);
        train_indices.extend_from_slice(&indices[..n_train]);
        test_indices.extend_from_slice(&indices[n_train..]);
    }

    train_indices.sort_unstable();
    test_indices.sort_unstable();

    info!(train = train_indices.len(), test = test_indices.len(), prop, seed, "Initial split");

    Ok(Split {
        train_indices,
        test_indices,
        prop,
        seed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Class, Feature, Target};

    fn imbalanced(n_neg: usize, n_pos: usize) -> Dataset {
        let n = n_neg + n_pos;
        let classes = (0..n)
            .map(|i| if i < n_pos { Class::Positive } else { Class::Negative })
            .collect();
        Dataset::new(
            vec![Feature::numeric("x", (0..n).map(|i| i as f64).collect())],
            Some(Target::new("y", classes)),
        )
        .unwrap()
    }

    #[test]
    fn test_split_partitions_rows() {
        let data = imbalanced(90, 10);
        let split = initial_split(&data, 0.75, 42).unwrap();

        let mut all: Vec<usize> = split.train_indices.iter().chain(&split.test_indices).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
        assert_eq!(split.n_train(), 68 + 8);
    }

    #[test]
    fn test_split_preserves_class_balance() {
        let data = imbalanced(300, 37);
        let split = initial_split(&data, 0.75, 7).unwrap();
        let train = split.training(&data).unwrap().class_counts();
        let test = split.testing(&data).unwrap().class_counts();

        let expected_pos = 0.75 * 37.0;
        assert!((train[&Class::Positive] as f64 - expected_pos).abs() <= 1.0);
        assert_eq!(train[&Class::Positive] + test[&Class::Positive], 37);
    }

    #[test]
    fn test_split_against_smaller_table_fails() {
        let data = imbalanced(300, 37);
        let split = initial_split(&data, 0.75, 7).unwrap();
        let smaller = imbalanced(100, 10);
        assert!(split.training(&smaller).is_err());
        assert!(split.testing(&smaller).is_err());
    }

    #[test]
    fn test_split_is_deterministic() {
        let data = imbalanced(50, 20);
        let a = initial_split(&data, 0.6, 3).unwrap();
        let b = initial_split(&data, 0.6, 3).unwrap();
        let c = initial_split(&data, 0.6, 4).unwrap();
        assert_eq!(a, b);
        assert_ne!(a.train_indices, c.train_indices);
    }

    #[test]
    fn test_degenerate_split() {
        let data = imbalanced(20, 1);
        let err = initial_split(&data, 0.75, 1).unwrap_err();
        assert!(matches!(err, FraudlabError::DegenerateSplit { count: 1, .. }));
    }

    #[test]
    fn test_invalid_prop() {
        let data = imbalanced(10, 10);
        assert!(initial_split(&data, 1.0, 1).is_err());
        assert!(initial_split(&data, 0.0, 1).is_err());
    }
}
