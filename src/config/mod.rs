//! Experiment configuration
//!
//! Every section has defaults, so a config file only needs the fields it
//! changes. Files are JSON.

use crate::data::{ColumnKind, DatasetLoader};
use crate::error::{FraudlabError, Result};
use crate::export::SerializationFormat;
use crate::metrics::MetricKind;
use crate::preprocessing::UnseenPolicy;
use crate::tuning::SelectionPolicy;
use crate::utils::ParallelConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the transactions come from and how to read them
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub path: PathBuf,
    pub target: String,
    /// Raw target value of the fraud class
    pub positive_label: String,
    /// Identifier columns removed at load time
    pub drop_columns: Vec<String>,
    /// Expected predictor columns; empty disables the check
    pub expected_schema: Vec<(String, ColumnKind)>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/transactions.csv"),
            target: "isFraud".to_string(),
            positive_label: "1".to_string(),
            drop_columns: vec![
                "nameOrig".to_string(),
                "nameDest".to_string(),
                "isFlaggedFraud".to_string(),
            ],
            expected_schema: Vec::new(),
        }
    }
}

impl DataConfig {
    pub fn loader(&self) -> DatasetLoader {
        let loader = DatasetLoader::new(self.target.clone())
            .with_positive_label(self.positive_label.clone())
            .drop_columns(self.drop_columns.iter().cloned());
        if self.expected_schema.is_empty() {
            loader
        } else {
            loader.expect_schema(self.expected_schema.clone())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Share of rows used for training
    pub prop: f64,
    pub seed: u64,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { prop: 0.75, seed: 42 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResampleConfig {
    pub folds: usize,
    pub seed: u64,
    pub save_predictions: bool,
}

impl Default for ResampleConfig {
    fn default() -> Self {
        Self {
            folds: 5,
            seed: 42,
            save_predictions: false,
        }
    }
}

/// Parameters of the standard preprocessing recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecipeConfig {
    pub corr_threshold: f64,
    pub log_base: f64,
    pub log_offset: f64,
    pub one_hot: bool,
    pub unseen: UnseenPolicy,
    pub smote: bool,
    pub smote_neighbors: usize,
    pub smote_over_ratio: f64,
    pub smote_seed: u64,
}

impl Default for RecipeConfig {
    fn default() -> Self {
        Self {
            corr_threshold: 0.9,
            log_base: 10.0,
            log_offset: 1.0,
            one_hot: true,
            unseen: UnseenPolicy::AllZero,
            smote: true,
            smote_neighbors: 5,
            smote_over_ratio: 1.0,
            smote_seed: 42,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GridKind {
    #[default]
    Regular,
    Random,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TuningConfig {
    pub grid: GridKind,
    /// Levels per parameter of a regular grid
    pub levels: usize,
    /// Candidates drawn for a random grid
    pub random_size: usize,
    pub grid_seed: u64,
    pub metric: MetricKind,
    pub policy: SelectionPolicy,
}

impl Default for TuningConfig {
    fn default() -> Self {
        Self {
            grid: GridKind::Regular,
            levels: 3,
            random_size: 10,
            grid_seed: 42,
            metric: MetricKind::RocAuc,
            policy: SelectionPolicy::Best,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub format: SerializationFormat,
    /// Strip training-only diagnostics from the exported model
    pub reduce: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("output/fraud_model.bin"),
            metrics_path: PathBuf::from("output/metrics.csv"),
            format: SerializationFormat::Binary,
            reduce: false,
        }
    }
}

/// Complete configuration of a training run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub data: DataConfig,
    pub split: SplitConfig,
    pub resample: ResampleConfig,
    pub recipe: RecipeConfig,
    pub tuning: TuningConfig,
    pub output: OutputConfig,
    pub parallel: ParallelConfig,
}

impl ExperimentConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| FraudlabError::ConfigError(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn with_data_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.data.path = path.into();
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.data.target = target.into();
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.split.seed = seed;
        self.resample.seed = seed;
        self.recipe.smote_seed = seed;
        self.tuning.grid_seed = seed;
        self
    }

    pub fn with_folds(mut self, folds: usize) -> Self {
        self.resample.folds = folds;
        self
    }

    pub fn with_threads(mut self, n: usize) -> Self {
        self.parallel = self.parallel.with_threads(n);
        self
    }

    pub fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.model_path = path.into();
        self
    }

    pub fn with_metrics_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.output.metrics_path = path.into();
        self
    }

    pub fn with_reduce(mut self, reduce: bool) -> Self {
        self.output.reduce = reduce;
        self
    }

    pub fn with_recipe(mut self, recipe: RecipeConfig) -> Self {
        self.recipe = recipe;
        self
    }

    pub fn with_tuning(mut self, tuning: TuningConfig) -> Self {
        self.tuning = tuning;
        self
    }

    /// Reject out-of-range values before any work starts
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: String| Err(FraudlabError::ConfigError(msg));

        if self.data.target.is_empty() {
            return fail("data.target must not be empty".to_string());
        }
        if !(self.split.prop > 0.0 && self.split.prop < 1.0) {
            return fail(format!("split.prop must be in (0, 1), got {}", self.split.prop));
        }
        if self.resample.folds < 2 {
            return fail(format!("resample.folds must be at least 2, got {}", self.resample.folds));
        }
        let r = &self.recipe;
        if !(r.corr_threshold > 0.0 && r.corr_threshold <= 1.0) {
            return fail(format!("recipe.corr_threshold must be in (0, 1], got {}", r.corr_threshold));
        }
        if !(r.log_base > 0.0) || r.log_base == 1.0 {
            return fail(format!("recipe.log_base must be positive and not 1, got {}", r.log_base));
        }
        if !r.log_offset.is_finite() {
            return fail("recipe.log_offset must be finite".to_string());
        }
        if !r.one_hot && r.unseen == UnseenPolicy::AllZero {
            return fail("the all-zero unseen policy needs one-hot encoding".to_string());
        }
        if r.smote && (r.smote_neighbors == 0 || !(r.smote_over_ratio > 0.0 && r.smote_over_ratio <= 1.0)) {
            return fail(format!(
                "recipe.smote_neighbors must be positive and recipe.smote_over_ratio in (0, 1], got {} and {}",
                r.smote_neighbors, r.smote_over_ratio
            ));
        }
        let t = &self.tuning;
        if t.levels == 0 || t.random_size == 0 {
            return fail("tuning.levels and tuning.random_size must be positive".to_string());
        }
        if self.parallel.n_threads == Some(0) {
            return fail("parallel.n_threads must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ExperimentConfig::default();
        config.validate().unwrap();
        assert_eq!(config.split.prop, 0.75);
        assert_eq!(config.resample.folds, 5);
        assert_eq!(config.recipe.corr_threshold, 0.9);
        assert_eq!(config.tuning.metric, MetricKind::RocAuc);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "split": { "prop": 0.8 }, "tuning": { "grid": "random", "policy": "one_std_err" } }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.split.prop, 0.8);
        assert_eq!(config.split.seed, 42);
        assert_eq!(config.tuning.grid, GridKind::Random);
        assert_eq!(config.tuning.policy, SelectionPolicy::OneStdErr);
        assert_eq!(config.data.target, "isFraud");
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        let config = ExperimentConfig::new().with_folds(3).with_seed(7).with_threads(2);
        config.to_file(&path).unwrap();
        assert_eq!(ExperimentConfig::from_file(&path).unwrap(), config);
    }

    #[test]
    fn test_validate_rejects_out_of_range() {
        let mut config = ExperimentConfig::new();
        config.split.prop = 1.0;
        assert!(matches!(config.validate(), Err(FraudlabError::ConfigError(_))));

        assert!(ExperimentConfig::new().with_folds(1).validate().is_err());

        let mut config = ExperimentConfig::new();
        config.recipe.corr_threshold = 0.0;
        assert!(config.validate().is_err());

        let mut config = ExperimentConfig::new();
        config.recipe.one_hot = false;
        assert!(config.validate().is_err());
    }
}
