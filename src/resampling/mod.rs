//! V-fold cross-validation
//!
//! Folds are stratified by class. Each fold is an independent unit of work:
//! the recipe and the model are both refit on the fold's analysis rows, so no
//! assessment row ever influences the fit it is scored against.

use crate::data::{Class, Dataset};
use crate::error::{FraudlabError, Result};
use crate::metrics::{MetricEstimate, MetricKind, MetricSet};
use crate::utils::{stats, try_parallel_map, ParallelConfig};
use crate::workflow::{Predictions, Workflow};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};

/// One analysis/assessment partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fold {
    pub id: String,
    /// Rows the workflow is fitted on
    pub analysis: Vec<usize>,
    /// Held-out rows the fit is scored on
    pub assessment: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folds {
    pub folds: Vec<Fold>,
    pub seed: u64,
}

impl Folds {
    pub fn len(&self) -> usize {
        self.folds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folds.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fold> {
        self.folds.iter()
    }
}

pub(crate) fn fold_id(i: usize, width: usize) -> String {
    format!("Fold{:0width$}", i + 1, width = width)
}

/// Zero-padded id width for `n` items, at least two digits
pub(crate) fn id_width(n: usize) -> usize {
    n.to_string().len().max(2)
}

/// Stratified v-fold partition of `data`
///
/// Each class is shuffled on its own and dealt round-robin across the folds,
/// continuing from where the previous class stopped, so fold sizes differ by
/// at most one row.
pub fn vfold_cv(data: &Dataset, v: usize, seed: u64) -> Result<Folds> {
    if v < 2 {
        return Err(FraudlabError::invalid_parameter("v", v, "at least two folds are required"));
    }
    if v > data.n_rows() {
        return Err(FraudlabError::invalid_parameter(
            "v",
            v,
            format!("cannot exceed the number of rows ({})", data.n_rows()),
        ));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut assigned: Vec<Vec<usize>> = vec![Vec::new(); v];
    let mut next = 0usize;
    for (_, mut rows) in data.class_indices()? {
        rows.shuffle(&mut rng);
        for row in rows {
            assigned[next % v].push(row);
            next += 1;
        }
    }

    let width = id_width(v);
    let folds = assigned
        .into_iter()
        .enumerate()
        .map(|(i, mut assessment)| {
            assessment.sort_unstable();
            let mut held = vec![false; data.n_rows()];
            for &r in &assessment {
                held[r] = true;
            }
            let analysis = (0..data.n_rows()).filter(|&r| !held[r]).collect();
            Fold {
                id: fold_id(i, width),
                analysis,
                assessment,
            }
        })
        .collect();

    debug!(v, seed, rows = data.n_rows(), "Created stratified folds");
    Ok(Folds { folds, seed })
}

/// What to keep from each resample
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResampleControl {
    pub save_predictions: bool,
}

impl ResampleControl {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_predictions(mut self, save: bool) -> Self {
        self.save_predictions = save;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldResult {
    pub metrics: Vec<MetricEstimate>,
    /// Assessment-row predictions, ids relative to the resampled table
    pub predictions: Option<Predictions>,
}

/// Mean and spread of one metric across folds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: MetricKind,
    pub mean: Option<f64>,
    pub std_dev: Option<f64>,
    pub std_err: Option<f64>,
    /// Folds on which the metric was defined
    pub n: usize,
}

impl MetricSummary {
    pub(crate) fn from_values(metric: MetricKind, values: &[f64]) -> Self {
        let std_dev = stats::sample_std(values);
        Self {
            metric,
            mean: stats::mean(values),
            std_dev,
            std_err: std_dev.map(|s| s / (values.len() as f64).sqrt()),
            n: values.len(),
        }
    }
}

pub(crate) fn summarize<'a>(
    metrics: &MetricSet,
    folds: impl Iterator<Item = &'a FoldResult> + Clone,
) -> Vec<MetricSummary> {
    metrics
        .metrics()
        .iter()
        .map(|&metric| {
            let values: Vec<f64> = folds
                .clone()
                .filter_map(|f| crate::metrics::estimate_of(&f.metrics, metric))
                .collect();
            MetricSummary::from_values(metric, &values)
        })
        .collect()
}

/// Per-fold results of one workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleResult {
    pub metric_set: MetricSet,
    pub folds: BTreeMap<String, FoldResult>,
}

impl ResampleResult {
    pub fn collect_metrics(&self) -> Vec<MetricSummary> {
        summarize(&self.metric_set, self.folds.values())
    }

    pub fn summary(&self, metric: MetricKind) -> Option<MetricSummary> {
        self.collect_metrics().into_iter().find(|s| s.metric == metric)
    }

    /// Out-of-fold predictions of every saved fold, tagged with the fold id
    pub fn collect_predictions(&self) -> Vec<(String, Predictions)> {
        self.folds
            .iter()
            .filter_map(|(id, f)| f.predictions.clone().map(|p| (id.clone(), p)))
            .collect()
    }
}

/// Fit on a fold's analysis rows and score its assessment rows
pub(crate) fn evaluate_fold(
    workflow: &Workflow,
    data: &Dataset,
    fold: &Fold,
    metrics: &MetricSet,
    control: &ResampleControl,
) -> Result<FoldResult> {
    let fitted = workflow.fit(&data.take(&fold.analysis)?)?;
    let predictions = fitted
        .predict(&data.take(&fold.assessment)?)?
        .with_row_ids(&fold.assessment);
    let estimates = predictions.evaluate(metrics)?;
    debug!(fold = %fold.id, "Resample finished");

    Ok(FoldResult {
        metrics: estimates,
        predictions: control.save_predictions.then_some(predictions),
    })
}

/// Resampled performance of a fixed workflow
pub fn fit_resamples(
    workflow: &Workflow,
    data: &Dataset,
    folds: &Folds,
    metrics: &MetricSet,
    control: &ResampleControl,
    parallel: &ParallelConfig,
) -> Result<ResampleResult> {
    if !workflow.model().is_finalized() {
        return Err(FraudlabError::TuningError(
            "workflow has parameters marked for tuning; use tune_grid".to_string(),
        ));
    }

    let units: Vec<&Fold> = folds.iter().collect();
    let results = try_parallel_map(units, parallel, |fold| {
        evaluate_fold(workflow, data, fold, metrics, control).map(|r| (fold.id.clone(), r))
    })?;

    info!(model = %workflow.model().describe(), folds = folds.len(), "Resampling complete");

    Ok(ResampleResult {
        metric_set: metrics.clone(),
        folds: results.into_iter().collect(),
    })
}

/// Count rows per class in each fold's assessment set
pub fn fold_class_counts(data: &Dataset, folds: &Folds) -> Result<BTreeMap<String, BTreeMap<Class, usize>>> {
    let labels = data.labels()?;
    Ok(folds
        .iter()
        .map(|f| {
            let mut counts = BTreeMap::new();
            for &r in &f.assessment {
                *counts.entry(labels[r]).or_insert(0) += 1;
            }
            (f.id.clone(), counts)
        })
        .collect())
}
