//! End-to-end fraud model experiment
//!
//! Load, split, resample a logistic baseline, tune a decision tree, keep the
//! better of the two, refit it on the full training set, score it on the
//! held-out rows and write the model and metrics.

use crate::config::{ExperimentConfig, GridKind};
use crate::data::{initial_split, Class};
use crate::error::Result;
use crate::export::{export_workflow, write_metrics_csv, MetricRow, ModelMetadata};
use crate::metrics::{MetricEstimate, MetricKind, MetricSet};
use crate::model::{HyperParam, ModelFamily, ModelSpec};
use crate::preprocessing::Recipe;
use crate::resampling::{fit_resamples, vfold_cv, MetricSummary, ResampleControl};
use crate::tuning::{finalize_workflow, tune_grid, ParamConfig, TuningGrid};
use crate::workflow::{last_fit, FittedWorkflow, Workflow};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

const TREE_PARAMS: [HyperParam; 3] = [HyperParam::CostComplexity, HyperParam::TreeDepth, HyperParam::MinN];

/// Resampled performance of one model candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateReport {
    pub family: ModelFamily,
    /// Tuned values, when the candidate came out of a grid search
    pub config: Option<ParamConfig>,
    pub description: String,
    pub summaries: Vec<MetricSummary>,
}

impl CandidateReport {
    pub fn summary(&self, metric: MetricKind) -> Option<&MetricSummary> {
        self.summaries.iter().find(|s| s.metric == metric)
    }

    pub fn mean(&self, metric: MetricKind) -> Option<f64> {
        self.summary(metric).and_then(|s| s.mean)
    }
}

#[derive(Debug, Clone)]
pub struct ExperimentReport {
    pub n_rows: usize,
    pub n_train: usize,
    pub n_test: usize,
    pub class_counts: BTreeMap<Class, usize>,
    pub baseline: CandidateReport,
    pub tuned: CandidateReport,
    pub tuning_candidates: usize,
    pub selection_metric: MetricKind,
    pub chosen: ModelFamily,
    pub test_metrics: Vec<MetricEstimate>,
    pub workflow: FittedWorkflow,
    pub model_path: PathBuf,
    pub metrics_path: PathBuf,
    pub elapsed_secs: f64,
}

impl ExperimentReport {
    pub fn chosen_report(&self) -> &CandidateReport {
        if self.chosen == self.baseline.family {
            &self.baseline
        } else {
            &self.tuned
        }
    }
}

fn tree_grid(config: &ExperimentConfig) -> Result<TuningGrid> {
    let ranges: Vec<_> = TREE_PARAMS.iter().map(|p| p.default_range()).collect();
    match config.tuning.grid {
        GridKind::Regular => TuningGrid::regular(&ranges, config.tuning.levels),
        GridKind::Random => TuningGrid::random(&ranges, config.tuning.random_size, config.tuning.grid_seed),
    }
}

/// Run the whole experiment described by `config`
pub fn run_experiment(config: &ExperimentConfig) -> Result<ExperimentReport> {
    config.validate()?;
    let start = Instant::now();
    let metric = config.tuning.metric;
    let metrics = MetricSet::classification();
    let control = ResampleControl::new().with_save_predictions(config.resample.save_predictions);

    let data = config.data.loader().load_csv(&config.data.path)?;
    let split = initial_split(&data, config.split.prop, config.split.seed)?;
    let training = split.training(&data)?;
    let folds = vfold_cv(&training, config.resample.folds, config.resample.seed)?;
    let recipe = Recipe::from_config(&config.recipe);

    let baseline_wf = Workflow::new(recipe.clone(), ModelSpec::logistic_reg());
    let baseline_res = fit_resamples(&baseline_wf, &training, &folds, &metrics, &control, &config.parallel)?;
    let baseline = CandidateReport {
        family: ModelFamily::LogisticRegression,
        config: None,
        description: baseline_wf.model().describe(),
        summaries: baseline_res.collect_metrics(),
    };

    let mut tree_spec = ModelSpec::decision_tree();
    for p in TREE_PARAMS {
        tree_spec = tree_spec.tune(p)?;
    }
    let tree_wf = Workflow::new(recipe, tree_spec);
    let grid = tree_grid(config)?;
    let tuned_res = tune_grid(&tree_wf, &training, &folds, &grid, &metrics, &control, &config.parallel)?;
    let best = tuned_res.select_with(metric, config.tuning.policy)?;
    let final_tree = finalize_workflow(&tree_wf, &best)?;
    let tuned = CandidateReport {
        family: ModelFamily::DecisionTree,
        description: final_tree.model().describe(),
        summaries: tuned_res
            .candidates
            .iter()
            .find(|c| c.config.id == best.id)
            .map(|c| tuned_res.summaries(c))
            .unwrap_or_default(),
        config: Some(best),
    };
    info!(
        config = %tuned.config.as_ref().map(|c| c.to_string()).unwrap_or_default(),
        metric = %metric,
        "Selected decision tree configuration"
    );

    // The baseline is kept only when strictly better
    let baseline_better = compare_candidates(metric, &baseline, &tuned) == Ordering::Less;
    let (chosen, chosen_wf) = if baseline_better {
        (ModelFamily::LogisticRegression, baseline_wf)
    } else {
        (ModelFamily::DecisionTree, final_tree)
    };
    info!(model = %chosen, "Chosen model family");

    let last = last_fit(&chosen_wf, &data, &split, &metrics)?;

    let mut metadata = ModelMetadata::for_workflow("fraud_model", &last.workflow)
        .add_extra("selection_metric", metric.name());
    for m in &last.metrics {
        if let Some(v) = m.estimate {
            metadata = metadata.add_metric(m.metric.name(), v);
        }
    }
    let exported = if config.output.reduce {
        last.workflow.reduce()
    } else {
        last.workflow.clone()
    };
    export_workflow(&exported, &config.output.model_path, &metadata, config.output.format)?;

    let mut rows: Vec<MetricRow> = Vec::new();
    for report in [&baseline, &tuned] {
        let source = format!("resample:{}", report.family.name());
        rows.extend(report.summaries.iter().map(|s| MetricRow::from_summary(s, source.clone())));
    }
    let test_source = format!("test:{}", chosen.name());
    rows.extend(
        last.metrics
            .iter()
            .map(|m| MetricRow::from_estimate(m, split.n_test(), test_source.clone())),
    );
    write_metrics_csv(&rows, &config.output.metrics_path)?;

    let elapsed_secs = start.elapsed().as_secs_f64();
    info!(elapsed_secs, "Experiment finished");

    Ok(ExperimentReport {
        n_rows: data.n_rows(),
        n_train: split.n_train(),
        n_test: split.n_test(),
        class_counts: data.class_counts(),
        baseline,
        tuned,
        tuning_candidates: grid.len(),
        selection_metric: metric,
        chosen,
        test_metrics: last.metrics,
        workflow: exported,
        model_path: config.output.model_path.clone(),
        metrics_path: config.output.metrics_path.clone(),
        elapsed_secs,
    })
}

/// Order two candidates by `metric`, undefined last
pub fn compare_candidates(metric: MetricKind, a: &CandidateReport, b: &CandidateReport) -> Ordering {
    match (a.mean(metric), b.mean(metric)) {
        (Some(x), Some(y)) if metric.direction().better(x, y) => Ordering::Less,
        (Some(x), Some(y)) if metric.direction().better(y, x) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}
