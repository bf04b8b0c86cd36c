//! Grid-search hyperparameter tuning
//!
//! Every candidate in a [`TuningGrid`] is resampled over the same folds. The
//! (candidate, fold) pairs are independent units and run through the shared
//! worker pool; results are regrouped per candidate afterwards.

mod grid;

pub use grid::{ParamConfig, ParamRange, Scale, TuningGrid};

use crate::data::Dataset;
use crate::error::{FraudlabError, Result};
use crate::metrics::{Direction, MetricKind, MetricSet};
use crate::resampling::{evaluate_fold, summarize, Fold, FoldResult, Folds, MetricSummary, ResampleControl};
use crate::utils::{try_parallel_map, ParallelConfig};
use crate::workflow::Workflow;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// How `select_with` chooses among candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionPolicy {
    /// Best mean
    #[default]
    Best,
    /// Simplest among candidates tied with the best mean
    Simplest,
    /// Simplest within one standard error of the best mean
    OneStdErr,
}

/// Resampling results of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    pub config: ParamConfig,
    pub folds: BTreeMap<String, FoldResult>,
}

/// One metric summary of one candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneMetric {
    pub config: ParamConfig,
    pub summary: MetricSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuneResult {
    pub metric_set: MetricSet,
    pub candidates: Vec<CandidateResult>,
}

/// `Less` when `a` is the simpler configuration
fn simplicity(a: &ParamConfig, b: &ParamConfig) -> Ordering {
    for (&param, &va) in &a.values {
        let Some(vb) = b.get(param) else { continue };
        let ord = if param.larger_is_simpler() {
            vb.total_cmp(&va)
        } else {
            va.total_cmp(&vb)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

fn rank(direction: Direction, a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match direction {
            Direction::Maximize => y.total_cmp(&x),
            Direction::Minimize => x.total_cmp(&y),
        },
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

impl TuneResult {
    pub fn summaries(&self, candidate: &CandidateResult) -> Vec<MetricSummary> {
        summarize(&self.metric_set, candidate.folds.values())
    }

    /// Every candidate's summary of every metric, in grid order
    pub fn collect_metrics(&self) -> Vec<TuneMetric> {
        self.candidates
            .iter()
            .flat_map(|c| {
                self.summaries(c).into_iter().map(move |summary| TuneMetric {
                    config: c.config.clone(),
                    summary,
                })
            })
            .collect()
    }

    /// Summary of `metric` for the candidate with id `config_id`
    pub fn summary(&self, config_id: &str, metric: MetricKind) -> Option<MetricSummary> {
        let candidate = self.candidates.iter().find(|c| c.config.id == config_id)?;
        self.summaries(candidate).into_iter().find(|s| s.metric == metric)
    }

    fn ranked(&self, metric: MetricKind) -> Result<Vec<TuneMetric>> {
        if !self.metric_set.contains(metric) {
            return Err(FraudlabError::TuningError(format!(
                "metric '{}' was not computed during tuning",
                metric
            )));
        }
        let mut rows: Vec<TuneMetric> = self
            .collect_metrics()
            .into_iter()
            .filter(|m| m.summary.metric == metric)
            .collect();
        rows.sort_by(|a, b| rank(metric.direction(), a.summary.mean, b.summary.mean));
        Ok(rows)
    }

    /// Top `n` candidates by mean `metric`; undefined means rank last
    pub fn show_best(&self, metric: MetricKind, n: usize) -> Result<Vec<TuneMetric>> {
        let mut rows = self.ranked(metric)?;
        rows.truncate(n);
        Ok(rows)
    }

    pub fn select_best(&self, metric: MetricKind) -> Result<ParamConfig> {
        self.select_with(metric, SelectionPolicy::Best)
    }

    pub fn select_with(&self, metric: MetricKind, policy: SelectionPolicy) -> Result<ParamConfig> {
        let ranked = self.ranked(metric)?;
        let best = ranked
            .first()
            .filter(|m| m.summary.mean.is_some())
            .ok_or_else(|| {
                FraudlabError::TuningError(format!("'{}' is undefined for every candidate", metric))
            })?;
        let best_mean = best.summary.mean.unwrap_or_default();

        let bound = match policy {
            SelectionPolicy::Best => return Ok(best.config.clone()),
            SelectionPolicy::Simplest => best_mean,
            SelectionPolicy::OneStdErr => {
                let se = best.summary.std_err.unwrap_or(0.0);
                match metric.direction() {
                    Direction::Maximize => best_mean - se,
                    Direction::Minimize => best_mean + se,
                }
            }
        };
        let eligible = |mean: f64| match metric.direction() {
            Direction::Maximize => mean >= bound - 1e-12,
            Direction::Minimize => mean <= bound + 1e-12,
        };

        let chosen = ranked
            .iter()
            .filter(|m| m.summary.mean.is_some_and(|v| eligible(v)))
            .min_by(|a, b| simplicity(&a.config, &b.config))
            .unwrap_or(best);
        Ok(chosen.config.clone())
    }
}

/// Lock the chosen configuration into the workflow's model
pub fn finalize_workflow(workflow: &Workflow, config: &ParamConfig) -> Result<Workflow> {
    workflow.finalize(config)
}

/// Resample every grid candidate over `folds`
pub fn tune_grid(
    workflow: &Workflow,
    data: &Dataset,
    folds: &Folds,
    grid: &TuningGrid,
    metrics: &MetricSet,
    control: &ResampleControl,
    parallel: &ParallelConfig,
) -> Result<TuneResult> {
    let tunable = workflow.model().tunable();
    if tunable.is_empty() {
        return Err(FraudlabError::TuningError(
            "workflow has no parameters marked for tuning".to_string(),
        ));
    }
    if grid.params() != tunable {
        return Err(FraudlabError::TuningError(format!(
            "grid sets {:?} but the workflow tunes {:?}",
            grid.params().iter().map(|p| p.name()).collect::<Vec<_>>(),
            tunable.iter().map(|p| p.name()).collect::<Vec<_>>()
        )));
    }
    if folds.is_empty() {
        return Err(FraudlabError::TuningError("no folds to resample".to_string()));
    }

    let candidates: Vec<Workflow> = grid
        .configs()
        .iter()
        .map(|c| workflow.finalize(c))
        .collect::<Result<_>>()?;

    let units: Vec<(usize, &Workflow, &Fold)> = candidates
        .iter()
        .enumerate()
        .flat_map(|(ci, wf)| folds.iter().map(move |fold| (ci, wf, fold)))
        .collect();
    info!(
        candidates = grid.len(),
        folds = folds.len(),
        units = units.len(),
        "Tuning {}",
        workflow.model().family
    );

    let results = try_parallel_map(units, parallel, |(ci, wf, fold)| {
        let result = evaluate_fold(wf, data, fold, metrics, control)?;
        debug!(candidate = %grid.configs()[ci].id, fold = %fold.id, "Candidate resample finished");
        Ok((ci, fold.id.clone(), result))
    })?;

    let mut grouped: Vec<CandidateResult> = grid
        .configs()
        .iter()
        .map(|c| CandidateResult {
            config: c.clone(),
            folds: BTreeMap::new(),
        })
        .collect();
    for (ci, fold_id, result) in results {
        grouped[ci].folds.insert(fold_id, result);
    }

    Ok(TuneResult {
        metric_set: metrics.clone(),
        candidates: grouped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Class, Feature, Target};
    use crate::metrics::MetricEstimate;
    use crate::model::{HyperParam, ModelSpec};
    use crate::preprocessing::Recipe;
    use crate::resampling::vfold_cv;

    fn fold(values: &[Option<f64>]) -> BTreeMap<String, FoldResult> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| {
                (
                    format!("Fold{:02}", i + 1),
                    FoldResult {
                        metrics: vec![MetricEstimate {
                            metric: MetricKind::RocAuc,
                            estimate: v,
                        }],
                        predictions: None,
                    },
                )
            })
            .collect()
    }

    fn manual_result() -> TuneResult {
        let cfg = |id: &str, cp: f64| ParamConfig::new(id, [(HyperParam::CostComplexity, cp)]);
        TuneResult {
            metric_set: MetricSet::new(vec![MetricKind::RocAuc]),
            candidates: vec![
                CandidateResult {
                    config: cfg("Model1", 0.001),
                    folds: fold(&[Some(0.75), Some(0.875)]),
                },
                CandidateResult {
                    config: cfg("Model2", 0.01),
                    folds: fold(&[Some(0.5), Some(0.625)]),
                },
                CandidateResult {
                    config: cfg("Model3", 0.1),
                    folds: fold(&[Some(0.8125), Some(0.8125)]),
                },
                CandidateResult {
                    config: cfg("Model4", 0.5),
                    folds: fold(&[Some(0.75), Some(0.8125)]),
                },
                CandidateResult {
                    config: cfg("Model5", 0.9),
                    folds: fold(&[None, None]),
                },
            ],
        }
    }

    #[test]
    fn test_select_best_and_show_best() {
        let result = manual_result();
        let shown = result.show_best(MetricKind::RocAuc, 10).unwrap();
        let ids: Vec<&str> = shown.iter().map(|m| m.config.id.as_str()).collect();
        assert_eq!(ids, vec!["Model1", "Model3", "Model4", "Model2", "Model5"]);
        assert!(shown[4].summary.mean.is_none());

        assert_eq!(result.select_best(MetricKind::RocAuc).unwrap().id, "Model1");
        assert_eq!(result.show_best(MetricKind::RocAuc, 2).unwrap().len(), 2);
    }

    #[test]
    fn test_selection_policies() {
        let result = manual_result();
        // Model1 and Model3 tie on the mean; the larger cost_complexity is simpler
        assert_eq!(
            result.select_with(MetricKind::RocAuc, SelectionPolicy::Simplest).unwrap().id,
            "Model3"
        );
        // Model4 (mean 0.78125) is within one standard error (0.0625) of 0.8125
        let one_se = result.select_with(MetricKind::RocAuc, SelectionPolicy::OneStdErr).unwrap();
        assert_eq!(one_se.id, "Model4");
    }

    #[test]
    fn test_metric_not_computed() {
        let result = manual_result();
        assert!(matches!(
            result.select_best(MetricKind::Accuracy),
            Err(FraudlabError::TuningError(_))
        ));
    }

    fn data() -> Dataset {
        let n = 120;
        let x: Vec<f64> = (0..n).map(|i| (i % 40) as f64).collect();
        let z: Vec<f64> = (0..n).map(|i| ((i * 13) % 7) as f64).collect();
        let y = (0..n)
            .map(|i| if i % 40 >= 30 { Class::Positive } else { Class::Negative })
            .collect();
        Dataset::new(
            vec![Feature::numeric("x", x), Feature::numeric("z", z)],
            Some(Target::new("y", y)),
        )
        .unwrap()
    }

    #[test]
    fn test_tune_grid_end_to_end() {
        let d = data();
        let folds = vfold_cv(&d, 3, 5).unwrap();
        let spec = ModelSpec::decision_tree().tune(HyperParam::TreeDepth).unwrap();
        let wf = Workflow::new(Recipe::new(), spec);
        let grid = TuningGrid::regular(&[ParamRange::linear(HyperParam::TreeDepth, 1.0, 4.0)], 4).unwrap();
        let metrics = MetricSet::classification();

        let result = tune_grid(
            &wf,
            &d,
            &folds,
            &grid,
            &metrics,
            &ResampleControl::new(),
            &ParallelConfig::new().with_threads(2),
        )
        .unwrap();
        assert_eq!(result.candidates.len(), 4);
        assert!(result.candidates.iter().all(|c| c.folds.len() == 3));
        assert_eq!(result.collect_metrics().len(), 4 * 7);

        let best = result.select_best(MetricKind::Accuracy).unwrap();
        let best_mean = result.summary(&best.id, MetricKind::Accuracy).unwrap().mean.unwrap();
        for c in &result.candidates {
            let mean = result.summary(&c.config.id, MetricKind::Accuracy).unwrap().mean.unwrap();
            assert!(best_mean >= mean);
        }

        let final_wf = finalize_workflow(&wf, &best).unwrap();
        assert!(final_wf.model().is_finalized());
    }

    #[test]
    fn test_grid_must_match_tunable_params() {
        let d = data();
        let folds = vfold_cv(&d, 3, 5).unwrap();
        let spec = ModelSpec::decision_tree().tune(HyperParam::TreeDepth).unwrap();
        let wf = Workflow::new(Recipe::new(), spec);
        let grid = TuningGrid::regular(&[HyperParam::MinN.default_range()], 2).unwrap();
        let err = tune_grid(
            &wf,
            &d,
            &folds,
            &grid,
            &MetricSet::classification(),
            &ResampleControl::new(),
            &ParallelConfig::sequential(),
        )
        .unwrap_err();
        assert!(matches!(err, FraudlabError::TuningError(_)));
    }
}
