//! Integration test: grid search over decision tree hyperparameters

mod common;

use common::transactions_dataset;
use fraudlab::config::RecipeConfig;
use fraudlab::metrics::{MetricKind, MetricSet};
use fraudlab::model::{HyperParam, ModelSpec};
use fraudlab::preprocessing::Recipe;
use fraudlab::resampling::{fit_resamples, vfold_cv, ResampleControl};
use fraudlab::tuning::{finalize_workflow, tune_grid, ParamConfig, ParamRange, SelectionPolicy, TuningGrid};
use fraudlab::utils::ParallelConfig;
use fraudlab::workflow::Workflow;
use fraudlab::FraudlabError;

fn tree_workflow() -> Workflow {
    let spec = ModelSpec::decision_tree()
        .tune(HyperParam::CostComplexity)
        .unwrap()
        .tune(HyperParam::TreeDepth)
        .unwrap();
    Workflow::new(Recipe::from_config(&RecipeConfig::default()), spec)
}

fn ranges() -> Vec<ParamRange> {
    vec![
        ParamRange::log10(HyperParam::CostComplexity, -4.0, -1.0),
        ParamRange::linear(HyperParam::TreeDepth, 1.0, 5.0),
    ]
}

#[test]
fn test_regular_grid_selects_best_mean() {
    let data = transactions_dataset(300);
    let folds = vfold_cv(&data, 3, 2).unwrap();
    let grid = TuningGrid::regular(&ranges(), 2).unwrap();
    assert_eq!(grid.len(), 4);

    let result = tune_grid(
        &tree_workflow(),
        &data,
        &folds,
        &grid,
        &MetricSet::classification(),
        &ResampleControl::new(),
        &ParallelConfig::new(),
    )
    .unwrap();

    let best = result.select_best(MetricKind::RocAuc).unwrap();
    let best_mean = result.summary(&best.id, MetricKind::RocAuc).unwrap().mean.unwrap();
    for row in result.collect_metrics() {
        if row.summary.metric == MetricKind::RocAuc {
            assert!(best_mean >= row.summary.mean.unwrap());
        }
    }

    let shown = result.show_best(MetricKind::RocAuc, 2).unwrap();
    assert_eq!(shown.len(), 2);
    assert_eq!(shown[0].config, best);
}

#[test]
fn test_tuning_matches_manual_resampling() {
    let data = transactions_dataset(240);
    let folds = vfold_cv(&data, 3, 8).unwrap();
    let metrics = MetricSet::classification();
    let control = ResampleControl::new();
    let config = ParamConfig::new(
        "Model01",
        [(HyperParam::CostComplexity, 0.01), (HyperParam::TreeDepth, 3.0)],
    );
    let grid = TuningGrid::from_configs(vec![config.clone()]).unwrap();

    let tuned = tune_grid(&tree_workflow(), &data, &folds, &grid, &metrics, &control, &ParallelConfig::sequential())
        .unwrap();
    let fixed = finalize_workflow(&tree_workflow(), &config).unwrap();
    let manual = fit_resamples(&fixed, &data, &folds, &metrics, &control, &ParallelConfig::sequential()).unwrap();

    assert_eq!(tuned.candidates[0].folds, manual.folds);
}

#[test]
fn test_random_grid_and_policies() {
    let data = transactions_dataset(240);
    let folds = vfold_cv(&data, 3, 4).unwrap();
    let grid = TuningGrid::random(&ranges(), 5, 99).unwrap();
    let result = tune_grid(
        &tree_workflow(),
        &data,
        &folds,
        &grid,
        &MetricSet::classification(),
        &ResampleControl::new(),
        &ParallelConfig::new().with_threads(2),
    )
    .unwrap();

    let best = result.select_best(MetricKind::Accuracy).unwrap();
    let best_summary = result.summary(&best.id, MetricKind::Accuracy).unwrap();
    let one_se = result
        .select_with(MetricKind::Accuracy, SelectionPolicy::OneStdErr)
        .unwrap();
    let one_se_mean = result.summary(&one_se.id, MetricKind::Accuracy).unwrap().mean.unwrap();
    let se = best_summary.std_err.unwrap_or(0.0);
    assert!(one_se_mean >= best_summary.mean.unwrap() - se - 1e-9);

    let finalized = finalize_workflow(&tree_workflow(), &one_se).unwrap();
    assert!(finalized.model().is_finalized());
    assert_eq!(finalized.model().value(HyperParam::TreeDepth), one_se.get(HyperParam::TreeDepth));
}

#[test]
fn test_finalize_rejects_unknown_parameter() {
    let config = ParamConfig::new("Model01", [(HyperParam::Penalty, 0.1)]);
    let err = finalize_workflow(&tree_workflow(), &config).unwrap_err();
    assert!(matches!(err, FraudlabError::TuningError(_)));
}
