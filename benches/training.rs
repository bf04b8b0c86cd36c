use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use fraudlab::config::RecipeConfig;
use fraudlab::data::{Class, Dataset, Feature, Target};
use fraudlab::metrics::MetricSet;
use fraudlab::model::ModelSpec;
use fraudlab::preprocessing::Recipe;
use fraudlab::resampling::{fit_resamples, vfold_cv, ResampleControl};
use fraudlab::utils::ParallelConfig;
use fraudlab::workflow::Workflow;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

const KINDS: [&str; 5] = ["PAYMENT", "TRANSFER", "CASH_OUT", "DEBIT", "CASH_IN"];

fn create_transactions(n_rows: usize, seed: u64) -> Dataset {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut kind = Vec::with_capacity(n_rows);
    let mut amount = Vec::with_capacity(n_rows);
    let mut old_org = Vec::with_capacity(n_rows);
    let mut new_org = Vec::with_capacity(n_rows);
    let mut classes = Vec::with_capacity(n_rows);

    for _ in 0..n_rows {
        let balance = rng.gen::<f64>() * 50_000.0;
        let fraud = rng.gen::<f64>() < 0.05;
        let paid = if fraud { balance } else { rng.gen::<f64>() * 900.0 };
        kind.push(KINDS[if fraud { 1 + rng.gen_range(0..2) } else { rng.gen_range(0..KINDS.len()) }].to_string());
        amount.push(paid);
        old_org.push(balance);
        new_org.push((balance - paid).max(0.0));
        classes.push(if fraud { Class::Positive } else { Class::Negative });
    }

    Dataset::new(
        vec![
            Feature::numeric("step", (0..n_rows).map(|i| (i % 24) as f64).collect()),
            Feature::categorical("type", kind),
            Feature::numeric("amount", amount),
            Feature::numeric("oldbalanceOrg", old_org),
            Feature::numeric("newbalanceOrig", new_org),
        ],
        Some(Target::new("isFraud", classes)),
    )
    .unwrap()
}

fn workflows() -> Vec<(&'static str, Workflow)> {
    let recipe = Recipe::from_config(&RecipeConfig::default());
    vec![
        ("logistic_reg", Workflow::new(recipe.clone(), ModelSpec::logistic_reg())),
        ("decision_tree", Workflow::new(recipe, ModelSpec::decision_tree())),
    ]
}

fn bench_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflow_fit");
    group.sample_size(10);

    for n_rows in [1000, 5000] {
        let data = create_transactions(n_rows, 42);
        for (name, wf) in workflows() {
            group.bench_with_input(BenchmarkId::new(name, n_rows), &data, |b, data| {
                b.iter(|| wf.fit(black_box(data)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_predict(c: &mut Criterion) {
    let mut group = c.benchmark_group("workflow_predict");
    let training = create_transactions(5000, 42);

    for (name, wf) in workflows() {
        let fitted = wf.fit(&training).unwrap();
        for n_rows in [100, 1000, 10000] {
            let data = create_transactions(n_rows, 7);
            group.bench_with_input(BenchmarkId::new(name, n_rows), &data, |b, data| {
                b.iter(|| fitted.predict(black_box(data)).unwrap())
            });
        }
    }

    group.finish();
}

fn bench_resamples(c: &mut Criterion) {
    let mut group = c.benchmark_group("fit_resamples");
    group.sample_size(10);

    let data = create_transactions(2000, 42);
    let folds = vfold_cv(&data, 5, 42).unwrap();
    let metrics = MetricSet::classification();
    let control = ResampleControl::new();

    for threads in [1, 4] {
        let parallel = ParallelConfig::new().with_threads(threads);
        for (name, wf) in workflows() {
            group.bench_with_input(BenchmarkId::new(name, threads), &folds, |b, folds| {
                b.iter(|| fit_resamples(&wf, &data, folds, &metrics, &control, &parallel).unwrap())
            });
        }
    }

    group.finish();
}

criterion_group!(benches, bench_fit, bench_predict, bench_resamples);
criterion_main!(benches);
