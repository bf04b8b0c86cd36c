//! fraudlab command-line interface
//!
//! Subcommands to inspect a transaction file, split it, run the training
//! experiment and score new transactions with an exported model.

use clap::{Parser, Subcommand};
use colored::*;
use polars::prelude::*;
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::data::{initial_split, Class, DatasetLoader, DatasetSummary};
use crate::export::{load_workflow, write_csv, SerializationFormat};
use crate::experiment::{run_experiment, CandidateReport};
use crate::utils::format_duration;

// ─── Styling helpers ───────────────────────────────────────────────────────────

fn dim(s: &str) -> ColoredString   { s.truecolor(100, 100, 100) }
fn accent(s: &str) -> ColoredString { s.truecolor(120, 170, 255) }
fn muted(s: &str) -> ColoredString  { s.truecolor(140, 140, 140) }
fn ok(s: &str) -> ColoredString     { s.truecolor(100, 210, 120) }

fn kv(key: &str, val: &str) {
    println!("  {:<16} {}", muted(key), val.white());
}

fn step_run(msg: &str) {
    print!("  {} {}... ", accent("›"), msg);
}

fn step_done(detail: &str) {
    println!("{} {}", ok("done"), dim(detail));
}

fn section(title: &str) {
    println!();
    println!("  {}", title.white().bold());
    println!("  {}", dim(&"─".repeat(56)));
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{:.4}", x)).unwrap_or_else(|| "n/a".to_string())
}

// ─── CLI definition ────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "fraudlab")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train and apply fraud detection models on transaction tables")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Summarize a transaction file and its class balance
    Info {
        /// Input CSV file
        #[arg(short, long)]
        data: PathBuf,

        /// Label column name
        #[arg(short, long, default_value = "isFraud")]
        target: String,
    },

    /// Write a stratified train/test split as two CSV files
    Split {
        #[arg(short, long)]
        data: PathBuf,

        #[arg(short, long, default_value = "isFraud")]
        target: String,

        #[arg(long)]
        train_out: PathBuf,

        #[arg(long)]
        test_out: PathBuf,

        /// Share of rows used for training
        #[arg(long, default_value = "0.75")]
        prop: f64,

        #[arg(long, default_value = "42")]
        seed: u64,
    },

    /// Run the training experiment
    Train {
        /// JSON experiment config; flags below override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        data: Option<PathBuf>,

        #[arg(short, long)]
        target: Option<String>,

        /// Model artifact path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Metrics CSV path
        #[arg(long)]
        metrics: Option<PathBuf>,

        /// Number of cross-validation folds
        #[arg(long)]
        folds: Option<usize>,

        /// Seed for every random step
        #[arg(long)]
        seed: Option<u64>,

        /// Worker threads for resampling and tuning
        #[arg(long)]
        threads: Option<usize>,

        /// Write the model as JSON instead of bincode
        #[arg(long)]
        json: bool,

        /// Strip training-only diagnostics from the artifact
        #[arg(long)]
        reduce: bool,
    },

    /// Score transactions with an exported model
    Predict {
        /// Model artifact
        #[arg(short, long)]
        model: PathBuf,

        #[arg(short, long)]
        data: PathBuf,

        /// Output CSV; predictions are printed when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

pub fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Info { data, target } => cmd_info(&data, &target),
        Commands::Split { data, target, train_out, test_out, prop, seed } => {
            cmd_split(&data, &target, &train_out, &test_out, prop, seed)
        }
        Commands::Train { config, data, target, output, metrics, folds, seed, threads, json, reduce } => {
            let mut cfg = match config {
                Some(path) => ExperimentConfig::from_file(path)?,
                None => ExperimentConfig::default(),
            };
            if let Some(d) = data { cfg = cfg.with_data_path(d); }
            if let Some(t) = target { cfg = cfg.with_target(t); }
            if let Some(o) = output { cfg = cfg.with_model_path(o); }
            if let Some(m) = metrics { cfg = cfg.with_metrics_path(m); }
            if let Some(f) = folds { cfg = cfg.with_folds(f); }
            if let Some(s) = seed { cfg = cfg.with_seed(s); }
            if let Some(n) = threads { cfg = cfg.with_threads(n); }
            if json { cfg.output.format = SerializationFormat::Json; }
            if reduce { cfg = cfg.with_reduce(true); }
            cmd_train(&cfg)
        }
        Commands::Predict { model, data, output } => cmd_predict(&model, &data, output.as_deref()),
    }
}

fn loader_for(target: &str) -> DatasetLoader {
    if target == DatasetLoader::fraud().target() {
        DatasetLoader::fraud()
    } else {
        DatasetLoader::new(target)
    }
}

// ─── Commands ──────────────────────────────────────────────────────────────────

pub fn cmd_info(data_path: &Path, target: &str) -> anyhow::Result<()> {
    section("Data Info");

    let data = loader_for(target).load_csv(data_path)?;
    let summary = DatasetSummary::from_dataset(&data);

    kv("File", &data_path.display().to_string());
    kv("Rows", &summary.n_rows.to_string());
    kv("Predictors", &summary.n_cols.to_string());
    for (class, count) in &summary.class_counts {
        kv(&format!("{} rows", class), &count.to_string());
    }
    kv("Fraud rate", &fmt_opt(summary.positive_rate()));
    println!();

    println!(
        "  {:<18} {:<12} {:>12} {:>12} {:>12}",
        muted("Column"), muted("Kind"), muted("Mean"), muted("Min"), muted("Max")
    );
    println!("  {}", dim(&"─".repeat(70)));
    for col in &summary.columns {
        match &col.categories {
            Some(levels) => println!(
                "  {:<18} {:<12} {}",
                col.name,
                col.kind.to_string().truecolor(140, 140, 140),
                dim(&levels.join(", "))
            ),
            None => println!(
                "  {:<18} {:<12} {:>12} {:>12} {:>12}",
                col.name,
                col.kind.to_string().truecolor(140, 140, 140),
                fmt_opt(col.mean),
                fmt_opt(col.min),
                fmt_opt(col.max)
            ),
        }
    }
    println!();
    Ok(())
}

pub fn cmd_split(
    data_path: &Path,
    target: &str,
    train_out: &Path,
    test_out: &Path,
    prop: f64,
    seed: u64,
) -> anyhow::Result<()> {
    section("Split");

    step_run("Loading data");
    let start = Instant::now();
    let data = loader_for(target).load_csv(data_path)?;
    step_done(&format!("{} rows in {}", data.n_rows(), format_duration(start.elapsed())));

    let split = initial_split(&data, prop, seed)?;
    for (path, subset) in [(train_out, split.training(&data)?), (test_out, split.testing(&data)?)] {
        step_run(&format!("Writing → {}", path.display()));
        write_csv(&mut subset.to_dataframe()?, path)?;
        step_done(&format!("{} rows", subset.n_rows()));
    }
    println!();
    Ok(())
}

fn print_candidate(report: &CandidateReport, chosen: bool) {
    let marker = if chosen { ok("best").to_string() } else { "    ".to_string() };
    println!("  {} {}", marker, report.description.white().bold());
    for s in &report.summaries {
        println!(
            "       {:<14} {:>8} {}",
            muted(s.metric.name()),
            fmt_opt(s.mean),
            dim(&format!("± {}", fmt_opt(s.std_err)))
        );
    }
}

pub fn cmd_train(config: &ExperimentConfig) -> anyhow::Result<()> {
    section("Train");
    kv("Data", &config.data.path.display().to_string());
    kv("Target", &config.data.target);
    kv("Folds", &config.resample.folds.to_string());
    kv("Metric", config.tuning.metric.name());

    step_run("Running experiment");
    let report = run_experiment(config)?;
    step_done(&format!("{:.2}s", report.elapsed_secs));

    section("Data");
    kv("Rows", &report.n_rows.to_string());
    kv("Train / test", &format!("{} / {}", report.n_train, report.n_test));
    kv(
        "Fraud rows",
        &report.class_counts.get(&Class::Positive).copied().unwrap_or(0).to_string(),
    );

    section("Resampled performance");
    print_candidate(&report.baseline, report.chosen == report.baseline.family);
    print_candidate(&report.tuned, report.chosen == report.tuned.family);
    println!("  {}", dim(&format!("{} tree candidates evaluated", report.tuning_candidates)));

    section("Held-out test set");
    for m in &report.test_metrics {
        println!("  {:<16} {}", muted(m.metric.name()), fmt_opt(m.estimate).white().bold());
    }

    if let Some(diag) = report.workflow.diagnostics() {
        let mut top: Vec<&(String, f64)> = diag.feature_importances.iter().collect();
        top.sort_by(|a, b| b.1.total_cmp(&a.1));
        if !top.is_empty() {
            section("Top features");
            for (name, imp) in top.into_iter().take(5) {
                println!("  {:<24} {:.4}", muted(name), imp);
            }
        }
    }

    println!();
    println!("  {} {}", ok("✓"), format!("model   → {}", report.model_path.display()));
    println!("  {} {}", ok("✓"), format!("metrics → {}", report.metrics_path.display()));
    println!();
    Ok(())
}

pub fn cmd_predict(model_path: &Path, data_path: &Path, output: Option<&Path>) -> anyhow::Result<()> {
    section("Predict");

    step_run("Loading model");
    let (workflow, metadata) = load_workflow(model_path)?;
    step_done(&format!("{} v{}", metadata.model_type, metadata.version));

    step_run("Loading data");
    let data = DatasetLoader::new(workflow.target_name()).load_features(data_path)?;
    let expected = &workflow.recipe().input_schema().columns;
    let extra: Vec<String> = data
        .column_names()
        .into_iter()
        .filter(|c| !expected.iter().any(|(e, _)| e == c))
        .collect();
    let data = data.drop_features(&extra);
    step_done(&format!("{} rows, {} ignored column(s)", data.n_rows(), extra.len()));

    step_run("Scoring");
    let start = Instant::now();
    let preds = workflow.predict(&data)?;
    step_done(&format_duration(start.elapsed()));

    let levels = workflow.levels();
    let labels: Vec<&str> = preds.predicted.iter().map(|&c| levels.label(c)).collect();
    let mut df = DataFrame::new(vec![
        Column::new("row".into(), preds.row_ids.iter().map(|&r| r as u64).collect::<Vec<_>>()),
        Column::new("pred_class".into(), labels),
        Column::new("pred_prob".into(), preds.prob_positive.clone()),
    ])?;

    let flagged = preds.predicted.iter().filter(|c| c.is_positive()).count();
    match output {
        Some(path) => {
            write_csv(&mut df, path)?;
            println!("  {} {}", ok("✓"), format!("predictions → {}", path.display()));
        }
        None => println!("{}", df),
    }
    kv("Flagged", &format!("{} of {}", flagged, preds.len()));
    println!();
    Ok(())
}
