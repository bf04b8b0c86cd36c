//! fraudlab - fraud detection model experimentation
//!
//! Trains binary classifiers on tabular transaction data. A preprocessing
//! [`Recipe`](preprocessing::Recipe) and a [`ModelSpec`](model::ModelSpec) are
//! bound into a [`Workflow`](workflow::Workflow) that is resampled, tuned,
//! refit on the training split and scored on held-out rows before export.
//!
//! # Modules
//!
//! ## Data
//! - [`data`] - Typed record tables, CSV loading, stratified splitting
//! - [`preprocessing`] - Recipe steps (correlation filter, log, normalize, dummy, SMOTE)
//!
//! ## Modelling
//! - [`model`] - Model specifications, logistic regression, CART decision tree
//! - [`workflow`] - Recipe + model bundles, fitting and prediction
//! - [`resampling`] - Stratified v-fold cross-validation
//! - [`tuning`] - Grid and random search with selection policies
//! - [`metrics`] - Confusion-matrix metrics and ROC AUC
//!
//! ## Running
//! - [`config`] - Experiment configuration
//! - [`experiment`] - End-to-end training run
//! - [`export`] - Model artifacts and metric reports
//! - [`cli`] - Command-line interface

pub mod error;

pub mod data;
pub mod preprocessing;

pub mod metrics;
pub mod model;
pub mod resampling;
pub mod tuning;
pub mod workflow;

pub mod config;
pub mod experiment;
pub mod export;

pub mod cli;
pub mod utils;

pub use error::{FraudlabError, Result};

/// Common imports
pub mod prelude {
    pub use crate::config::{ExperimentConfig, RecipeConfig};
    pub use crate::data::{initial_split, Class, Dataset, DatasetLoader, Feature, Split, Target};
    pub use crate::error::{FraudlabError, Result};
    pub use crate::export::{export_workflow, load_workflow, ModelMetadata, SerializationFormat};
    pub use crate::metrics::{MetricKind, MetricSet};
    pub use crate::model::{HyperParam, ModelSpec};
    pub use crate::preprocessing::Recipe;
    pub use crate::resampling::{fit_resamples, vfold_cv, ResampleControl};
    pub use crate::tuning::{finalize_workflow, tune_grid, ParamRange, SelectionPolicy, TuningGrid};
    pub use crate::utils::ParallelConfig;
    pub use crate::workflow::{last_fit, FittedWorkflow, Workflow};
}
