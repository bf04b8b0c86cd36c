//! Training workflows
//!
//! A [`Workflow`] pairs a preprocessing [`Recipe`] with a [`ModelSpec`] and is
//! fitted, resampled and tuned as one unit. Workflows are values: replacing the
//! model or recipe yields a new workflow and leaves the original untouched.

use crate::data::{Class, ClassLevels, Dataset, Split};
use crate::error::{FraudlabError, Result};
use crate::metrics::{MetricEstimate, MetricSet};
use crate::model::{FittedModel, ModelSpec};
use crate::preprocessing::{FittedRecipe, Recipe};
use crate::tuning::ParamConfig;
use crate::utils::timed;
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Unfitted recipe + model specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Workflow {
    recipe: Recipe,
    model: ModelSpec,
}

impl Workflow {
    pub fn new(recipe: Recipe, model: ModelSpec) -> Self {
        Self { recipe, model }
    }

    /// Same recipe, different model
    pub fn with_model(&self, model: ModelSpec) -> Self {
        Self {
            recipe: self.recipe.clone(),
            model,
        }
    }

    /// Same model, different recipe
    pub fn with_recipe(&self, recipe: Recipe) -> Self {
        Self {
            recipe,
            model: self.model.clone(),
        }
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    /// Lock tuned hyperparameters
    pub fn finalize(&self, config: &ParamConfig) -> Result<Self> {
        Ok(self.with_model(self.model.finalize(config)?))
    }

    /// Prepare the recipe on `training` and train the model on its output
    pub fn fit(&self, training: &Dataset) -> Result<FittedWorkflow> {
        let target = training
            .target()
            .ok_or_else(|| FraudlabError::ValidationError("training data has no target column".to_string()))?;
        let fitted_at = Utc::now();

        let (fitted, elapsed) = timed(|| -> Result<(FittedRecipe, FittedModel, Dataset)> {
            let prepped = self.recipe.prep(training)?;
            let x = prepped.training.to_matrix(prepped.recipe.output_columns())?;
            let model = self.model.fit(&x, prepped.training.labels()?)?;
            Ok((prepped.recipe, model, prepped.training))
        });
        let (recipe, model, processed) = fitted?;

        let feature_importances = model
            .feature_importances()
            .map(|imp| recipe.output_columns().iter().cloned().zip(imp.iter().copied()).collect())
            .unwrap_or_default();

        info!(
            model = %self.model.describe(),
            rows = training.n_rows(),
            processed_rows = processed.n_rows(),
            elapsed_ms = elapsed.as_millis() as u64,
            "Workflow fitted"
        );

        Ok(FittedWorkflow {
            recipe,
            model,
            spec: self.model.clone(),
            target_name: target.name.clone(),
            levels: target.levels.clone(),
            diagnostics: Some(FitDiagnostics {
                rows_in: training.n_rows(),
                rows_processed: processed.n_rows(),
                processed_class_counts: processed.class_counts(),
                fit_seconds: elapsed.as_secs_f64(),
                fitted_at,
                feature_importances,
            }),
        })
    }
}

/// Training-time information kept alongside a fitted workflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitDiagnostics {
    pub rows_in: usize,
    /// Rows after preprocessing, synthetic rows included
    pub rows_processed: usize,
    pub processed_class_counts: BTreeMap<Class, usize>,
    pub fit_seconds: f64,
    pub fitted_at: DateTime<Utc>,
    /// Processed column name and importance (trees only)
    pub feature_importances: Vec<(String, f64)>,
}

/// Hard and soft predictions for a set of rows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predictions {
    /// Row positions in the table the predictions were made for
    pub row_ids: Vec<usize>,
    pub predicted: Vec<Class>,
    /// Probability of the positive class
    pub prob_positive: Vec<f64>,
    /// True labels when the table carried them
    pub truth: Option<Vec<Class>>,
}

impl Predictions {
    pub fn len(&self) -> usize {
        self.predicted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.predicted.is_empty()
    }

    /// Re-label rows with ids from a parent table
    pub(crate) fn with_row_ids(mut self, ids: &[usize]) -> Self {
        self.row_ids = self.row_ids.iter().map(|&i| ids[i]).collect();
        self
    }

    pub fn evaluate(&self, metrics: &MetricSet) -> Result<Vec<MetricEstimate>> {
        let truth = self
            .truth
            .as_deref()
            .ok_or_else(|| FraudlabError::ValidationError("predictions carry no true labels".to_string()))?;
        metrics.evaluate(truth, &self.predicted, Some(&self.prob_positive))
    }
}

/// A prepared recipe and trained model, ready for inference
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedWorkflow {
    recipe: FittedRecipe,
    model: FittedModel,
    spec: ModelSpec,
    target_name: String,
    levels: ClassLevels,
    diagnostics: Option<FitDiagnostics>,
}

impl FittedWorkflow {
    fn design_matrix(&self, data: &Dataset) -> Result<Array2<f64>> {
        let baked = self.recipe.bake(data)?;
        baked.to_matrix(self.recipe.output_columns())
    }

    /// Per-class probabilities, columns `[negative, positive]`
    pub fn predict_prob(&self, data: &Dataset) -> Result<Array2<f64>> {
        self.model.predict_prob(&self.design_matrix(data)?)
    }

    pub fn predict_class(&self, data: &Dataset) -> Result<Vec<Class>> {
        self.model.predict_class(&self.design_matrix(data)?)
    }

    /// Classes and positive-class probabilities in one pass
    pub fn predict(&self, data: &Dataset) -> Result<Predictions> {
        let scores = self.model.positive_scores(&self.design_matrix(data)?)?;
        Ok(Predictions {
            row_ids: (0..data.n_rows()).collect(),
            predicted: scores.iter().map(|&p| Class::from_probability(p)).collect(),
            prob_positive: scores.to_vec(),
            truth: data.target().map(|t| t.classes.clone()),
        })
    }

    /// Predict on a labelled table and score the predictions
    pub fn evaluate(&self, data: &Dataset, metrics: &MetricSet) -> Result<Vec<MetricEstimate>> {
        self.predict(data)?.evaluate(metrics)
    }

    pub fn recipe(&self) -> &FittedRecipe {
        &self.recipe
    }

    pub fn model(&self) -> &FittedModel {
        &self.model
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Processed predictor names the model was trained on
    pub fn feature_names(&self) -> &[String] {
        self.recipe.output_columns()
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Raw label values of the two classes
    pub fn levels(&self) -> &ClassLevels {
        &self.levels
    }

    pub fn diagnostics(&self) -> Option<&FitDiagnostics> {
        self.diagnostics.as_ref()
    }

    /// Copy stripped of everything prediction does not read
    pub fn reduce(&self) -> Self {
        let mut model = self.model.clone();
        model.strip();
        Self {
            recipe: self.recipe.reduce(),
            model,
            spec: self.spec.clone(),
            target_name: self.target_name.clone(),
            levels: self.levels.clone(),
            diagnostics: None,
        }
    }

    pub fn is_reduced(&self) -> bool {
        self.diagnostics.is_none()
    }
}

/// Final fit on the training rows, evaluated on the held-out rows
#[derive(Debug, Clone)]
pub struct LastFit {
    pub workflow: FittedWorkflow,
    pub metrics: Vec<MetricEstimate>,
    pub predictions: Predictions,
}

/// Fit on `split`'s training subset and evaluate on its test subset
pub fn last_fit(workflow: &Workflow, data: &Dataset, split: &Split, metrics: &MetricSet) -> Result<LastFit> {
    let fitted = workflow.fit(&split.training(data)?)?;
    let predictions = fitted.predict(&split.testing(data)?)?.with_row_ids(&split.test_indices);
    let estimates = predictions.evaluate(metrics)?;

    info!(test_rows = predictions.len(), "Last fit evaluated on test set");

    Ok(LastFit {
        workflow: fitted,
        metrics: estimates,
        predictions,
    })
}
