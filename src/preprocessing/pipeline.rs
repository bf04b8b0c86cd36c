//! Recipe preparation and baking

use super::{
    CorrelationFilter, DummyEncoder, FittedStep, LogTransform, Normalizer, SmoteStep, Stage, StepSpec,
    Transform,
};
use crate::config::RecipeConfig;
use crate::data::{Dataset, Schema};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};

/// Ordered, unfitted preprocessing steps
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    steps: Vec<StepSpec>,
}

/// A fitted recipe together with its processed training table
#[derive(Debug, Clone)]
pub struct Prepped {
    pub recipe: FittedRecipe,
    pub training: Dataset,
}

impl Recipe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlation filter, log transform, normalization, indicator encoding and
    /// SMOTE, in that order
    pub fn from_config(config: &RecipeConfig) -> Self {
        let recipe = Self::new()
            .step_corr(CorrelationFilter::new(config.corr_threshold))
            .step_log(
                LogTransform::new()
                    .with_base(config.log_base)
                    .with_offset(config.log_offset),
            )
            .step_normalize(Normalizer::new())
            .step_dummy(
                DummyEncoder::new()
                    .with_one_hot(config.one_hot)
                    .with_unseen(config.unseen),
            );
        if config.smote {
            recipe.step_smote(
                SmoteStep::new()
                    .with_neighbors(config.smote_neighbors)
                    .with_over_ratio(config.smote_over_ratio)
                    .with_seed(config.smote_seed),
            )
        } else {
            recipe
        }
    }

    pub fn step(mut self, step: StepSpec) -> Self {
        self.steps.push(step);
        self
    }

    pub fn step_corr(self, step: CorrelationFilter) -> Self {
        self.step(StepSpec::Correlation(step))
    }

    pub fn step_log(self, step: LogTransform) -> Self {
        self.step(StepSpec::Log(step))
    }

    pub fn step_normalize(self, step: Normalizer) -> Self {
        self.step(StepSpec::Normalize(step))
    }

    pub fn step_dummy(self, step: DummyEncoder) -> Self {
        self.step(StepSpec::Dummy(step))
    }

    pub fn step_smote(self, step: SmoteStep) -> Self {
        self.step(StepSpec::Smote(step))
    }

    pub fn steps(&self) -> &[StepSpec] {
        &self.steps
    }

    /// Fit every step in order on `training`, each on the previous step's output.
    ///
    /// Any step failure aborts preparation; no partially fitted recipe is returned.
    pub fn prep(&self, training: &Dataset) -> Result<Prepped> {
        let start = Instant::now();
        let input_schema = training.schema();
        let mut current = training.clone();
        let mut fitted = Vec::with_capacity(self.steps.len());

        for spec in &self.steps {
            let step = spec.fit(&current)?;
            current = step.apply(current, Stage::Training)?;
            debug!(step = spec.name(), rows = current.n_rows(), columns = current.n_cols(), "Step fitted");
            fitted.push(step);
        }

        info!(
            steps = fitted.len(),
            rows_in = training.n_rows(),
            rows_out = current.n_rows(),
            columns_out = current.n_cols(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Recipe prepped"
        );

        Ok(Prepped {
            recipe: FittedRecipe {
                input_schema,
                output_columns: current.column_names(),
                steps: fitted,
            },
            training: current,
        })
    }
}

/// Fitted steps, immutable after preparation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedRecipe {
    input_schema: Schema,
    output_columns: Vec<String>,
    steps: Vec<FittedStep>,
}

impl FittedRecipe {
    /// Transform new data with the learned parameters. Training-only steps are skipped.
    pub fn bake(&self, data: &Dataset) -> Result<Dataset> {
        self.input_schema.check(data)?;
        let mut current = data.clone();
        for step in &self.steps {
            if step.skip_on_new_data() {
                continue;
            }
            current = step.apply(current, Stage::New)?;
        }
        Ok(current)
    }

    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    /// Predictor columns produced by the recipe, in order
    pub fn output_columns(&self) -> &[String] {
        &self.output_columns
    }

    pub fn steps(&self) -> &[FittedStep] {
        &self.steps
    }

    /// Copy without fit-time diagnostics
    pub fn reduce(&self) -> Self {
        let mut reduced = self.clone();
        for step in &mut reduced.steps {
            step.strip();
        }
        reduced
    }
}
