//! Preprocessing recipes
//!
//! A recipe is an ordered list of step descriptors. Preparing a recipe fits each
//! step on the output of the previous one; the fitted recipe can then be baked
//! onto any table with the same input schema, using only what was learned at
//! fit time.
//!
//! Available steps:
//! - [`CorrelationFilter`] - drop one column of each highly correlated pair
//! - [`LogTransform`] - `log_base(x + offset)`
//! - [`Normalizer`] - centre and scale with training mean / standard deviation
//! - [`DummyEncoder`] - indicator columns for categorical predictors
//! - [`SmoteStep`] - synthetic minority oversampling, training data only

mod encoder;
mod feature_selection;
mod pipeline;
mod scaler;
mod smote;
mod transforms;

pub use encoder::{DummyColumn, DummyEncoder, FittedDummy, UnseenPolicy};
pub use feature_selection::{CorrelatedPair, CorrelationFilter, FittedCorrelation};
pub use pipeline::{FittedRecipe, Prepped, Recipe};
pub use scaler::{FittedNormalizer, NormParams, Normalizer};
pub use smote::{FittedSmote, SmoteStep};
pub use transforms::{FittedLog, LogTransform};

use crate::data::{ColumnKind, Dataset};
use crate::error::{FraudlabError, Result};
use serde::{Deserialize, Serialize};

/// Which predictor columns a step operates on
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Selector {
    AllNumeric,
    AllCategorical,
    Columns(Vec<String>),
}

impl Selector {
    /// Resolve against a reference table. Named columns must exist.
    pub fn resolve(&self, data: &Dataset) -> Result<Vec<String>> {
        match self {
            Selector::AllNumeric => Ok(data.numeric_names()),
            Selector::AllCategorical => Ok(data.categorical_names()),
            Selector::Columns(names) => {
                for name in names {
                    data.feature(name)?;
                }
                Ok(names.clone())
            }
        }
    }

    /// Resolve and require every selected column to be of `kind`
    pub(crate) fn resolve_kind(&self, data: &Dataset, kind: ColumnKind) -> Result<Vec<String>> {
        let names = self.resolve(data)?;
        for name in &names {
            let found = data.feature(name)?.kind();
            if found != kind {
                return Err(FraudlabError::schema(name, format!("expected {} column, found {}", kind, found)));
            }
        }
        Ok(names)
    }
}

/// Whether a table is the data the recipe was fitted on, or anything else
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// The fit reference, about to be used for model training
    Training,
    /// Validation, test or inference data
    New,
}

/// A declarative step: learns parameters from a reference table
pub trait Step {
    type Params: Transform;

    fn fit(&self, reference: &Dataset) -> Result<Self::Params>;
}

/// Fitted step parameters: transform any table using only learned state
pub trait Transform {
    fn apply(&self, data: Dataset, stage: Stage) -> Result<Dataset>;
}

/// Step descriptor, in recipe order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepSpec {
    Correlation(CorrelationFilter),
    Log(LogTransform),
    Normalize(Normalizer),
    Dummy(DummyEncoder),
    Smote(SmoteStep),
}

impl StepSpec {
    pub fn name(&self) -> &'static str {
        match self {
            StepSpec::Correlation(_) => "corr",
            StepSpec::Log(_) => "log",
            StepSpec::Normalize(_) => "normalize",
            StepSpec::Dummy(_) => "dummy",
            StepSpec::Smote(_) => "smote",
        }
    }

    pub fn fit(&self, reference: &Dataset) -> Result<FittedStep> {
        Ok(match self {
            StepSpec::Correlation(s) => FittedStep::Correlation(s.fit(reference)?),
            StepSpec::Log(s) => FittedStep::Log(s.fit(reference)?),
            StepSpec::Normalize(s) => FittedStep::Normalize(s.fit(reference)?),
            StepSpec::Dummy(s) => FittedStep::Dummy(s.fit(reference)?),
            StepSpec::Smote(s) => FittedStep::Smote(s.fit(reference)?),
        })
    }
}

/// Learned parameters of one step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FittedStep {
    Correlation(FittedCorrelation),
    Log(FittedLog),
    Normalize(FittedNormalizer),
    Dummy(FittedDummy),
    Smote(FittedSmote),
}

impl FittedStep {
    pub fn name(&self) -> &'static str {
        match self {
            FittedStep::Correlation(_) => "corr",
            FittedStep::Log(_) => "log",
            FittedStep::Normalize(_) => "normalize",
            FittedStep::Dummy(_) => "dummy",
            FittedStep::Smote(_) => "smote",
        }
    }

    /// Steps that leave non-training data untouched
    pub fn skip_on_new_data(&self) -> bool {
        matches!(self, FittedStep::Smote(_))
    }

    /// Drop fit-time diagnostics that prediction does not read
    pub fn strip(&mut self) {
        if let FittedStep::Correlation(c) = self {
            c.pairs.clear();
        }
    }
}

impl Transform for FittedStep {
    fn apply(&self, data: Dataset, stage: Stage) -> Result<Dataset> {
        match self {
            FittedStep::Correlation(p) => p.apply(data, stage),
            FittedStep::Log(p) => p.apply(data, stage),
            FittedStep::Normalize(p) => p.apply(data, stage),
            FittedStep::Dummy(p) => p.apply(data, stage),
            FittedStep::Smote(p) => p.apply(data, stage),
        }
    }
}
