//! Z-score normalization

use super::{Selector, Stage, Step, Transform};
use crate::data::{ColumnKind, Dataset, Feature};
use crate::error::{FraudlabError, Result};
use crate::utils::stats;
use serde::{Deserialize, Serialize};

/// Centres numeric columns on the reference mean and scales by the reference
/// sample standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Normalizer {
    pub selector: Selector,
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            selector: Selector::AllNumeric,
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parameters for one normalized column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormParams {
    pub name: String,
    pub mean: f64,
    pub std: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedNormalizer {
    pub columns: Vec<NormParams>,
}

impl Step for Normalizer {
    type Params = FittedNormalizer;

    fn fit(&self, reference: &Dataset) -> Result<FittedNormalizer> {
        let names = self.selector.resolve_kind(reference, ColumnKind::Numeric)?;
        let mut columns = Vec::with_capacity(names.len());
        for name in names {
            let values = reference.numeric(&name)?;
            let mean = stats::mean(values).ok_or_else(|| {
                FraudlabError::PreprocessingError(format!("cannot normalize empty column '{}'", name))
            })?;
            // constant columns are centred only
            let std = match stats::sample_std(values) {
                Some(s) if s > 1e-12 => s,
                _ => 1.0,
            };
            columns.push(NormParams { name, mean, std });
        }
        Ok(FittedNormalizer { columns })
    }
}

impl Transform for FittedNormalizer {
    fn apply(&self, data: Dataset, _stage: Stage) -> Result<Dataset> {
        let mut features = data.features().to_vec();
        for p in &self.columns {
            let scaled: Vec<f64> = data.numeric(&p.name)?.iter().map(|x| (x - p.mean) / p.std).collect();
            if let Some(slot) = features.iter_mut().find(|f| f.name == p.name) {
                *slot = Feature::numeric(&p.name, scaled);
            }
        }
        data.with_features(features)
    }
}
