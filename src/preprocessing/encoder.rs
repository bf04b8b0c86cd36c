//! Indicator encoding for categorical predictors

use super::{Selector, Stage, Step, Transform};
use crate::data::{ColumnKind, Dataset, Feature};
use crate::error::{FraudlabError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use tracing::warn;

/// What to do with a level that was not seen at fit time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnseenPolicy {
    /// Encode the row with every indicator set to zero
    #[default]
    AllZero,
    /// Fail with [`FraudlabError::UnseenCategory`]
    Error,
}

/// Expands categorical columns into 0/1 indicator columns named `{column}_{level}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyEncoder {
    /// One indicator per level; otherwise the first level is the reference and gets none
    pub one_hot: bool,
    pub unseen: UnseenPolicy,
    pub selector: Selector,
}

impl DummyEncoder {
    pub fn new() -> Self {
        Self {
            one_hot: true,
            unseen: UnseenPolicy::AllZero,
            selector: Selector::AllCategorical,
        }
    }

    pub fn with_one_hot(mut self, one_hot: bool) -> Self {
        self.one_hot = one_hot;
        self
    }

    pub fn with_unseen(mut self, policy: UnseenPolicy) -> Self {
        self.unseen = policy;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }
}

impl Default for DummyEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Levels and output columns for one encoded column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DummyColumn {
    pub name: String,
    /// Sorted levels seen at fit time
    pub levels: Vec<String>,
    /// Output columns, aligned with `levels` (minus the reference level without one-hot)
    pub indicators: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedDummy {
    pub columns: Vec<DummyColumn>,
    pub one_hot: bool,
    pub unseen: UnseenPolicy,
}

fn indicator_name(column: &str, level: &str) -> String {
    let level: String = level
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!("{}_{}", column, level)
}

impl Step for DummyEncoder {
    type Params = FittedDummy;

    fn fit(&self, reference: &Dataset) -> Result<FittedDummy> {
        if !self.one_hot && self.unseen == UnseenPolicy::AllZero {
            return Err(FraudlabError::ConfigError(
                "all-zero unseen encoding needs one-hot indicators; with reference coding it equals the first level"
                    .to_string(),
            ));
        }

        let names = self.selector.resolve_kind(reference, ColumnKind::Categorical)?;
        let mut taken: HashSet<String> = reference.column_names().into_iter().collect();
        let mut columns = Vec::with_capacity(names.len());

        for name in names {
            taken.remove(&name);
            let levels: Vec<String> = reference
                .categorical(&name)?
                .iter()
                .collect::<BTreeSet<_>>()
                .into_iter()
                .cloned()
                .collect();
            if levels.is_empty() {
                return Err(FraudlabError::PreprocessingError(format!(
                    "column '{}' has no levels to encode",
                    name
                )));
            }

            let skip = if self.one_hot { 0 } else { 1 };
            let indicators: Vec<String> = levels.iter().skip(skip).map(|l| indicator_name(&name, l)).collect();
            for ind in &indicators {
                if !taken.insert(ind.clone()) {
                    return Err(FraudlabError::PreprocessingError(format!(
                        "indicator column '{}' collides with an existing column",
                        ind
                    )));
                }
            }
            columns.push(DummyColumn { name, levels, indicators });
        }

        Ok(FittedDummy {
            columns,
            one_hot: self.one_hot,
            unseen: self.unseen,
        })
    }
}

impl FittedDummy {
    fn encode(&self, spec: &DummyColumn, values: &[String]) -> Result<(Vec<Feature>, usize)> {
        let offset = if self.one_hot { 0 } else { 1 };
        let mut indicators = vec![vec![0.0; values.len()]; spec.indicators.len()];
        let mut unseen = 0usize;

        for (row, value) in values.iter().enumerate() {
            match spec.levels.binary_search(value) {
                Ok(level) if level >= offset => indicators[level - offset][row] = 1.0,
                Ok(_) => {}
                Err(_) => match self.unseen {
                    UnseenPolicy::AllZero => unseen += 1,
                    UnseenPolicy::Error => {
                        return Err(FraudlabError::UnseenCategory {
                            column: spec.name.clone(),
                            value: value.clone(),
                        })
                    }
                },
            }
        }

        let features = spec
            .indicators
            .iter()
            .zip(indicators)
            .map(|(name, v)| Feature::numeric(name, v))
            .collect();
        Ok((features, unseen))
    }
}

impl Transform for FittedDummy {
    fn apply(&self, data: Dataset, _stage: Stage) -> Result<Dataset> {
        let mut features = Vec::with_capacity(data.n_cols());
        for feature in data.features() {
            match self.columns.iter().find(|c| c.name == feature.name) {
                Some(spec) => {
                    let (encoded, unseen) = self.encode(spec, data.categorical(&spec.name)?)?;
                    if unseen > 0 {
                        warn!(column = %spec.name, rows = unseen, "Unseen categories encoded as all-zero");
                    }
                    features.extend(encoded);
                }
                None => features.push(feature.clone()),
            }
        }
        for spec in &self.columns {
            data.feature(&spec.name)?;
        }
        data.with_features(features)
    }
}
