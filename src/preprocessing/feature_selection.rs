//! Correlation-based column pruning

use super::{Selector, Stage, Step, Transform};
use crate::data::{ColumnKind, Dataset};
use crate::error::{FraudlabError, Result};
use crate::utils::stats::pearson;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Drops one column of every numeric pair whose absolute correlation on the
/// reference exceeds `threshold`. Columns are scanned in table order and the
/// later-indexed column of an offending pair is the one removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationFilter {
    pub threshold: f64,
    pub selector: Selector,
}

impl CorrelationFilter {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            selector: Selector::AllNumeric,
        }
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }
}

impl Default for CorrelationFilter {
    fn default() -> Self {
        Self::new(0.9)
    }
}

/// A pair that triggered a removal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedPair {
    pub kept: String,
    pub dropped: String,
    pub correlation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedCorrelation {
    pub threshold: f64,
    /// Candidate columns that survived
    pub retained: Vec<String>,
    pub dropped: Vec<String>,
    /// Diagnostics, cleared when a workflow is reduced
    pub pairs: Vec<CorrelatedPair>,
}

impl Step for CorrelationFilter {
    type Params = FittedCorrelation;

    fn fit(&self, reference: &Dataset) -> Result<FittedCorrelation> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(FraudlabError::invalid_parameter(
                "threshold",
                self.threshold,
                "must lie in (0, 1]",
            ));
        }

        let names = self.selector.resolve_kind(reference, ColumnKind::Numeric)?;
        let columns = names
            .iter()
            .map(|n| reference.numeric(n))
            .collect::<Result<Vec<_>>>()?;

        let n = columns.len();
        let mut removed = vec![false; n];
        let mut pairs = Vec::new();

        for i in 0..n {
            if removed[i] {
                continue;
            }
            for j in (i + 1)..n {
                if removed[j] {
                    continue;
                }
                let r = pearson(columns[i], columns[j]);
                if r.abs() > self.threshold {
                    removed[j] = true;
                    pairs.push(CorrelatedPair {
                        kept: names[i].clone(),
                        dropped: names[j].clone(),
                        correlation: r,
                    });
                }
            }
        }

        let (dropped, retained): (Vec<_>, Vec<_>) = names
            .into_iter()
            .zip(removed)
            .partition(|(_, is_removed)| *is_removed);
        let dropped: Vec<String> = dropped.into_iter().map(|(n, _)| n).collect();
        let retained: Vec<String> = retained.into_iter().map(|(n, _)| n).collect();

        debug!(dropped = ?dropped, threshold = self.threshold, "Correlation filter fitted");

        Ok(FittedCorrelation {
            threshold: self.threshold,
            retained,
            dropped,
            pairs,
        })
    }
}

impl Transform for FittedCorrelation {
    fn apply(&self, data: Dataset, _stage: Stage) -> Result<Dataset> {
        for name in &self.dropped {
            data.feature(name)?;
        }
        Ok(data.drop_features(&self.dropped))
    }
}
