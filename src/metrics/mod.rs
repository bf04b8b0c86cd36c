//! Classification metrics
//!
//! Undefined statistics (a zero denominator, or a class missing for ROC AUC)
//! are reported as `None` rather than as a number.

mod classification;

pub use classification::{roc_auc, roc_curve, ConfusionMatrix, RocPoint};

use crate::data::Class;
use crate::error::{FraudlabError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Whether larger or smaller values of a metric are better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Maximize,
    Minimize,
}

impl Direction {
    /// True when `a` is strictly better than `b`
    pub fn better(self, a: f64, b: f64) -> bool {
        match self {
            Direction::Maximize => a > b,
            Direction::Minimize => a < b,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Accuracy,
    Sensitivity,
    Specificity,
    Precision,
    Recall,
    F1,
    RocAuc,
}

impl MetricKind {
    pub const ALL: [MetricKind; 7] = [
        MetricKind::Accuracy,
        MetricKind::Sensitivity,
        MetricKind::Specificity,
        MetricKind::Precision,
        MetricKind::Recall,
        MetricKind::F1,
        MetricKind::RocAuc,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MetricKind::Accuracy => "accuracy",
            MetricKind::Sensitivity => "sensitivity",
            MetricKind::Specificity => "specificity",
            MetricKind::Precision => "precision",
            MetricKind::Recall => "recall",
            MetricKind::F1 => "f1",
            MetricKind::RocAuc => "roc_auc",
        }
    }

    pub fn direction(self) -> Direction {
        Direction::Maximize
    }

    /// Needs class probabilities rather than hard predictions
    pub fn needs_probabilities(self) -> bool {
        matches!(self, MetricKind::RocAuc)
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MetricKind {
    type Err = FraudlabError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "accuracy" => Ok(MetricKind::Accuracy),
            "sensitivity" | "sens" => Ok(MetricKind::Sensitivity),
            "specificity" | "spec" => Ok(MetricKind::Specificity),
            "precision" => Ok(MetricKind::Precision),
            "recall" => Ok(MetricKind::Recall),
            "f1" | "f_meas" => Ok(MetricKind::F1),
            "roc_auc" | "auc" => Ok(MetricKind::RocAuc),
            other => Err(FraudlabError::invalid_parameter("metric", other, "unknown metric name")),
        }
    }
}

/// One computed metric; `estimate` is `None` when undefined
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricEstimate {
    pub metric: MetricKind,
    pub estimate: Option<f64>,
}

/// The metrics to compute for every evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSet {
    metrics: Vec<MetricKind>,
}

impl MetricSet {
    pub fn new(metrics: Vec<MetricKind>) -> Self {
        let mut unique = Vec::with_capacity(metrics.len());
        for m in metrics {
            if !unique.contains(&m) {
                unique.push(m);
            }
        }
        Self { metrics: unique }
    }

    /// Every supported classification metric
    pub fn classification() -> Self {
        Self::new(MetricKind::ALL.to_vec())
    }

    pub fn metrics(&self) -> &[MetricKind] {
        &self.metrics
    }

    pub fn contains(&self, metric: MetricKind) -> bool {
        self.metrics.contains(&metric)
    }

    /// Evaluate against true labels. `probabilities` are positive-class scores.
    pub fn evaluate(
        &self,
        truth: &[Class],
        predicted: &[Class],
        probabilities: Option<&[f64]>,
    ) -> Result<Vec<MetricEstimate>> {
        let cm = ConfusionMatrix::from_predictions(truth, predicted)?;
        self.metrics
            .iter()
            .map(|&metric| {
                let estimate = match metric {
                    MetricKind::Accuracy => cm.accuracy(),
                    MetricKind::Sensitivity => cm.sensitivity(),
                    MetricKind::Specificity => cm.specificity(),
                    MetricKind::Precision => cm.precision(),
                    MetricKind::Recall => cm.recall(),
                    MetricKind::F1 => cm.f1(),
                    MetricKind::RocAuc => {
                        let scores = probabilities.ok_or_else(|| {
                            FraudlabError::ValidationError("roc_auc requires class probabilities".to_string())
                        })?;
                        roc_auc(truth, scores)?
                    }
                };
                Ok(MetricEstimate { metric, estimate })
            })
            .collect()
    }
}

impl Default for MetricSet {
    fn default() -> Self {
        Self::classification()
    }
}

/// Look up one metric in a list of estimates
pub fn estimate_of(estimates: &[MetricEstimate], metric: MetricKind) -> Option<f64> {
    estimates.iter().find(|e| e.metric == metric).and_then(|e| e.estimate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use Class::{Negative as N, Positive as P};

    #[test]
    fn test_metric_names_round_trip() {
        for m in MetricKind::ALL {
            assert_eq!(m.name().parse::<MetricKind>().unwrap(), m);
        }
        assert_eq!("sens".parse::<MetricKind>().unwrap(), MetricKind::Sensitivity);
        assert!("rmse".parse::<MetricKind>().is_err());
    }

    #[test]
    fn test_evaluate() {
        let truth = [P, N, N, P];
        let pred = [P, N, P, N];
        let probs = [0.9, 0.1, 0.6, 0.4];
        let estimates = MetricSet::classification().evaluate(&truth, &pred, Some(&probs)).unwrap();

        assert_eq!(estimates.len(), 7);
        assert_eq!(estimate_of(&estimates, MetricKind::Accuracy), Some(0.5));
        assert_eq!(estimate_of(&estimates, MetricKind::Precision), Some(0.5));
        assert_eq!(estimate_of(&estimates, MetricKind::RocAuc), Some(0.75));
    }

    #[test]
    fn test_roc_auc_needs_probabilities() {
        let set = MetricSet::new(vec![MetricKind::RocAuc]);
        assert!(set.evaluate(&[P, N], &[P, N], None).is_err());

        let set = MetricSet::new(vec![MetricKind::Accuracy, MetricKind::Accuracy]);
        assert_eq!(set.metrics().len(), 1);
        assert!(set.evaluate(&[P, N], &[P, N], None).is_ok());
    }

    #[test]
    fn test_direction() {
        assert!(MetricKind::F1.direction().better(0.8, 0.7));
        assert!(Direction::Minimize.better(0.1, 0.2));
    }
}
