//! Confusion-matrix statistics and ROC analysis for binary classifiers

use crate::data::Class;
use crate::error::{FraudlabError, Result};
use serde::{Deserialize, Serialize};

fn ratio(num: usize, den: usize) -> Option<f64> {
    if den == 0 {
        None
    } else {
        Some(num as f64 / den as f64)
    }
}

fn check_lengths(a: usize, b: usize) -> Result<()> {
    if a != b {
        return Err(FraudlabError::ShapeError {
            expected: format!("{} predictions", a),
            actual: format!("{} predictions", b),
        });
    }
    Ok(())
}

/// Counts of a binary confusion matrix; [`Class::Positive`] is the event.
///
/// Every statistic returns `None` when its denominator is zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tp: usize,
    pub fp: usize,
    pub tn: usize,
    pub fn_: usize,
}

impl ConfusionMatrix {
    pub fn from_counts(tp: usize, fp: usize, tn: usize, fn_: usize) -> Self {
        Self { tp, fp, tn, fn_ }
    }

    pub fn from_predictions(truth: &[Class], predicted: &[Class]) -> Result<Self> {
        check_lengths(truth.len(), predicted.len())?;
        let mut cm = Self::default();
        for (&t, &p) in truth.iter().zip(predicted) {
            match (t, p) {
                (Class::Positive, Class::Positive) => cm.tp += 1,
                (Class::Negative, Class::Positive) => cm.fp += 1,
                (Class::Negative, Class::Negative) => cm.tn += 1,
                (Class::Positive, Class::Negative) => cm.fn_ += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> Option<f64> {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fp)
    }

    /// Also known as sensitivity
    pub fn recall(&self) -> Option<f64> {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn sensitivity(&self) -> Option<f64> {
        self.recall()
    }

    pub fn specificity(&self) -> Option<f64> {
        ratio(self.tn, self.tn + self.fp)
    }

    /// Harmonic mean of precision and recall; undefined when either is, or both are zero
    pub fn f1(&self) -> Option<f64> {
        let p = self.precision()?;
        let r = self.recall()?;
        if p + r == 0.0 {
            None
        } else {
            Some(2.0 * p * r / (p + r))
        }
    }
}

/// One operating point of a ROC curve
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RocPoint {
    /// Scores `>= threshold` are called positive
    pub threshold: f64,
    pub fpr: f64,
    pub tpr: f64,
}

/// ROC curve over every distinct score, from (0, 0) to (1, 1).
///
/// Tied scores move the curve in a single diagonal step. `None` when either
/// class is absent; a non-finite score is a `ValidationError`.
pub fn roc_curve(truth: &[Class], scores: &[f64]) -> Result<Option<Vec<RocPoint>>> {
    check_lengths(truth.len(), scores.len())?;
    if let Some(row) = scores.iter().position(|s| !s.is_finite()) {
        return Err(FraudlabError::ValidationError(format!(
            "score at row {} is not finite ({})",
            row, scores[row]
        )));
    }
    let n_pos = truth.iter().filter(|c| c.is_positive()).count();
    let n_neg = truth.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return Ok(None);
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut points = Vec::with_capacity(scores.len() + 1);
    points.push(RocPoint {
        threshold: f64::INFINITY,
        fpr: 0.0,
        tpr: 0.0,
    });

    let (mut tp, mut fp) = (0usize, 0usize);
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        while i < order.len() && scores[order[i]].total_cmp(&threshold).is_eq() {
            if truth[order[i]].is_positive() {
                tp += 1;
            } else {
                fp += 1;
            }
            i += 1;
        }
        points.push(RocPoint {
            threshold,
            fpr: fp as f64 / n_neg as f64,
            tpr: tp as f64 / n_pos as f64,
        });
    }
    Ok(Some(points))
}

/// Area under the ROC curve by the trapezoidal rule
pub fn roc_auc(truth: &[Class], scores: &[f64]) -> Result<Option<f64>> {
    Ok(roc_curve(truth, scores)?.map(|points| {
        points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum()
    }))
}
