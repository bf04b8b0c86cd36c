//! Metric tables written as CSV

use crate::error::Result;
use crate::metrics::MetricEstimate;
use crate::resampling::MetricSummary;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::Path;
use tracing::info;

/// One line of the metrics report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    pub metric: String,
    pub estimate: Option<f64>,
    pub std_err: Option<f64>,
    /// Folds (resampled rows) or rows (held-out rows) behind the estimate
    pub n: u64,
    /// e.g. `resample:logistic_reg` or `test:decision_tree`
    pub source: String,
}

impl MetricRow {
    pub fn from_summary(summary: &MetricSummary, source: impl Into<String>) -> Self {
        Self {
            metric: summary.metric.name().to_string(),
            estimate: summary.mean,
            std_err: summary.std_err,
            n: summary.n as u64,
            source: source.into(),
        }
    }

    pub fn from_estimate(estimate: &MetricEstimate, n: usize, source: impl Into<String>) -> Self {
        Self {
            metric: estimate.metric.name().to_string(),
            estimate: estimate.estimate,
            std_err: None,
            n: n as u64,
            source: source.into(),
        }
    }
}

pub fn metrics_frame(rows: &[MetricRow]) -> Result<DataFrame> {
    let columns = vec![
        Column::new("metric".into(), rows.iter().map(|r| r.metric.as_str()).collect::<Vec<_>>()),
        Column::new("estimate".into(), rows.iter().map(|r| r.estimate).collect::<Vec<_>>()),
        Column::new("std_err".into(), rows.iter().map(|r| r.std_err).collect::<Vec<_>>()),
        Column::new("n".into(), rows.iter().map(|r| r.n).collect::<Vec<_>>()),
        Column::new("source".into(), rows.iter().map(|r| r.source.as_str()).collect::<Vec<_>>()),
    ];
    Ok(DataFrame::new(columns)?)
}

/// Write a frame as CSV with a header row, creating parent directories
pub fn write_csv(df: &mut DataFrame, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).include_header(true).finish(df)?;
    Ok(())
}

pub fn write_metrics_csv(rows: &[MetricRow], path: impl AsRef<Path>) -> Result<()> {
    let mut df = metrics_frame(rows)?;
    write_csv(&mut df, path.as_ref())?;
    info!(path = %path.as_ref().display(), rows = rows.len(), "Metrics written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::MetricKind;

    #[test]
    fn test_write_metrics_csv() {
        let rows = vec![
            MetricRow::from_summary(
                &MetricSummary {
                    metric: MetricKind::RocAuc,
                    mean: Some(0.93),
                    std_dev: Some(0.02),
                    std_err: Some(0.01),
                    n: 4,
                },
                "resample:decision_tree",
            ),
            MetricRow::from_estimate(
                &MetricEstimate {
                    metric: MetricKind::Precision,
                    estimate: None,
                },
                250,
                "test:decision_tree",
            ),
        ];

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("metrics.csv");
        write_metrics_csv(&rows, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("metric,estimate,std_err,n,source"));
        assert_eq!(lines.next(), Some("roc_auc,0.93,0.01,4,resample:decision_tree"));
        assert_eq!(lines.next(), Some("precision,,,250,test:decision_tree"));
    }
}
