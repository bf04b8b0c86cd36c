//! Exploratory summaries of a record table

use super::{Class, ColumnKind, ColumnValues, Dataset};
use crate::utils::stats;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Per-column statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub name: String,
    pub kind: ColumnKind,
    pub count: usize,
    pub mean: Option<f64>,
    pub std: Option<f64>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub median: Option<f64>,
    /// Distinct levels, sorted (categorical columns only)
    pub categories: Option<Vec<String>>,
}

impl ColumnSummary {
    fn numeric(name: &str, values: &[f64]) -> Self {
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        Self {
            name: name.to_string(),
            kind: ColumnKind::Numeric,
            count: values.len(),
            mean: stats::mean(values),
            std: stats::sample_std(values),
            min: sorted.first().copied(),
            max: sorted.last().copied(),
            median: stats::median_sorted(&sorted),
            categories: None,
        }
    }

    fn categorical(name: &str, values: &[String]) -> Self {
        let levels: BTreeSet<&String> = values.iter().collect();
        Self {
            name: name.to_string(),
            kind: ColumnKind::Categorical,
            count: values.len(),
            mean: None,
            std: None,
            min: None,
            max: None,
            median: None,
            categories: Some(levels.into_iter().cloned().collect()),
        }
    }
}

/// Table-level summary with class balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub n_rows: usize,
    pub n_cols: usize,
    pub columns: Vec<ColumnSummary>,
    pub class_counts: BTreeMap<Class, usize>,
}

impl DatasetSummary {
    pub fn from_dataset(data: &Dataset) -> Self {
        let columns = data
            .features()
            .iter()
            .map(|f| match &f.values {
                ColumnValues::Numeric(v) => ColumnSummary::numeric(&f.name, v),
                ColumnValues::Categorical(v) => ColumnSummary::categorical(&f.name, v),
            })
            .collect();

        Self {
            n_rows: data.n_rows(),
            n_cols: data.n_cols(),
            columns,
            class_counts: data.class_counts(),
        }
    }

    /// Share of rows in the positive class, if the table is labelled
    pub fn positive_rate(&self) -> Option<f64> {
        let total: usize = self.class_counts.values().sum();
        if total == 0 {
            return None;
        }
        let positive = self.class_counts.get(&Class::Positive).copied().unwrap_or(0);
        Some(positive as f64 / total as f64)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnSummary> {
        self.columns.iter().find(|c| c.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{Feature, Target};

    #[test]
    fn test_summary() {
        let data = Dataset::new(
            vec![
                Feature::numeric("amount", vec![4.0, 1.0, 3.0, 2.0]),
                Feature::categorical("type", vec!["B".into(), "A".into(), "B".into(), "C".into()]),
            ],
            Some(Target::new(
                "y",
                vec![Class::Negative, Class::Negative, Class::Negative, Class::Positive],
            )),
        )
        .unwrap();

        let summary = DatasetSummary::from_dataset(&data);
        let amount = summary.column("amount").unwrap();
        assert_eq!(amount.mean, Some(2.5));
        assert_eq!(amount.min, Some(1.0));
        assert_eq!(amount.max, Some(4.0));
        assert_eq!(amount.median, Some(2.5));

        let kind = summary.column("type").unwrap();
        assert_eq!(kind.categories.as_deref(), Some(&["A".to_string(), "B".into(), "C".into()][..]));
        assert_eq!(summary.positive_rate(), Some(0.25));
    }
}
