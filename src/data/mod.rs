//! Record tables for binary classification
//!
//! A [`Dataset`] is a small columnar table: an ordered list of typed predictor
//! columns plus an optional binary target. Column set and kinds are fixed once
//! the table is built; every transformation returns a new table.

mod loader;
mod split;
mod summary;

pub use loader::DatasetLoader;
pub use split::{initial_split, Split};
pub use summary::{ColumnSummary, DatasetSummary};

use crate::error::{FraudlabError, Result};
use ndarray::Array2;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;

/// Binary class label. `Positive` is the event of interest (fraud).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Class {
    Negative,
    Positive,
}

impl Class {
    /// Class implied by a positive-class probability
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.5 {
            Class::Positive
        } else {
            Class::Negative
        }
    }

    /// Numeric encoding used by the model fitters (0 / 1)
    pub fn as_f64(self) -> f64 {
        match self {
            Class::Negative => 0.0,
            Class::Positive => 1.0,
        }
    }

    pub fn is_positive(self) -> bool {
        matches!(self, Class::Positive)
    }
}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Class::Negative => write!(f, "negative"),
            Class::Positive => write!(f, "positive"),
        }
    }
}

/// Raw label values the two classes were read from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassLevels {
    pub negative: String,
    pub positive: String,
}

impl ClassLevels {
    pub fn new(negative: impl Into<String>, positive: impl Into<String>) -> Self {
        Self {
            negative: negative.into(),
            positive: positive.into(),
        }
    }

    pub fn label(&self, class: Class) -> &str {
        match class {
            Class::Negative => &self.negative,
            Class::Positive => &self.positive,
        }
    }
}

impl Default for ClassLevels {
    fn default() -> Self {
        Self::new("0", "1")
    }
}

/// Kind of a predictor column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Numeric,
    Categorical,
}

impl fmt::Display for ColumnKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKind::Numeric => write!(f, "numeric"),
            ColumnKind::Categorical => write!(f, "categorical"),
        }
    }
}

/// Values of one predictor column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnValues {
    Numeric(Vec<f64>),
    Categorical(Vec<String>),
}

impl ColumnValues {
    pub fn len(&self) -> usize {
        match self {
            ColumnValues::Numeric(v) => v.len(),
            ColumnValues::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn kind(&self) -> ColumnKind {
        match self {
            ColumnValues::Numeric(_) => ColumnKind::Numeric,
            ColumnValues::Categorical(_) => ColumnKind::Categorical,
        }
    }

    fn take(&self, indices: &[usize]) -> Self {
        match self {
            ColumnValues::Numeric(v) => ColumnValues::Numeric(indices.iter().map(|&i| v[i]).collect()),
            ColumnValues::Categorical(v) => {
                ColumnValues::Categorical(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// A named predictor column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub name: String,
    pub values: ColumnValues,
}

impl Feature {
    pub fn numeric(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Numeric(values),
        }
    }

    pub fn categorical(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values: ColumnValues::Categorical(values),
        }
    }

    pub fn kind(&self) -> ColumnKind {
        self.values.kind()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// The binary outcome column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Target {
    pub name: String,
    pub classes: Vec<Class>,
    pub levels: ClassLevels,
}

impl Target {
    pub fn new(name: impl Into<String>, classes: Vec<Class>) -> Self {
        Self {
            name: name.into(),
            classes,
            levels: ClassLevels::default(),
        }
    }

    pub fn with_levels(mut self, levels: ClassLevels) -> Self {
        self.levels = levels;
        self
    }
}

/// Ordered column names and kinds a table is expected to carry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<(String, ColumnKind)>,
    pub target: Option<String>,
}

impl Schema {
    pub fn new(columns: Vec<(String, ColumnKind)>) -> Self {
        Self { columns, target: None }
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn kind_of(&self, name: &str) -> Option<ColumnKind> {
        self.columns.iter().find(|(n, _)| n == name).map(|(_, k)| *k)
    }

    /// Check that `data` carries exactly these predictor columns with these kinds.
    ///
    /// Column order is not significant; the target column is not checked.
    pub fn check(&self, data: &Dataset) -> Result<()> {
        for (name, kind) in &self.columns {
            match data.feature(name) {
                Ok(feature) if feature.kind() == *kind => {}
                Ok(feature) => {
                    return Err(FraudlabError::schema(
                        name,
                        format!("expected {} column, found {}", kind, feature.kind()),
                    ))
                }
                Err(_) => return Err(FraudlabError::schema(name, "column is missing")),
            }
        }
        for feature in data.features() {
            if self.kind_of(&feature.name).is_none() {
                return Err(FraudlabError::schema(&feature.name, "column was not present at fit time"));
            }
        }
        Ok(())
    }
}

/// Columnar record table with an optional binary target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    features: Vec<Feature>,
    target: Option<Target>,
}

impl Dataset {
    /// Build a table, checking that every column has the same length and a unique name
    pub fn new(features: Vec<Feature>, target: Option<Target>) -> Result<Self> {
        let expected = features
            .first()
            .map(|f| f.len())
            .or_else(|| target.as_ref().map(|t| t.classes.len()))
            .unwrap_or(0);

        let mut seen = HashSet::new();
        for feature in &features {
            if feature.len() != expected {
                return Err(FraudlabError::ShapeError {
                    expected: format!("{} rows", expected),
                    actual: format!("{} rows in column '{}'", feature.len(), feature.name),
                });
            }
            if !seen.insert(feature.name.as_str()) {
                return Err(FraudlabError::schema(&feature.name, "duplicate column name"));
            }
        }
        if let Some(target) = &target {
            if target.classes.len() != expected {
                return Err(FraudlabError::ShapeError {
                    expected: format!("{} rows", expected),
                    actual: format!("{} labels in '{}'", target.classes.len(), target.name),
                });
            }
            if seen.contains(target.name.as_str()) {
                return Err(FraudlabError::schema(&target.name, "target also listed as a predictor"));
            }
        }

        Ok(Self { features, target })
    }

    pub fn n_rows(&self) -> usize {
        self.features
            .first()
            .map(|f| f.len())
            .or_else(|| self.target.as_ref().map(|t| t.classes.len()))
            .unwrap_or(0)
    }

    pub fn n_cols(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows() == 0
    }

    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn column_names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name.clone()).collect()
    }

    pub fn feature(&self, name: &str) -> Result<&Feature> {
        self.features
            .iter()
            .find(|f| f.name == name)
            .ok_or_else(|| FraudlabError::FeatureNotFound(name.to_string()))
    }

    pub fn numeric(&self, name: &str) -> Result<&[f64]> {
        match &self.feature(name)?.values {
            ColumnValues::Numeric(v) => Ok(v),
            ColumnValues::Categorical(_) => Err(FraudlabError::schema(name, "expected numeric column")),
        }
    }

    pub fn categorical(&self, name: &str) -> Result<&[String]> {
        match &self.feature(name)?.values {
            ColumnValues::Categorical(v) => Ok(v),
            ColumnValues::Numeric(_) => Err(FraudlabError::schema(name, "expected categorical column")),
        }
    }

    pub fn numeric_names(&self) -> Vec<String> {
        self.names_of(ColumnKind::Numeric)
    }

    pub fn categorical_names(&self) -> Vec<String> {
        self.names_of(ColumnKind::Categorical)
    }

    fn names_of(&self, kind: ColumnKind) -> Vec<String> {
        self.features
            .iter()
            .filter(|f| f.kind() == kind)
            .map(|f| f.name.clone())
            .collect()
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// Target labels, or a validation error when the table carries no target
    pub fn labels(&self) -> Result<&[Class]> {
        self.target
            .as_ref()
            .map(|t| t.classes.as_slice())
            .ok_or_else(|| FraudlabError::ValidationError("dataset has no target column".to_string()))
    }

    pub fn schema(&self) -> Schema {
        let schema = Schema::new(self.features.iter().map(|f| (f.name.clone(), f.kind())).collect());
        match &self.target {
            Some(t) => schema.with_target(&t.name),
            None => schema,
        }
    }

    /// Rows at `indices`, in the given order. An index past the last row is a
    /// `ValidationError`.
    pub fn take(&self, indices: &[usize]) -> Result<Self> {
        let n_rows = self.n_rows();
        if let Some(&bad) = indices.iter().find(|&&i| i >= n_rows) {
            return Err(FraudlabError::ValidationError(format!(
                "row index {} out of range for a table of {} rows",
                bad, n_rows
            )));
        }
        Ok(Self {
            features: self
                .features
                .iter()
                .map(|f| Feature {
                    name: f.name.clone(),
                    values: f.values.take(indices),
                })
                .collect(),
            target: self.target.as_ref().map(|t| Target {
                name: t.name.clone(),
                classes: indices.iter().map(|&i| t.classes[i]).collect(),
                levels: t.levels.clone(),
            }),
        })
    }

    pub fn without_target(&self) -> Self {
        Self {
            features: self.features.clone(),
            target: None,
        }
    }

    /// Replace the predictor columns, keeping the target
    pub fn with_features(&self, features: Vec<Feature>) -> Result<Self> {
        Self::new(features, self.target.clone())
    }

    /// Insert or replace a single column
    pub fn with_feature(&self, feature: Feature) -> Result<Self> {
        let mut features = self.features.clone();
        match features.iter_mut().find(|f| f.name == feature.name) {
            Some(slot) => *slot = feature,
            None => features.push(feature),
        }
        Self::new(features, self.target.clone())
    }

    pub fn drop_features(&self, names: &[String]) -> Self {
        Self {
            features: self
                .features
                .iter()
                .filter(|f| !names.contains(&f.name))
                .cloned()
                .collect(),
            target: self.target.clone(),
        }
    }

    /// Append rows to an all-numeric table. `rows` columns follow the table's column order.
    pub fn append_numeric_rows(&self, rows: &Array2<f64>, classes: &[Class]) -> Result<Self> {
        if rows.ncols() != self.n_cols() || rows.nrows() != classes.len() {
            return Err(FraudlabError::ShapeError {
                expected: format!("{} columns and {} labels", self.n_cols(), rows.nrows()),
                actual: format!("{} columns and {} labels", rows.ncols(), classes.len()),
            });
        }
        let target = self.target.as_ref().ok_or_else(|| {
            FraudlabError::ValidationError("cannot append labelled rows to a table without target".to_string())
        })?;

        let mut features = Vec::with_capacity(self.n_cols());
        for (j, feature) in self.features.iter().enumerate() {
            match &feature.values {
                ColumnValues::Numeric(v) => {
                    let mut values = v.clone();
                    values.extend(rows.column(j).iter().copied());
                    features.push(Feature::numeric(&feature.name, values));
                }
                ColumnValues::Categorical(_) => {
                    return Err(FraudlabError::schema(&feature.name, "expected numeric column"));
                }
            }
        }
        let mut labels = target.classes.clone();
        labels.extend_from_slice(classes);

        Self::new(
            features,
            Some(Target {
                name: target.name.clone(),
                classes: labels,
                levels: target.levels.clone(),
            }),
        )
    }

    /// Row-major matrix of the named numeric columns
    pub fn to_matrix(&self, names: &[String]) -> Result<Array2<f64>> {
        let columns = names
            .iter()
            .map(|name| self.numeric(name))
            .collect::<Result<Vec<_>>>()?;
        let n_rows = self.n_rows();
        Ok(Array2::from_shape_fn((n_rows, columns.len()), |(i, j)| columns[j][i]))
    }

    /// Matrix of every predictor, failing if any column is categorical
    pub fn numeric_matrix(&self) -> Result<Array2<f64>> {
        if let Some(f) = self.features.iter().find(|f| f.kind() == ColumnKind::Categorical) {
            return Err(FraudlabError::schema(&f.name, "expected numeric column"));
        }
        self.to_matrix(&self.column_names())
    }

    /// Labels as 0.0 / 1.0
    pub fn label_vector(&self) -> Result<ndarray::Array1<f64>> {
        Ok(self.labels()?.iter().map(|c| c.as_f64()).collect())
    }

    pub fn class_counts(&self) -> BTreeMap<Class, usize> {
        let mut counts = BTreeMap::new();
        if let Some(target) = &self.target {
            for &class in &target.classes {
                *counts.entry(class).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Row indices grouped by class, in ascending row order
    pub fn class_indices(&self) -> Result<BTreeMap<Class, Vec<usize>>> {
        let mut groups: BTreeMap<Class, Vec<usize>> = BTreeMap::new();
        for (i, &class) in self.labels()?.iter().enumerate() {
            groups.entry(class).or_default().push(i);
        }
        Ok(groups)
    }

    /// Convert to a polars frame; the target is written with its raw label values
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let mut columns: Vec<Column> = self
            .features
            .iter()
            .map(|f| match &f.values {
                ColumnValues::Numeric(v) => Column::new(f.name.as_str().into(), v.as_slice()),
                ColumnValues::Categorical(v) => Column::new(f.name.as_str().into(), v.as_slice()),
            })
            .collect();
        if let Some(target) = &self.target {
            let labels: Vec<&str> = target.classes.iter().map(|&c| target.levels.label(c)).collect();
            columns.push(Column::new(target.name.as_str().into(), labels));
        }
        Ok(DataFrame::new(columns)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::new(
            vec![
                Feature::numeric("amount", vec![10.0, 20.0, 30.0, 40.0]),
                Feature::categorical("type", vec!["A".into(), "B".into(), "A".into(), "B".into()]),
            ],
            Some(Target::new(
                "isFraud",
                vec![Class::Negative, Class::Negative, Class::Positive, Class::Negative],
            )),
        )
        .unwrap()
    }

    #[test]
    fn test_class_from_probability() {
        assert_eq!(Class::from_probability(0.5), Class::Positive);
        assert_eq!(Class::from_probability(0.49), Class::Negative);
    }

    #[test]
    fn test_dataset_rejects_ragged_columns() {
        let result = Dataset::new(
            vec![
                Feature::numeric("a", vec![1.0, 2.0]),
                Feature::numeric("b", vec![1.0]),
            ],
            None,
        );
        assert!(matches!(result, Err(FraudlabError::ShapeError { .. })));
    }

    #[test]
    fn test_dataset_rejects_duplicate_names() {
        let result = Dataset::new(
            vec![Feature::numeric("a", vec![1.0]), Feature::numeric("a", vec![2.0])],
            None,
        );
        assert!(matches!(result, Err(FraudlabError::SchemaMismatch { .. })));
    }

    #[test]
    fn test_take_and_counts() {
        let data = sample();
        let subset = data.take(&[2, 0]).unwrap();
        assert_eq!(subset.n_rows(), 2);
        assert_eq!(subset.numeric("amount").unwrap(), &[30.0, 10.0]);
        assert_eq!(subset.labels().unwrap(), &[Class::Positive, Class::Negative]);

        let counts = data.class_counts();
        assert_eq!(counts[&Class::Negative], 3);
        assert_eq!(counts[&Class::Positive], 1);
    }

    #[test]
    fn test_take_rejects_out_of_range_rows() {
        let data = sample();
        let err = data.take(&[0, 4]).unwrap_err();
        assert!(matches!(err, FraudlabError::ValidationError(ref msg) if msg.contains("row index 4")));
        assert_eq!(data.take(&[]).unwrap().n_rows(), 0);
    }

    #[test]
    fn test_schema_check() {
        let data = sample();
        let schema = data.schema();
        assert!(schema.check(&data).is_ok());

        let missing = data.drop_features(&["type".to_string()]);
        assert!(matches!(schema.check(&missing), Err(FraudlabError::SchemaMismatch { .. })));

        let extra = data.with_feature(Feature::numeric("step", vec![1.0; 4])).unwrap();
        assert!(schema.check(&extra).is_err());

        let retyped = data
            .with_feature(Feature::categorical("amount", vec!["x".into(); 4]))
            .unwrap();
        let err = schema.check(&retyped).unwrap_err();
        assert!(err.to_string().contains("expected numeric"));
    }

    #[test]
    fn test_numeric_matrix_requires_numeric() {
        let data = sample();
        assert!(data.numeric_matrix().is_err());
        let m = data.to_matrix(&["amount".to_string()]).unwrap();
        assert_eq!(m.shape(), &[4, 1]);
        assert_eq!(m[[3, 0]], 40.0);
    }

    #[test]
    fn test_to_dataframe_keeps_raw_labels() {
        let df = sample().to_dataframe().unwrap();
        assert_eq!(df.width(), 3);
        let labels = df.column("isFraud").unwrap().str().unwrap();
        assert_eq!(labels.get(2), Some("1"));
    }
}
