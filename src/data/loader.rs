//! CSV ingestion into typed record tables

use super::{Class, ClassLevels, ColumnKind, Dataset, Feature, Schema, Target};
use crate::error::{FraudlabError, Result};
use polars::prelude::*;
use std::collections::BTreeSet;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Reads delimited files into a [`Dataset`], inferring and validating column kinds
#[derive(Debug, Clone)]
pub struct DatasetLoader {
    /// Label column name
    target: String,
    /// Raw label value treated as the positive class
    positive_label: String,
    /// Columns discarded at load time (identifiers, leaky flags)
    drop_columns: Vec<String>,
    /// Predictor schema the file must match after dropping columns
    expected: Option<Vec<(String, ColumnKind)>>,
    /// Rows used by polars for dtype inference
    infer_schema_length: usize,
    separator: u8,
}

impl DatasetLoader {
    /// Create a loader for the given label column
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            positive_label: "1".to_string(),
            drop_columns: Vec::new(),
            expected: None,
            infer_schema_length: 1000,
            separator: b',',
        }
    }

    /// Loader preset for the mobile-money transaction fraud table
    pub fn fraud() -> Self {
        Self::new("isFraud")
            .drop_columns(["nameOrig", "nameDest", "isFlaggedFraud"])
            .expect_schema(vec![
                ("step".to_string(), ColumnKind::Numeric),
                ("type".to_string(), ColumnKind::Categorical),
                ("amount".to_string(), ColumnKind::Numeric),
                ("oldbalanceOrg".to_string(), ColumnKind::Numeric),
                ("newbalanceOrig".to_string(), ColumnKind::Numeric),
                ("oldbalanceDest".to_string(), ColumnKind::Numeric),
                ("newbalanceDest".to_string(), ColumnKind::Numeric),
            ])
    }

    /// Set the raw label value mapped to [`Class::Positive`]
    pub fn with_positive_label(mut self, label: impl Into<String>) -> Self {
        self.positive_label = label.into();
        self
    }

    /// Discard these columns when present
    pub fn drop_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.drop_columns.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Require exactly these predictor columns
    pub fn expect_schema(mut self, columns: Vec<(String, ColumnKind)>) -> Self {
        self.expected = Some(columns);
        self
    }

    pub fn with_infer_schema_length(mut self, rows: usize) -> Self {
        self.infer_schema_length = rows;
        self
    }

    pub fn with_separator(mut self, separator: u8) -> Self {
        self.separator = separator;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    /// Load a labelled table
    pub fn load_csv(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let df = self.read_frame(path.as_ref())?;
        self.from_dataframe(&df, true)
    }

    /// Load predictors only; a label column, if present, is ignored
    pub fn load_features(&self, path: impl AsRef<Path>) -> Result<Dataset> {
        let df = self.read_frame(path.as_ref())?;
        self.from_dataframe(&df, false)
    }

    fn read_frame(&self, path: &Path) -> Result<DataFrame> {
        let start = Instant::now();
        let df = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(self.infer_schema_length))
            .with_parse_options(CsvParseOptions::default().with_separator(self.separator))
            .try_into_reader_with_file_path(Some(path.to_path_buf()))?
            .finish()?;

        info!(
            path = %path.display(),
            rows = df.height(),
            columns = df.width(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Loaded CSV"
        );
        Ok(df)
    }

    /// Convert a polars frame. With `require_target` the label column must be present
    /// and binary; otherwise it is skipped.
    pub fn from_dataframe(&self, df: &DataFrame, require_target: bool) -> Result<Dataset> {
        let mut features = Vec::with_capacity(df.width());
        let mut target = None;

        for col in df.get_columns() {
            let name = col.name().to_string();
            if self.drop_columns.contains(&name) {
                debug!(column = %name, "Dropping column");
                continue;
            }
            if name == self.target && !require_target {
                continue;
            }
            if col.null_count() > 0 {
                return Err(FraudlabError::DataError(format!(
                    "column '{}' has {} missing value(s)",
                    name,
                    col.null_count()
                )));
            }
            if name == self.target {
                target = Some(self.parse_target(col)?);
                continue;
            }
            features.push(Self::parse_feature(&name, col)?);
        }

        if require_target && target.is_none() {
            return Err(FraudlabError::schema(&self.target, "target column is missing"));
        }

        let data = Dataset::new(features, target)?;
        if let Some(expected) = &self.expected {
            Schema::new(expected.clone()).check(&data)?;
        }
        Ok(data)
    }

    fn parse_feature(name: &str, col: &Column) -> Result<Feature> {
        match col.dtype() {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 |
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 |
            DataType::Float32 | DataType::Float64 | DataType::Boolean => {
                let casted = col.cast(&DataType::Float64)?;
                let values: Vec<f64> = casted.f64()?.into_no_null_iter().collect();
                if let Some(row) = values.iter().position(|v| !v.is_finite()) {
                    return Err(FraudlabError::DataError(format!(
                        "column '{}' has non-finite value {} at row {}",
                        name, values[row], row
                    )));
                }
                Ok(Feature::numeric(name, values))
            }
            DataType::String => {
                let values: Vec<String> = col.str()?.into_no_null_iter().map(str::to_string).collect();
                Ok(Feature::categorical(name, values))
            }
            other => Err(FraudlabError::schema(name, format!("unsupported column type {:?}", other))),
        }
    }

    fn parse_target(&self, col: &Column) -> Result<Target> {
        let raw = col.cast(&DataType::String)?;
        let values: Vec<&str> = raw.str()?.into_no_null_iter().collect();

        let distinct: BTreeSet<&str> = values.iter().copied().collect();
        if distinct.len() != 2 {
            return Err(FraudlabError::schema(
                &self.target,
                format!("label must have exactly two values, found {}", distinct.len()),
            ));
        }
        if !distinct.contains(self.positive_label.as_str()) {
            return Err(FraudlabError::schema(
                &self.target,
                format!("positive label '{}' not present", self.positive_label),
            ));
        }
        let negative = distinct
            .iter()
            .find(|v| **v != self.positive_label)
            .map(|v| v.to_string())
            .unwrap_or_default();

        let classes = values
            .iter()
            .map(|v| if *v == self.positive_label { Class::Positive } else { Class::Negative })
            .collect();

        Ok(Target::new(&self.target, classes).with_levels(ClassLevels::new(negative, &self.positive_label)))
    }
}

impl Default for DatasetLoader {
    fn default() -> Self {
        Self::fraud()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_csv(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const FRAUD_CSV: &str = "\
step,type,amount,nameOrig,oldbalanceOrg,newbalanceOrig,nameDest,oldbalanceDest,newbalanceDest,isFraud,isFlaggedFraud
1,PAYMENT,9839.64,C1231006815,170136.0,160296.36,M1979787155,0.0,0.0,0,0
1,TRANSFER,181.0,C1305486145,181.0,0.0,C553264065,0.0,0.0,1,0
1,CASH_OUT,181.0,C840083671,181.0,0.0,C38997010,21182.0,0.0,1,0
2,DEBIT,5337.77,C712410124,41720.0,36382.23,C195600860,41898.0,40348.79,0,0
";

    #[test]
    fn test_fraud_preset_loads_and_drops() {
        let file = write_csv(FRAUD_CSV);
        let data = DatasetLoader::fraud().load_csv(file.path()).unwrap();

        assert_eq!(data.n_rows(), 4);
        assert_eq!(data.n_cols(), 7);
        assert!(data.feature("nameOrig").is_err());
        assert_eq!(data.feature("type").unwrap().kind(), ColumnKind::Categorical);
        assert_eq!(data.feature("step").unwrap().kind(), ColumnKind::Numeric);
        assert_eq!(
            data.labels().unwrap(),
            &[Class::Negative, Class::Positive, Class::Positive, Class::Negative]
        );
        assert_eq!(data.target().unwrap().levels, ClassLevels::new("0", "1"));
    }

    #[test]
    fn test_label_must_be_binary() {
        let file = write_csv("x,y\n1.0,0\n2.0,1\n3.0,2\n");
        let err = DatasetLoader::new("y").load_csv(file.path()).unwrap_err();
        assert!(matches!(err, FraudlabError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_missing_target_is_schema_error() {
        let file = write_csv("x,z\n1.0,0\n2.0,1\n");
        let err = DatasetLoader::new("y").load_csv(file.path()).unwrap_err();
        assert!(err.to_string().contains("target column is missing"));
    }

    #[test]
    fn test_expected_schema_rejects_missing_column() {
        let file = write_csv("step,type,amount,isFraud\n1,PAYMENT,1.0,0\n2,DEBIT,2.0,1\n");
        let err = DatasetLoader::fraud().load_csv(file.path()).unwrap_err();
        assert!(matches!(err, FraudlabError::SchemaMismatch { .. }));
    }

    #[test]
    fn test_load_features_ignores_label() {
        let file = write_csv(FRAUD_CSV);
        let data = DatasetLoader::fraud().load_features(file.path()).unwrap();
        assert!(data.target().is_none());
        assert_eq!(data.n_cols(), 7);
    }

    #[test]
    fn test_non_finite_values_rejected() {
        let df = df!(
            "amount" => [1.0, 2.0, f64::NAN],
            "y" => [0i64, 1, 0]
        )
        .unwrap();
        let err = DatasetLoader::new("y").from_dataframe(&df, true).unwrap_err();
        assert!(matches!(err, FraudlabError::DataError(ref msg) if msg.contains("'amount'") && msg.contains("row 2")));

        let df = df!("amount" => [f64::INFINITY, 2.0]).unwrap();
        assert!(DatasetLoader::new("y").from_dataframe(&df, false).is_err());
    }

    #[test]
    fn test_blank_label_ignored_when_not_required() {
        let file = write_csv("x,y\n1.0,\n2.0,\n");
        let data = DatasetLoader::new("y").load_features(file.path()).unwrap();
        assert_eq!(data.n_rows(), 2);
        assert_eq!(data.column_names(), vec!["x"]);

        assert!(DatasetLoader::new("y").load_csv(file.path()).is_err());
    }

    #[test]
    fn test_nulls_rejected() {
        let file = write_csv("x,y\n1.0,0\n,1\n");
        let err = DatasetLoader::new("y").load_csv(file.path()).unwrap_err();
        assert!(matches!(err, FraudlabError::DataError(_)));
    }
}
