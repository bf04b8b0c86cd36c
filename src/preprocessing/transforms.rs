//! Logarithmic transform

use super::{Selector, Stage, Step, Transform};
use crate::data::{ColumnKind, Dataset, Feature};
use crate::error::{FraudlabError, Result};
use serde::{Deserialize, Serialize};

/// Replaces numeric columns with `log_base(x + offset)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogTransform {
    pub base: f64,
    pub offset: f64,
    pub selector: Selector,
}

impl LogTransform {
    pub fn new() -> Self {
        Self {
            base: 10.0,
            offset: 1.0,
            selector: Selector::AllNumeric,
        }
    }

    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    pub fn with_offset(mut self, offset: f64) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_selector(mut self, selector: Selector) -> Self {
        self.selector = selector;
        self
    }
}

impl Default for LogTransform {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedLog {
    pub columns: Vec<String>,
    pub base: f64,
    pub offset: f64,
}

impl FittedLog {
    fn log(&self, v: f64) -> f64 {
        if self.base == 10.0 {
            v.log10()
        } else {
            v.ln() / self.base.ln()
        }
    }
}

impl Step for LogTransform {
    type Params = FittedLog;

    fn fit(&self, reference: &Dataset) -> Result<FittedLog> {
        if !(self.base > 0.0 && self.base != 1.0 && self.base.is_finite()) {
            return Err(FraudlabError::invalid_parameter("base", self.base, "must be positive and not 1"));
        }
        if !self.offset.is_finite() {
            return Err(FraudlabError::invalid_parameter("offset", self.offset, "must be finite"));
        }
        Ok(FittedLog {
            columns: self.selector.resolve_kind(reference, ColumnKind::Numeric)?,
            base: self.base,
            offset: self.offset,
        })
    }
}

impl Transform for FittedLog {
    fn apply(&self, data: Dataset, _stage: Stage) -> Result<Dataset> {
        let mut features = data.features().to_vec();
        for name in &self.columns {
            let values = data.numeric(name)?;
            let mut out = Vec::with_capacity(values.len());
            for &x in values {
                let shifted = x + self.offset;
                if shifted <= 0.0 || !shifted.is_finite() {
                    return Err(FraudlabError::PreprocessingError(format!(
                        "log transform undefined for value {} in column '{}' (offset {})",
                        x, name, self.offset
                    )));
                }
                out.push(self.log(shifted));
            }
            if let Some(slot) = features.iter_mut().find(|f| &f.name == name) {
                *slot = Feature::numeric(name, out);
            }
        }
        data.with_features(features)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Dataset {
        Dataset::new(
            vec![
                Feature::numeric("amount", vec![0.0, 9.0, 99.0]),
                Feature::categorical("type", vec!["a".into(), "b".into(), "c".into()]),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_log10_with_offset() {
        let fitted = LogTransform::new().fit(&table()).unwrap();
        let out = fitted.apply(table(), Stage::New).unwrap();
        let v = out.numeric("amount").unwrap();
        assert!((v[0] - 0.0).abs() < 1e-12);
        assert!((v[1] - 1.0).abs() < 1e-12);
        assert!((v[2] - 2.0).abs() < 1e-12);
        assert_eq!(out.categorical("type").unwrap().len(), 3);
    }

    #[test]
    fn test_natural_base() {
        let fitted = LogTransform::new()
            .with_base(std::f64::consts::E)
            .with_offset(0.0)
            .with_selector(Selector::Columns(vec!["amount".into()]))
            .fit(&table())
            .unwrap();
        let data = Dataset::new(vec![Feature::numeric("amount", vec![1.0])], None).unwrap();
        let data = data
            .with_feature(Feature::categorical("type", vec!["a".into()]))
            .unwrap();
        let out = fitted.apply(data, Stage::New).unwrap();
        assert!(out.numeric("amount").unwrap()[0].abs() < 1e-12);
    }

    #[test]
    fn test_domain_error() {
        let fitted = LogTransform::new().fit(&table()).unwrap();
        let bad = table()
            .with_feature(Feature::numeric("amount", vec![-1.0, 2.0, 3.0]))
            .unwrap();
        let err = fitted.apply(bad, Stage::New).unwrap_err();
        assert!(matches!(err, FraudlabError::PreprocessingError(_)));
    }

    #[test]
    fn test_invalid_base() {
        assert!(LogTransform::new().with_base(1.0).fit(&table()).is_err());
    }
}
