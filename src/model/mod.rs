//! Model specifications and fitted models
//!
//! A [`ModelSpec`] declares an algorithm family, its hyperparameters, the
//! computational engine and the task mode, without reference to any data.
//! Hyperparameters may be fixed or left open for tuning; only a spec with
//! every value fixed can be fitted.

mod decision_tree;
mod linear_models;

pub use decision_tree::{DecisionTree, TreeNode};
pub use linear_models::LogisticRegression;

use crate::data::Class;
use crate::error::{FraudlabError, Result};
use crate::tuning::{ParamConfig, ParamRange};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    LogisticRegression,
    DecisionTree,
}

impl ModelFamily {
    pub fn name(self) -> &'static str {
        match self {
            ModelFamily::LogisticRegression => "logistic_reg",
            ModelFamily::DecisionTree => "decision_tree",
        }
    }

    /// Hyperparameters the family accepts
    pub fn params(self) -> &'static [HyperParam] {
        match self {
            ModelFamily::LogisticRegression => &[HyperParam::Penalty],
            ModelFamily::DecisionTree => &[HyperParam::CostComplexity, HyperParam::TreeDepth, HyperParam::MinN],
        }
    }

    pub fn default_engine(self) -> Engine {
        match self {
            ModelFamily::LogisticRegression => Engine::GradientDescent,
            ModelFamily::DecisionTree => Engine::Cart,
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Computational backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    GradientDescent,
    Cart,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    Classification,
    Regression,
}

/// Tunable hyperparameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HyperParam {
    /// L2 penalty of logistic regression
    Penalty,
    /// Complexity penalty of the tree
    CostComplexity,
    /// Maximum tree depth
    TreeDepth,
    /// Minimum rows in a node to split it
    MinN,
}

impl HyperParam {
    pub fn name(self) -> &'static str {
        match self {
            HyperParam::Penalty => "penalty",
            HyperParam::CostComplexity => "cost_complexity",
            HyperParam::TreeDepth => "tree_depth",
            HyperParam::MinN => "min_n",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, HyperParam::TreeDepth | HyperParam::MinN)
    }

    /// Default search range
    pub fn default_range(self) -> ParamRange {
        match self {
            HyperParam::Penalty => ParamRange::log10(self, -10.0, 0.0),
            HyperParam::CostComplexity => ParamRange::log10(self, -10.0, -1.0),
            HyperParam::TreeDepth => ParamRange::linear(self, 1.0, 15.0),
            HyperParam::MinN => ParamRange::linear(self, 2.0, 40.0),
        }
    }

    /// Whether a larger value gives a simpler model
    pub fn larger_is_simpler(self) -> bool {
        !matches!(self, HyperParam::TreeDepth)
    }

    pub fn validate(self, value: f64) -> Result<()> {
        let ok = value.is_finite()
            && match self {
                HyperParam::Penalty | HyperParam::CostComplexity => value >= 0.0,
                HyperParam::TreeDepth => value >= 1.0 && value.fract() == 0.0,
                HyperParam::MinN => value >= 2.0 && value.fract() == 0.0,
            };
        if ok {
            Ok(())
        } else {
            Err(FraudlabError::invalid_parameter(self.name(), value, "out of range"))
        }
    }
}

impl fmt::Display for HyperParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for HyperParam {
    type Err = FraudlabError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "penalty" => Ok(HyperParam::Penalty),
            "cost_complexity" => Ok(HyperParam::CostComplexity),
            "tree_depth" => Ok(HyperParam::TreeDepth),
            "min_n" => Ok(HyperParam::MinN),
            other => Err(FraudlabError::invalid_parameter("hyperparameter", other, "unknown name")),
        }
    }
}

/// A hyperparameter value, or a placeholder to be filled by tuning
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamSlot {
    Fixed(f64),
    Tune,
}

/// Declarative model description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub family: ModelFamily,
    pub engine: Engine,
    pub mode: Mode,
    pub params: BTreeMap<HyperParam, ParamSlot>,
}

impl ModelSpec {
    fn with_defaults(family: ModelFamily, defaults: &[(HyperParam, f64)]) -> Self {
        Self {
            family,
            engine: family.default_engine(),
            mode: Mode::Classification,
            params: defaults.iter().map(|&(p, v)| (p, ParamSlot::Fixed(v))).collect(),
        }
    }

    /// Logistic regression with no penalty
    pub fn logistic_reg() -> Self {
        Self::with_defaults(ModelFamily::LogisticRegression, &[(HyperParam::Penalty, 0.0)])
    }

    /// Classification tree with `cost_complexity = 0.01`, `tree_depth = 30`, `min_n = 2`
    pub fn decision_tree() -> Self {
        Self::with_defaults(
            ModelFamily::DecisionTree,
            &[
                (HyperParam::CostComplexity, 0.01),
                (HyperParam::TreeDepth, 30.0),
                (HyperParam::MinN, 2.0),
            ],
        )
    }

    fn check_param(&self, param: HyperParam) -> Result<()> {
        if self.family.params().contains(&param) {
            Ok(())
        } else {
            Err(FraudlabError::invalid_parameter(
                param.name(),
                self.family.name(),
                "not a hyperparameter of this model family",
            ))
        }
    }

    /// Fix a hyperparameter value
    pub fn set(mut self, param: HyperParam, value: f64) -> Result<Self> {
        self.check_param(param)?;
        param.validate(value)?;
        self.params.insert(param, ParamSlot::Fixed(value));
        Ok(self)
    }

    /// Mark a hyperparameter for tuning
    pub fn tune(mut self, param: HyperParam) -> Result<Self> {
        self.check_param(param)?;
        self.params.insert(param, ParamSlot::Tune);
        Ok(self)
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Parameters still marked for tuning, in a stable order
    pub fn tunable(&self) -> Vec<HyperParam> {
        self.params
            .iter()
            .filter(|(_, slot)| matches!(slot, ParamSlot::Tune))
            .map(|(p, _)| *p)
            .collect()
    }

    pub fn is_finalized(&self) -> bool {
        self.tunable().is_empty()
    }

    pub fn value(&self, param: HyperParam) -> Option<f64> {
        match self.params.get(&param) {
            Some(ParamSlot::Fixed(v)) => Some(*v),
            _ => None,
        }
    }

    /// Fill every tuning placeholder from `config`
    pub fn finalize(&self, config: &ParamConfig) -> Result<Self> {
        let mut spec = self.clone();
        for (&param, &value) in &config.values {
            match self.params.get(&param) {
                Some(ParamSlot::Tune) => {
                    param.validate(value)?;
                    spec.params.insert(param, ParamSlot::Fixed(value));
                }
                _ => {
                    return Err(FraudlabError::TuningError(format!(
                        "'{}' is not marked for tuning in {}",
                        param, self.family
                    )))
                }
            }
        }
        if let Some(missing) = spec.tunable().first() {
            return Err(FraudlabError::TuningError(format!("no value supplied for '{}'", missing)));
        }
        Ok(spec)
    }

    /// Check engine, mode and hyperparameter values
    pub fn validate(&self) -> Result<()> {
        if self.engine != self.family.default_engine() {
            return Err(FraudlabError::ConfigError(format!(
                "engine {:?} cannot fit {}",
                self.engine, self.family
            )));
        }
        if self.mode != Mode::Classification {
            return Err(FraudlabError::ConfigError(format!(
                "{} is only available for classification",
                self.family
            )));
        }
        for (&param, slot) in &self.params {
            self.check_param(param)?;
            if let ParamSlot::Fixed(v) = slot {
                param.validate(*v)?;
            }
        }
        Ok(())
    }

    fn fixed(&self, param: HyperParam) -> Result<f64> {
        match self.params.get(&param) {
            Some(ParamSlot::Fixed(v)) => Ok(*v),
            Some(ParamSlot::Tune) => Err(FraudlabError::TrainingError(format!(
                "'{}' is marked for tuning; finalize the model first",
                param
            ))),
            None => Err(FraudlabError::TrainingError(format!("'{}' has no value", param))),
        }
    }

    /// Train on a numeric design matrix
    pub fn fit(&self, x: &Array2<f64>, y: &[Class]) -> Result<FittedModel> {
        self.validate()?;
        let target: Array1<f64> = y.iter().map(|c| c.as_f64()).collect();

        match self.family {
            ModelFamily::LogisticRegression => {
                let mut model = LogisticRegression::new().with_penalty(self.fixed(HyperParam::Penalty)?);
                model.fit(x, &target)?;
                Ok(FittedModel::Logistic(model))
            }
            ModelFamily::DecisionTree => {
                let mut model = DecisionTree::new()
                    .with_cost_complexity(self.fixed(HyperParam::CostComplexity)?)
                    .with_max_depth(self.fixed(HyperParam::TreeDepth)? as usize)
                    .with_min_samples_split(self.fixed(HyperParam::MinN)? as usize);
                model.fit(x, &target)?;
                Ok(FittedModel::Tree(model))
            }
        }
    }

    /// Short human-readable description, e.g. `decision_tree(cost_complexity=0.01, ...)`
    pub fn describe(&self) -> String {
        let params: Vec<String> = self
            .params
            .iter()
            .map(|(p, slot)| match slot {
                ParamSlot::Fixed(v) => format!("{}={}", p, v),
                ParamSlot::Tune => format!("{}=tune()", p),
            })
            .collect();
        format!("{}({})", self.family, params.join(", "))
    }
}

/// A trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FittedModel {
    Logistic(LogisticRegression),
    Tree(DecisionTree),
}

impl FittedModel {
    fn n_features(&self) -> Option<usize> {
        match self {
            FittedModel::Logistic(m) => m.n_features(),
            FittedModel::Tree(m) => Some(m.n_features()),
        }
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<()> {
        match self.n_features() {
            Some(n) if n != x.ncols() => Err(FraudlabError::ShapeError {
                expected: format!("{} columns", n),
                actual: format!("{} columns", x.ncols()),
            }),
            _ => Ok(()),
        }
    }

    /// Positive-class scores
    pub fn positive_scores(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.check_width(x)?;
        match self {
            FittedModel::Logistic(m) => m.predict_proba(x),
            FittedModel::Tree(m) => m.predict_proba(x),
        }
    }

    /// Per-class probabilities, columns `[negative, positive]`; rows sum to 1
    pub fn predict_prob(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let p = self.positive_scores(x)?;
        Ok(Array2::from_shape_fn((p.len(), 2), |(i, j)| if j == 1 { p[i] } else { 1.0 - p[i] }))
    }

    pub fn predict_class(&self, x: &Array2<f64>) -> Result<Vec<Class>> {
        Ok(self.positive_scores(x)?.iter().map(|&p| Class::from_probability(p)).collect())
    }

    pub fn feature_importances(&self) -> Option<&[f64]> {
        match self {
            FittedModel::Tree(m) => m.feature_importances(),
            FittedModel::Logistic(_) => None,
        }
    }

    /// Drop training-only diagnostics
    pub fn strip(&mut self) {
        if let FittedModel::Tree(m) = self {
            m.clear_importances();
        }
    }
}
