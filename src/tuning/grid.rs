//! Parameter ranges and candidate grids

use crate::error::{FraudlabError, Result};
use crate::model::HyperParam;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;

/// Scale on which a range is spaced or sampled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scale {
    Linear,
    /// Bounds are exponents of ten
    Log10,
}

/// Search range of one hyperparameter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamRange {
    pub param: HyperParam,
    /// Lower bound on the transformed scale
    pub lower: f64,
    /// Upper bound on the transformed scale
    pub upper: f64,
    pub scale: Scale,
}

impl ParamRange {
    pub fn linear(param: HyperParam, lower: f64, upper: f64) -> Self {
        Self {
            param,
            lower,
            upper,
            scale: Scale::Linear,
        }
    }

    pub fn log10(param: HyperParam, lower: f64, upper: f64) -> Self {
        Self {
            param,
            lower,
            upper,
            scale: Scale::Log10,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.lower.is_finite() || !self.upper.is_finite() || self.lower > self.upper {
            return Err(FraudlabError::TuningError(format!(
                "invalid range [{}, {}] for '{}'",
                self.lower, self.upper, self.param
            )));
        }
        Ok(())
    }

    /// Map a transformed-scale value back to a parameter value
    fn natural(&self, t: f64) -> f64 {
        let v = match self.scale {
            Scale::Linear => t,
            Scale::Log10 => 10f64.powf(t),
        };
        if self.param.is_integer() {
            v.round()
        } else {
            v
        }
    }

    /// `n` evenly spaced values; integer parameters are rounded and de-duplicated
    pub fn levels(&self, n: usize) -> Vec<f64> {
        let raw: Vec<f64> = if n == 1 {
            vec![self.natural((self.lower + self.upper) / 2.0)]
        } else {
            let step = (self.upper - self.lower) / (n - 1) as f64;
            (0..n).map(|i| self.natural(self.lower + step * i as f64)).collect()
        };

        let mut values: Vec<f64> = Vec::with_capacity(raw.len());
        for v in raw {
            if !values.iter().any(|&u| u == v) {
                values.push(v);
            }
        }
        values
    }

    /// Uniform draw on the transformed scale
    pub fn sample<R: Rng>(&self, rng: &mut R) -> f64 {
        let t = if self.lower == self.upper {
            self.lower
        } else {
            rng.gen_range(self.lower..=self.upper)
        };
        self.natural(t)
    }
}

/// One candidate hyperparameter assignment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamConfig {
    pub id: String,
    pub values: BTreeMap<HyperParam, f64>,
}

impl ParamConfig {
    pub fn new(id: impl Into<String>, values: impl IntoIterator<Item = (HyperParam, f64)>) -> Self {
        Self {
            id: id.into(),
            values: values.into_iter().collect(),
        }
    }

    pub fn get(&self, param: HyperParam) -> Option<f64> {
        self.values.get(&param).copied()
    }

    pub fn params(&self) -> Vec<HyperParam> {
        self.values.keys().copied().collect()
    }

    fn key(&self) -> Vec<(HyperParam, u64)> {
        self.values.iter().map(|(&p, v)| (p, v.to_bits())).collect()
    }
}

impl fmt::Display for ParamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let values: Vec<String> = self.values.iter().map(|(p, v)| format!("{}={}", p, v)).collect();
        write!(f, "{} [{}]", self.id, values.join(", "))
    }
}

pub(crate) fn config_id(i: usize, n: usize) -> String {
    let width = n.to_string().len().max(2);
    format!("Model{:0width$}", i + 1, width = width)
}

/// Candidate configurations evaluated by the tuner
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TuningGrid {
    configs: Vec<ParamConfig>,
}

fn check_ranges(ranges: &[ParamRange]) -> Result<()> {
    if ranges.is_empty() {
        return Err(FraudlabError::TuningError("no parameter ranges given".to_string()));
    }
    let mut seen = BTreeSet::new();
    for r in ranges {
        r.validate()?;
        if !seen.insert(r.param) {
            return Err(FraudlabError::TuningError(format!("'{}' has more than one range", r.param)));
        }
    }
    Ok(())
}

impl TuningGrid {
    /// Full cross product of `levels` values per range
    pub fn regular(ranges: &[ParamRange], levels: usize) -> Result<Self> {
        if levels == 0 {
            return Err(FraudlabError::invalid_parameter("levels", levels, "must be at least 1"));
        }
        check_ranges(ranges)?;

        let mut rows: Vec<Vec<(HyperParam, f64)>> = vec![Vec::new()];
        for range in ranges {
            let values = range.levels(levels);
            rows = rows
                .into_iter()
                .flat_map(|row| {
                    values.iter().map(move |&v| {
                        let mut next = row.clone();
                        next.push((range.param, v));
                        next
                    })
                })
                .collect();
        }
        Ok(Self::assign_ids(rows))
    }

    /// `size` uniform draws on each range's transformed scale
    ///
    /// Duplicate draws are discarded, so integer-only grids may come back
    /// with fewer than `size` candidates.
    pub fn random(ranges: &[ParamRange], size: usize, seed: u64) -> Result<Self> {
        if size == 0 {
            return Err(FraudlabError::invalid_parameter("size", size, "must be at least 1"));
        }
        check_ranges(ranges)?;

        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        let rows = (0..size)
            .map(|_| ranges.iter().map(|r| (r.param, r.sample(&mut rng))).collect())
            .collect();
        Ok(Self::assign_ids(rows))
    }

    /// Grid from explicit configurations; every one must set the same parameters
    pub fn from_configs(configs: Vec<ParamConfig>) -> Result<Self> {
        let first = configs
            .first()
            .ok_or_else(|| FraudlabError::TuningError("grid has no candidates".to_string()))?
            .params();
        let mut ids = HashSet::new();
        for c in &configs {
            if c.params() != first {
                return Err(FraudlabError::TuningError(format!(
                    "candidate '{}' does not set the same parameters as the rest of the grid",
                    c.id
                )));
            }
            if !ids.insert(c.id.clone()) {
                return Err(FraudlabError::TuningError(format!("duplicate candidate id '{}'", c.id)));
            }
            for (&p, &v) in &c.values {
                p.validate(v)?;
            }
        }
        Ok(Self { configs })
    }

    fn assign_ids(rows: Vec<Vec<(HyperParam, f64)>>) -> Self {
        let mut seen = HashSet::new();
        let unique: Vec<ParamConfig> = rows
            .into_iter()
            .map(|row| ParamConfig::new("", row))
            .filter(|c| seen.insert(c.key()))
            .collect();
        let n = unique.len();
        let configs = unique
            .into_iter()
            .enumerate()
            .map(|(i, mut c)| {
                c.id = config_id(i, n);
                c
            })
            .collect();
        Self { configs }
    }

    pub fn configs(&self) -> &[ParamConfig] {
        &self.configs
    }

    /// Parameters every candidate sets
    pub fn params(&self) -> Vec<HyperParam> {
        self.configs.first().map(|c| c.params()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regular_grid_cross_product() {
        let grid = TuningGrid::regular(
            &[
                HyperParam::CostComplexity.default_range(),
                HyperParam::TreeDepth.default_range(),
            ],
            3,
        )
        .unwrap();
        assert_eq!(grid.len(), 9);
        assert_eq!(grid.configs()[0].id, "Model01");
        assert_eq!(grid.configs()[8].id, "Model09");
        assert_eq!(grid.params(), vec![HyperParam::CostComplexity, HyperParam::TreeDepth]);

        let cps: BTreeSet<u64> = grid
            .configs()
            .iter()
            .map(|c| c.get(HyperParam::CostComplexity).unwrap().to_bits())
            .collect();
        assert_eq!(cps.len(), 3);
        let depths: Vec<f64> = grid.configs()[..3]
            .iter()
            .map(|c| c.get(HyperParam::TreeDepth).unwrap())
            .collect();
        assert_eq!(depths, vec![1.0, 8.0, 15.0]);
    }

    #[test]
    fn test_log_scale_levels() {
        let values = ParamRange::log10(HyperParam::CostComplexity, -10.0, -1.0).levels(4);
        let expected = [1e-10, 1e-7, 1e-4, 1e-1];
        for (v, e) in values.iter().zip(expected) {
            assert!((v / e - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_integer_levels_deduplicated() {
        let values = ParamRange::linear(HyperParam::TreeDepth, 1.0, 2.0).levels(5);
        assert_eq!(values, vec![1.0, 2.0]);
    }

    #[test]
    fn test_random_grid_reproducible() {
        let ranges = [
            HyperParam::CostComplexity.default_range(),
            HyperParam::MinN.default_range(),
        ];
        let a = TuningGrid::random(&ranges, 10, 7).unwrap();
        let b = TuningGrid::random(&ranges, 10, 7).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 10);
        for c in a.configs() {
            let cp = c.get(HyperParam::CostComplexity).unwrap();
            assert!(cp > 0.0 && cp <= 0.1 + 1e-12);
            let min_n = c.get(HyperParam::MinN).unwrap();
            assert_eq!(min_n, min_n.round());
            assert!((2.0..=40.0).contains(&min_n));
        }
    }

    #[test]
    fn test_invalid_grids() {
        let depth = HyperParam::TreeDepth.default_range();
        assert!(TuningGrid::regular(&[depth, depth], 2).is_err());
        assert!(TuningGrid::regular(&[depth], 0).is_err());
        assert!(TuningGrid::regular(&[ParamRange::linear(HyperParam::TreeDepth, 5.0, 1.0)], 2).is_err());
        assert!(TuningGrid::from_configs(vec![]).is_err());

        let mixed = vec![
            ParamConfig::new("a", [(HyperParam::TreeDepth, 3.0)]),
            ParamConfig::new("b", [(HyperParam::MinN, 3.0)]),
        ];
        assert!(matches!(TuningGrid::from_configs(mixed), Err(FraudlabError::TuningError(_))));
    }
}
