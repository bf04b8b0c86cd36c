//! L2-penalised logistic regression

use crate::error::{FraudlabError, Result};
use ndarray::{s, Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

/// Smallest line-search step before the optimizer is considered stalled
const MIN_STEP: f64 = 1e-12;

/// Sufficient-decrease constant of the Armijo condition
const ARMIJO: f64 = 0.5;

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Binary logistic regression.
///
/// Minimises the mean negative log-likelihood plus `penalty / 2 * ||w||^2`
/// (the intercept is not penalised) by full-batch gradient descent with a
/// backtracking line search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub penalty: f64,
    /// Initial and largest line-search step
    pub step_size: f64,
    pub max_iterations: usize,
    /// Converged once the gradient norm falls below this
    pub tolerance: f64,
    pub coefficients: Option<Array1<f64>>,
    pub intercept: Option<f64>,
    /// Penalised objective at the fitted parameters
    pub objective: Option<f64>,
    pub iterations: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self::new()
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self {
            penalty: 0.0,
            step_size: 1.0,
            max_iterations: 1000,
            tolerance: 1e-6,
            coefficients: None,
            intercept: None,
            objective: None,
            iterations: 0,
        }
    }

    pub fn with_penalty(mut self, penalty: f64) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_step_size(mut self, step: f64) -> Self {
        self.step_size = step;
        self
    }

    pub fn with_max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = n;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Objective and gradient at `theta`, laid out as coefficients then intercept
    fn objective_and_gradient(&self, x: &Array2<f64>, y: &Array1<f64>, theta: &Array1<f64>) -> (f64, Array1<f64>) {
        let p = x.ncols();
        let n = x.nrows() as f64;
        let w: ArrayView1<f64> = theta.slice(s![..p]);
        let b = theta[p];

        let z = x.dot(&w) + b;
        let nll = z
            .iter()
            .zip(y.iter())
            .map(|(&zi, &yi)| softplus(zi) - yi * zi)
            .sum::<f64>()
            / n;
        let residual: Array1<f64> = z.iter().zip(y.iter()).map(|(&zi, &yi)| sigmoid(zi) - yi).collect();

        let mut gradient = Array1::zeros(p + 1);
        gradient
            .slice_mut(s![..p])
            .assign(&(x.t().dot(&residual) / n + self.penalty * &w));
        gradient[p] = residual.sum() / n;

        (nll + 0.5 * self.penalty * w.dot(&w), gradient)
    }

    /// Fit on a design matrix and 0/1 targets
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(FraudlabError::ShapeError {
                expected: format!("{} targets", x.nrows()),
                actual: format!("{} targets", y.len()),
            });
        }
        if x.nrows() == 0 {
            return Err(FraudlabError::TrainingError("cannot fit on an empty table".to_string()));
        }
        if !(self.step_size > 0.0 && self.step_size.is_finite()) {
            return Err(FraudlabError::invalid_parameter("step_size", self.step_size, "must be positive"));
        }

        let mut theta = Array1::zeros(x.ncols() + 1);
        let (mut loss, mut gradient) = self.objective_and_gradient(x, y, &theta);
        if !loss.is_finite() {
            return Err(FraudlabError::TrainingError(
                "logistic objective is not finite; check the inputs for NaN or infinite values".to_string(),
            ));
        }

        let mut step = self.step_size;
        let mut iterations = self.max_iterations;
        'descent: for iter in 0..self.max_iterations {
            let grad_sq = gradient.dot(&gradient);
            if grad_sq.sqrt() < self.tolerance {
                iterations = iter;
                break;
            }

            loop {
                let candidate = &theta - &(step * &gradient);
                let (c_loss, c_gradient) = self.objective_and_gradient(x, y, &candidate);
                if c_loss <= loss - ARMIJO * step * grad_sq {
                    theta = candidate;
                    loss = c_loss;
                    gradient = c_gradient;
                    step = (step * 2.0).min(self.step_size);
                    break;
                }
                step *= 0.5;
                if step < MIN_STEP {
                    iterations = iter;
                    break 'descent;
                }
            }
        }

        let p = x.ncols();
        self.coefficients = Some(theta.slice(s![..p]).to_owned());
        self.intercept = Some(theta[p]);
        self.objective = Some(loss);
        self.iterations = iterations;
        Ok(self)
    }

    pub fn is_fitted(&self) -> bool {
        self.coefficients.is_some()
    }

    pub fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(|c| c.len())
    }

    /// Positive-class probabilities
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let coefficients = self.coefficients.as_ref().ok_or(FraudlabError::ModelNotFitted)?;
        let intercept = self.intercept.unwrap_or(0.0);
        Ok((x.dot(coefficients) + intercept).mapv(sigmoid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_logistic_regression() {
        let x = array![
            [-2.0, -1.0],
            [-1.5, -2.0],
            [-1.0, -0.5],
            [1.0, 0.5],
            [1.5, 2.0],
            [2.0, 1.0],
        ];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.is_fitted());

        let proba = model.predict_proba(&x).unwrap();
        for (p, t) in proba.iter().zip(y.iter()) {
            assert_eq!((*p >= 0.5) as i32 as f64, *t);
        }
    }

    #[test]
    fn test_penalised_fit_reaches_stationary_point() {
        // overlapping classes so the penalised optimum is interior
        let x = array![[-1.0], [-0.5], [0.2], [-0.2], [0.5], [1.0]];
        let y = array![0.0, 0.0, 0.0, 1.0, 1.0, 1.0];

        let mut model = LogisticRegression::new().with_penalty(0.1).with_tolerance(1e-7);
        model.fit(&x, &y).unwrap();
        assert!(model.iterations < model.max_iterations);

        let theta = array![model.coefficients.as_ref().unwrap()[0], model.intercept.unwrap()];
        let (loss, gradient) = model.objective_and_gradient(&x, &y, &theta);
        assert!(gradient.dot(&gradient).sqrt() < 1e-7);
        assert!((loss - model.objective.unwrap()).abs() < 1e-12);

        // moving away from the optimum can only increase the objective
        for delta in [-0.1, 0.1] {
            let (moved, _) = model.objective_and_gradient(&x, &y, &(&theta + delta));
            assert!(moved > loss);
        }
    }

    #[test]
    fn test_penalty_shrinks_coefficients() {
        let x = array![[-1.0], [-0.5], [0.5], [1.0]];
        let y = array![0.0, 0.0, 1.0, 1.0];

        let mut loose = LogisticRegression::new();
        loose.fit(&x, &y).unwrap();
        let mut tight = LogisticRegression::new().with_penalty(1.0);
        tight.fit(&x, &y).unwrap();

        let w_loose = loose.coefficients.as_ref().unwrap()[0];
        let w_tight = tight.coefficients.as_ref().unwrap()[0];
        assert!(w_tight.abs() < w_loose.abs());
    }

    #[test]
    fn test_large_scores_stay_finite() {
        let x = array![[-1e4], [1e4]];
        let y = array![0.0, 1.0];
        let mut model = LogisticRegression::new();
        model.fit(&x, &y).unwrap();
        assert!(model.objective.unwrap().is_finite());
        assert!(model.predict_proba(&x).unwrap().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_rejects_non_finite_input() {
        let mut model = LogisticRegression::new();
        let err = model.fit(&array![[f64::NAN], [1.0]], &array![0.0, 1.0]).unwrap_err();
        assert!(matches!(err, FraudlabError::TrainingError(_)));
    }

    #[test]
    fn test_not_fitted() {
        let model = LogisticRegression::new();
        assert!(matches!(
            model.predict_proba(&array![[1.0]]),
            Err(FraudlabError::ModelNotFitted)
        ));
    }
}
