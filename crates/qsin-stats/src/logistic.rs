//! One-dimensional binomial logistic regression.
//!
//! This module fits `P(success | x) = 1 / (1 + exp(-(a + b·x)))` to grouped
//! binary outcomes by maximum likelihood.
//!
//! # Solver
//!
//! [`LogisticRegression::fit`] runs Newton–Raphson on the binomial
//! log-likelihood. Each Newton step is halved until the objective does not
//! decrease, so the iteration is monotone even from a poor start. The
//! iteration starts from the constant model (`b = 0`, `a = logit(p̄)`), which
//! makes the result a pure function of the input samples.
//!
//! The default ridge penalty of 1.0 on the coefficient keeps the estimate
//! finite for separated data (rates jumping from 0 to 1 between neighbouring
//! levels), which has no unpenalized maximum-likelihood estimate. With
//! [`l2_penalty`](LogisticRegression::l2_penalty) set to 0 such data fails
//! with [`FitError::Singular`] or [`FitError::NotConverged`].
//!
//! # Examples
//!
//! ```
//! use qsin_stats::logistic::{BinomialSample, LogisticRegression};
//!
//! let samples = [
//!     BinomialSample::new(-10.0, 10, 100),
//!     BinomialSample::new(-5.0, 30, 100),
//!     BinomialSample::new(0.0, 50, 100),
//!     BinomialSample::new(5.0, 70, 100),
//!     BinomialSample::new(10.0, 90, 100),
//! ];
//! let fit = LogisticRegression::default().fit(&samples).unwrap();
//! assert!(fit.model.intercept.abs() < 1e-9);
//! assert!(fit.model.coefficient > 0.0);
//! ```

use serde::{Deserialize, Serialize};

/// Logistic curve `P(x) = 1 / (1 + exp(-(intercept + coefficient·x)))`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticModel {
    pub intercept: f64,
    pub coefficient: f64,
}

impl LogisticModel {
    #[must_use]
    pub const fn new(intercept: f64, coefficient: f64) -> Self {
        Self {
            intercept,
            coefficient,
        }
    }

    #[must_use]
    pub fn linear_predictor(&self, x: f64) -> f64 {
        self.intercept + self.coefficient * x
    }

    /// Evaluates the curve at `x`.
    ///
    /// ```
    /// use qsin_stats::logistic::LogisticModel;
    ///
    /// let model = LogisticModel::new(-2.0, 1.0);
    /// assert!((model.probability(2.0) - 0.5).abs() < 1e-12);
    /// ```
    #[must_use]
    pub fn probability(&self, x: f64) -> f64 {
        sigmoid(self.linear_predictor(x))
    }

    /// The `x` at which the curve crosses 0.5 (`-intercept / coefficient`).
    ///
    /// Returns `None` for a flat curve.
    #[must_use]
    pub fn inflection(&self) -> Option<f64> {
        if self.coefficient == 0.0 {
            return None;
        }
        Some(-self.intercept / self.coefficient)
    }

    /// Derivative of the curve at its inflection point (`coefficient / 4`).
    #[must_use]
    pub fn max_slope(&self) -> f64 {
        self.coefficient / 4.0
    }
}

/// Numerically stable logistic function.
#[must_use]
pub fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + exp(z))` without overflow.
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Grouped binary outcomes observed at a single `x`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinomialSample {
    pub x: f64,
    pub successes: u32,
    pub trials: u32,
}

impl BinomialSample {
    #[must_use]
    pub const fn new(x: f64, successes: u32, trials: u32) -> Self {
        Self {
            x,
            successes,
            trials,
        }
    }
}

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum FitError {
    #[display("no trials to fit")]
    Empty,
    #[display("sample {index} has {successes} successes out of {trials} trials")]
    InvalidSample {
        index: usize,
        successes: u32,
        trials: u32,
    },
    #[display("information matrix became singular after {iterations} iterations")]
    Singular { iterations: usize },
    #[display("non-finite estimate after {iterations} iterations")]
    NonFinite { iterations: usize },
    #[display("solver did not converge within {iterations} iterations")]
    NotConverged { iterations: usize },
}

/// A converged maximum-likelihood fit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticFit {
    pub model: LogisticModel,
    /// Number of Newton iterations performed.
    pub iterations: usize,
    /// Penalized log-likelihood at the estimate.
    pub log_likelihood: f64,
}

/// Newton–Raphson solver settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegression {
    pub max_iterations: usize,
    /// Relative step size below which the iteration is considered converged.
    pub tolerance: f64,
    /// Ridge penalty on the coefficient (the intercept is never penalized),
    /// 0 for plain maximum likelihood
    pub l2_penalty: f64,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            l2_penalty: 1.0,
        }
    }
}

const MIN_STEP_SCALE: f64 = 1.0 / 1024.0;

/// Gradient and information matrix (negated Hessian) at one point.
struct Derivatives {
    grad: [f64; 2],
    info: [[f64; 2]; 2],
}

impl Derivatives {
    /// Solves `info · step = grad`, returning `None` if `info` is singular.
    fn newton_step(&self) -> Option<[f64; 2]> {
        let [[aa, ab], [_, bb]] = self.info;
        let det = aa * bb - ab * ab;
        if !det.is_finite() || det <= f64::EPSILON * aa * bb {
            return None;
        }
        let [ga, gb] = self.grad;
        Some([(bb * ga - ab * gb) / det, (aa * gb - ab * ga) / det])
    }
}

impl LogisticRegression {
    /// Fits the model to `samples` by penalized maximum likelihood.
    pub fn fit(&self, samples: &[BinomialSample]) -> Result<LogisticFit, FitError> {
        for (index, s) in samples.iter().enumerate() {
            if s.successes > s.trials || !s.x.is_finite() {
                return Err(FitError::InvalidSample {
                    index,
                    successes: s.successes,
                    trials: s.trials,
                });
            }
        }
        let total_trials = samples.iter().map(|s| f64::from(s.trials)).sum::<f64>();
        if total_trials == 0.0 {
            return Err(FitError::Empty);
        }
        let total_successes = samples.iter().map(|s| f64::from(s.successes)).sum::<f64>();
        let half = 0.5 / total_trials;
        let mean = (total_successes / total_trials).clamp(half, 1.0 - half);

        let mut model = LogisticModel::new((mean / (1.0 - mean)).ln(), 0.0);
        let mut objective = self.objective(samples, &model);

        for iterations in 1..=self.max_iterations {
            let derivatives = self.derivatives(samples, &model);
            let Some([da, db]) = derivatives.newton_step() else {
                return Err(FitError::Singular { iterations });
            };

            let mut scale = 1.0;
            let (candidate, candidate_objective) = loop {
                let candidate = LogisticModel::new(
                    model.intercept + scale * da,
                    model.coefficient + scale * db,
                );
                let value = self.objective(samples, &candidate);
                let slack = 1e-12 * objective.abs().max(1.0);
                if (value.is_finite() && value >= objective - slack) || scale <= MIN_STEP_SCALE {
                    break (candidate, value);
                }
                scale /= 2.0;
            };

            if !candidate.intercept.is_finite()
                || !candidate.coefficient.is_finite()
                || !candidate_objective.is_finite()
            {
                return Err(FitError::NonFinite { iterations });
            }

            let step = (scale * da).abs().max((scale * db).abs());
            let magnitude = candidate.intercept.abs().max(candidate.coefficient.abs());
            model = candidate;
            objective = candidate_objective;
            if step < self.tolerance * (1.0 + magnitude) {
                return Ok(LogisticFit {
                    model,
                    iterations,
                    log_likelihood: objective,
                });
            }
        }

        Err(FitError::NotConverged {
            iterations: self.max_iterations,
        })
    }

    fn objective(&self, samples: &[BinomialSample], model: &LogisticModel) -> f64 {
        let log_likelihood = samples
            .iter()
            .map(|s| {
                let eta = model.linear_predictor(s.x);
                let k = f64::from(s.successes);
                let n = f64::from(s.trials);
                -(k * softplus(-eta) + (n - k) * softplus(eta))
            })
            .sum::<f64>();
        log_likelihood - 0.5 * self.l2_penalty * model.coefficient.powi(2)
    }

    fn derivatives(&self, samples: &[BinomialSample], model: &LogisticModel) -> Derivatives {
        let mut grad = [0.0; 2];
        let mut info = [[0.0; 2]; 2];
        for s in samples {
            let p = model.probability(s.x);
            let n = f64::from(s.trials);
            let residual = f64::from(s.successes) - n * p;
            let weight = n * p * (1.0 - p);
            grad[0] += residual;
            grad[1] += s.x * residual;
            info[0][0] += weight;
            info[0][1] += weight * s.x;
            info[1][1] += weight * s.x * s.x;
        }
        grad[1] -= self.l2_penalty * model.coefficient;
        info[1][1] += self.l2_penalty;
        info[1][0] = info[0][1];
        Derivatives { grad, info }
    }
}
