//! Psychometric function fitting for a single sentence
//!
//! # Algorithm
//!
//! 1. Fewer than [`min_snr_levels`](PsychometricFitter::min_snr_levels) distinct SNR
//!    levels → [`FitStatus::InsufficientData`]
//! 2. Identical mean correct rate at every level → [`FitStatus::DegenerateData`]
//! 3. Each point is expanded into
//!    [`trials_per_point`](PsychometricFitter::trials_per_point) binary trials, of which
//!    `round(rate × trials)` are successes
//! 4. A binomial logistic regression `P(snr) = 1 / (1 + exp(-(a + b·snr)))` is fitted by
//!    maximum likelihood with a ridge penalty on `b`, so steep sentences whose rates jump
//!    straight from 0 to 1 still get a finite estimate
//! 5. `|b|` below [`zero_slope_epsilon`](PsychometricFitter::zero_slope_epsilon) →
//!    [`FitStatus::ZeroSlope`]
//! 6. `snr_50 = -a / b`, `slope = b / 4 × 100` (%/dB at the inflection point)
//! 7. SNR-50 outside `[min level - margin, max level + margin]` is
//!    [`Validity::Extrapolated`]; otherwise it is graded by the fixed bands
//!
//! The trial expansion is deterministic, so identical points always give
//! bit-identical estimates.
//!
//! # Examples
//!
//! ```
//! use qsin_analysis::{aggregate::AggregatedPoint, fit::PsychometricFitter};
//!
//! let points = [(-10.0, 0.1), (-5.0, 0.3), (0.0, 0.5), (5.0, 0.7), (10.0, 0.9)]
//!     .map(|(snr_level, mean_correct_rate)| AggregatedPoint {
//!         snr_level,
//!         mean_correct_rate,
//!         count: 1,
//!     });
//! let result = PsychometricFitter::default().fit(&points);
//! assert!(result.status.is_success());
//! assert!(result.snr_50.unwrap().abs() < 0.5);
//! ```

use std::fmt;

use qsin_stats::logistic::{BinomialSample, LogisticModel, LogisticRegression};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{
    aggregate::{self, AggregatedPoint},
    observation::Observation,
    quality::{Band, FixedBands, Validity},
};

/// Outcome kind of a fit.
///
/// Serialized as its display string (`"Success"`, `"Error: <details>"`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_more::IsVariant)]
#[serde(into = "String", from = "String")]
pub enum FitStatus {
    Success,
    /// Fewer distinct SNR levels than required
    InsufficientData,
    /// Correct rate is the same at every level
    DegenerateData,
    /// Fitted coefficient too close to zero to locate the 50% point
    ZeroSlope,
    /// The solver failed
    Error(String),
}

const ERROR_PREFIX: &str = "Error: ";

impl fmt::Display for FitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => f.write_str("Success"),
            Self::InsufficientData => f.write_str("InsufficientData"),
            Self::DegenerateData => f.write_str("DegenerateData"),
            Self::ZeroSlope => f.write_str("ZeroSlope"),
            Self::Error(details) => write!(f, "{ERROR_PREFIX}{details}"),
        }
    }
}

impl From<FitStatus> for String {
    fn from(status: FitStatus) -> Self {
        status.to_string()
    }
}

impl From<String> for FitStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "Success" => Self::Success,
            "InsufficientData" => Self::InsufficientData,
            "DegenerateData" => Self::DegenerateData,
            "ZeroSlope" => Self::ZeroSlope,
            _ => match s.strip_prefix(ERROR_PREFIX) {
                Some(details) => Self::Error(details.to_owned()),
                None => Self::Error(s),
            },
        }
    }
}

/// SNR range tested for a sentence, widened by a margin on both sides.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnrEnvelope {
    pub min_tested: f64,
    pub max_tested: f64,
    pub margin: f64,
}

impl SnrEnvelope {
    /// Returns `None` when `points` is empty.
    #[must_use]
    pub fn of_points(points: &[AggregatedPoint], margin: f64) -> Option<Self> {
        let (min, max) = points.iter().fold(None, |acc: Option<(f64, f64)>, p| {
            Some(match acc {
                Some((min, max)) => (min.min(p.snr_level), max.max(p.snr_level)),
                None => (p.snr_level, p.snr_level),
            })
        })?;
        Some(Self {
            min_tested: min,
            max_tested: max,
            margin,
        })
    }

    #[must_use]
    pub fn band(&self) -> Band {
        Band::new(self.min_tested, self.max_tested).widen(self.margin)
    }

    #[must_use]
    pub fn contains(&self, snr: f64) -> bool {
        self.band().contains(snr)
    }
}

/// Result of fitting one sentence.
///
/// `snr_50`, `slope` and `validity` are present exactly when `status` is
/// [`FitStatus::Success`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub status: FitStatus,
    /// SNR in dB at which the fitted correct rate is 50%
    pub snr_50: Option<f64>,
    /// Slope at SNR-50 in %/dB
    pub slope: Option<f64>,
    pub validity: Option<Validity>,
    /// Fitted intercept and coefficient
    pub model: Option<LogisticModel>,
    pub envelope: Option<SnrEnvelope>,
    /// Aggregated points the fit was computed from
    pub points: Vec<AggregatedPoint>,
}

impl FitResult {
    fn unsuccessful(
        status: FitStatus,
        points: &[AggregatedPoint],
        model: Option<LogisticModel>,
    ) -> Self {
        Self {
            status,
            snr_50: None,
            slope: None,
            validity: None,
            model,
            envelope: None,
            points: points.to_vec(),
        }
    }
}

/// Fits psychometric functions to aggregated sentence data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsychometricFitter {
    /// Synthetic binary trials per aggregated point
    pub trials_per_point: u32,
    /// Minimum number of distinct SNR levels for a fit
    pub min_snr_levels: usize,
    /// Coefficients with a smaller magnitude are treated as flat
    pub zero_slope_epsilon: f64,
    /// dB added on both sides of the tested range before an SNR-50 counts as extrapolated
    pub envelope_margin_db: f64,
    pub bands: FixedBands,
    pub regression: LogisticRegression,
}

impl Default for PsychometricFitter {
    fn default() -> Self {
        Self {
            trials_per_point: 100,
            min_snr_levels: 3,
            zero_slope_epsilon: 1e-6,
            envelope_margin_db: 5.0,
            bands: FixedBands::default(),
            regression: LogisticRegression::default(),
        }
    }
}

impl PsychometricFitter {
    /// Aggregates the observations of one sentence and fits them.
    ///
    /// # Panics
    ///
    /// Panics if the observations belong to more than one sentence.
    #[must_use]
    pub fn fit_observations<'a, I>(&self, observations: I) -> FitResult
    where
        I: IntoIterator<Item = &'a Observation>,
    {
        self.fit(&aggregate::aggregate(observations))
    }

    #[must_use]
    pub fn fit(&self, points: &[AggregatedPoint]) -> FitResult {
        if count_levels(points) < self.min_snr_levels {
            return FitResult::unsuccessful(FitStatus::InsufficientData, points, None);
        }

        let (min_rate, max_rate) = points
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
                (lo.min(p.mean_correct_rate), hi.max(p.mean_correct_rate))
            });
        if min_rate == max_rate {
            return FitResult::unsuccessful(FitStatus::DegenerateData, points, None);
        }

        let samples = points
            .iter()
            .map(|p| {
                BinomialSample::new(
                    p.snr_level,
                    successes(p.mean_correct_rate, self.trials_per_point),
                    self.trials_per_point,
                )
            })
            .collect::<Vec<_>>();

        let fit = match self.regression.fit(&samples) {
            Ok(fit) => fit,
            Err(e) => {
                warn!(error = %e, levels = points.len(), "logistic fit failed");
                return FitResult::unsuccessful(FitStatus::Error(e.to_string()), points, None);
            }
        };
        let model = fit.model;
        debug!(
            intercept = model.intercept,
            coefficient = model.coefficient,
            iterations = fit.iterations,
            "logistic fit converged"
        );

        if model.coefficient.abs() < self.zero_slope_epsilon {
            return FitResult::unsuccessful(FitStatus::ZeroSlope, points, Some(model));
        }

        let snr_50 = -model.intercept / model.coefficient;
        let slope = model.max_slope() * 100.0;
        if !snr_50.is_finite() || !slope.is_finite() {
            let status =
                FitStatus::Error(format!("non-finite estimate (snr_50={snr_50}, slope={slope})"));
            return FitResult::unsuccessful(status, points, Some(model));
        }

        let envelope = SnrEnvelope::of_points(points, self.envelope_margin_db);
        let validity = match envelope {
            Some(envelope) if !envelope.contains(snr_50) => Validity::Extrapolated,
            _ => self.bands.grade(snr_50),
        };

        FitResult {
            status: FitStatus::Success,
            snr_50: Some(snr_50),
            slope: Some(slope),
            validity: Some(validity),
            model: Some(model),
            envelope,
            points: points.to_vec(),
        }
    }
}

fn count_levels(points: &[AggregatedPoint]) -> usize {
    let mut levels = points.iter().map(|p| p.snr_level + 0.0).collect::<Vec<_>>();
    levels.sort_by(f64::total_cmp);
    levels.dedup();
    levels.len()
}

#[expect(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn successes(rate: f64, trials: u32) -> u32 {
    (rate.clamp(0.0, 1.0) * f64::from(trials)).round() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(data: &[(f64, f64)]) -> Vec<AggregatedPoint> {
        data.iter()
            .map(|&(snr_level, mean_correct_rate)| AggregatedPoint {
                snr_level,
                mean_correct_rate,
                count: 1,
            })
            .collect()
    }

    /// Rates 0.1..0.9 on a 5 dB grid centered at `center`.
    fn shifted(center: f64) -> Vec<AggregatedPoint> {
        let rates = [0.1, 0.3, 0.5, 0.7, 0.9];
        let data = rates
            .iter()
            .zip([-10.0, -5.0, 0.0, 5.0, 10.0])
            .map(|(&rate, offset)| (center + offset, rate))
            .collect::<Vec<_>>();
        points(&data)
    }

    #[test]
    fn test_symmetric_scenario() {
        let result = PsychometricFitter::default().fit(&shifted(0.0));
        assert_eq!(result.status, FitStatus::Success);
        let snr_50 = result.snr_50.unwrap();
        assert!(snr_50.abs() < 0.5);
        assert!(result.slope.unwrap() > 0.0);
        // 0 dB lies in the Acceptable band but not the Ideal band
        assert_eq!(result.validity, Some(Validity::Acceptable));
        assert_eq!(result.points.len(), 5);
    }

    #[test]
    fn test_validity_bands() {
        let fitter = PsychometricFitter::default();
        for (center, expected) in [
            (2.0, Validity::Ideal),
            (4.0, Validity::Acceptable),
            (8.0, Validity::Warning),
        ] {
            let result = fitter.fit(&shifted(center));
            assert!((result.snr_50.unwrap() - center).abs() < 1e-6);
            assert_eq!(result.validity, Some(expected), "center {center}");
        }
    }

    #[test]
    fn test_extrapolated() {
        // samples of a curve centered at 20 dB, tested only in [-10, 10]
        let data = [(-10.0, 0.0), (-5.0, 0.01), (0.0, 0.02), (5.0, 0.05), (10.0, 0.12)];
        let result = PsychometricFitter::default().fit(&points(&data));
        assert_eq!(result.status, FitStatus::Success);
        assert!(result.snr_50.unwrap() > 15.0);
        assert_eq!(result.validity, Some(Validity::Extrapolated));
        let envelope = result.envelope.unwrap();
        assert_eq!(envelope.band(), Band::new(-15.0, 15.0));
    }

    #[test]
    fn test_two_levels_insufficient() {
        let result = PsychometricFitter::default().fit(&points(&[(-5.0, 0.2), (5.0, 0.8)]));
        assert_eq!(result.status, FitStatus::InsufficientData);
        assert_eq!(result.snr_50, None);
        assert_eq!(result.slope, None);
        assert_eq!(result.validity, None);
        assert_eq!(result.points.len(), 2);
    }

    #[test]
    fn test_three_levels_fit() {
        let result =
            PsychometricFitter::default().fit(&points(&[(-10.0, 0.2), (0.0, 0.5), (10.0, 0.9)]));
        assert!(result.status.is_success());
    }

    #[test]
    fn test_empty_points() {
        let result = PsychometricFitter::default().fit(&[]);
        assert_eq!(result.status, FitStatus::InsufficientData);
        assert!(result.points.is_empty());
    }

    #[test]
    fn test_constant_rate_degenerate() {
        let data = [(-5.0, 0.7), (0.0, 0.7), (5.0, 0.7), (10.0, 0.7)];
        let result = PsychometricFitter::default().fit(&points(&data));
        assert_eq!(result.status, FitStatus::DegenerateData);
        assert_eq!(result.model, None);
    }

    #[test]
    fn test_zero_slope() {
        let data = [(-5.0, 0.3), (0.0, 0.7), (5.0, 0.3)];
        let result = PsychometricFitter::default().fit(&points(&data));
        assert_eq!(result.status, FitStatus::ZeroSlope);
        assert_eq!(result.snr_50, None);
        assert!(result.model.is_some());
    }

    #[test]
    fn test_steep_sentence_is_kept() {
        let data = [(-10.0, 0.0), (-5.0, 0.0), (0.0, 0.5), (5.0, 1.0), (10.0, 1.0)];
        let result = PsychometricFitter::default().fit(&points(&data));
        assert_eq!(result.status, FitStatus::Success);
        assert!(result.snr_50.unwrap().abs() < 1e-6);
        // far steeper than the 0.1..0.9 grid
        assert!(result.slope.unwrap() > 20.0);
        assert_eq!(result.validity, Some(Validity::Acceptable));
    }

    #[test]
    fn test_separated_data_is_finite() {
        let fitter = PsychometricFitter::default();
        for data in [
            vec![(-5.0, 0.0), (0.0, 0.0), (5.0, 1.0)],
            vec![(-10.0, 0.0), (0.0, 0.99), (10.0, 1.0)],
            vec![(0.0, 0.0), (5.0, 0.0), (10.0, 1.0), (15.0, 1.0), (20.0, 1.0)],
        ] {
            let result = fitter.fit(&points(&data));
            assert!(result.status.is_success(), "{data:?}: {}", result.status);
            let envelope = result.envelope.unwrap();
            assert!(envelope.min_tested < result.snr_50.unwrap());
            assert!(result.snr_50.unwrap() < envelope.max_tested);
        }
    }

    #[test]
    fn test_unpenalized_separated_data_is_error() {
        let fitter = PsychometricFitter {
            regression: LogisticRegression {
                l2_penalty: 0.0,
                ..LogisticRegression::default()
            },
            ..PsychometricFitter::default()
        };
        let data = [(-5.0, 0.0), (0.0, 0.0), (5.0, 1.0)];
        let result = fitter.fit(&points(&data));
        assert!(result.status.is_error());
        assert!(result.status.to_string().starts_with("Error: "));
        assert_eq!(result.snr_50, None);
        assert_eq!(result.validity, None);
    }

    #[test]
    fn test_deterministic() {
        let fitter = PsychometricFitter::default();
        let data = points(&[(-10.0, 0.15), (-5.0, 0.22), (0.0, 0.61), (5.0, 0.64), (10.0, 0.97)]);
        let a = fitter.fit(&data);
        let b = fitter.fit(&data);
        assert_eq!(a.snr_50.unwrap().to_bits(), b.snr_50.unwrap().to_bits());
        assert_eq!(a.slope.unwrap().to_bits(), b.slope.unwrap().to_bits());
    }

    #[test]
    fn test_status_string_round_trip() {
        for status in [
            FitStatus::Success,
            FitStatus::InsufficientData,
            FitStatus::DegenerateData,
            FitStatus::ZeroSlope,
            FitStatus::Error("solver did not converge".to_owned()),
        ] {
            let s = String::from(status.clone());
            assert_eq!(FitStatus::from(s), status);
        }
        let json = serde_json::to_string(&FitStatus::Error("boom".to_owned())).unwrap();
        assert_eq!(json, r#""Error: boom""#);
    }
}
