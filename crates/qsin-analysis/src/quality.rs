//! Sentence quality grading from SNR-50 estimates
//!
//! A [`ValidityPolicy`] turns an SNR-50 estimate into a [`Validity`] grade.
//! Three policies are provided:
//!
//! | policy            | Ideal                      | Acceptable                        |
//! |-------------------|----------------------------|-----------------------------------|
//! | [`FixedBands`]    | `[0.5, 3.5]` dB            | `[-1.0, 5.0]` dB                  |
//! | [`QuartileBands`] | `[Q1, Q3]`                 | `[Q1 - 0.5·IQR, Q3 + 0.5·IQR]`    |
//! | [`MeanStdBands`]  | `[μ - 0.5σ, μ + 0.5σ]`     | `[μ - σ, μ + σ]`                  |
//!
//! Everything outside the Acceptable band is a Warning. The adaptive policies
//! read the batch distribution from a [`BatchContext`].
//!
//! [`Validity::Extrapolated`] is decided by the fitter from the tested SNR
//! envelope and is never produced or overridden by a policy.

use serde::{Deserialize, Serialize};

use qsin_stats::{descriptive::DescriptiveStats, percentiles::Quartiles};

use crate::batch::{AnalysisReport, SentenceSummary};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::IsVariant,
)]
pub enum Validity {
    Ideal,
    Acceptable,
    Warning,
    /// SNR-50 lies outside the tested SNR range widened by the envelope margin
    Extrapolated,
}

/// Closed dB interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub low: f64,
    pub high: f64,
}

impl Band {
    #[must_use]
    pub const fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    #[must_use]
    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    #[must_use]
    pub fn widen(&self, amount: f64) -> Self {
        Self::new(self.low - amount, self.high + amount)
    }
}

/// Distribution of the SNR-50 estimates of the current batch.
#[derive(Debug, Clone, Default)]
pub struct BatchContext {
    pub stats: Option<DescriptiveStats>,
    pub quartiles: Option<Quartiles>,
}

impl BatchContext {
    #[must_use]
    pub fn from_estimates(estimates: &[f64]) -> Self {
        Self {
            stats: DescriptiveStats::new(estimates.iter().copied()),
            quartiles: Quartiles::new(estimates),
        }
    }

    /// Builds the context from the non-extrapolated sentences of a batch.
    #[must_use]
    pub fn from_summaries(summaries: &[SentenceSummary]) -> Self {
        let estimates = summaries
            .iter()
            .filter(|s| !s.validity.is_extrapolated())
            .map(|s| s.snr_50)
            .collect::<Vec<_>>();
        Self::from_estimates(&estimates)
    }
}

pub trait ValidityPolicy: Send + Sync {
    /// Grades an SNR-50 estimate that lies inside its tested envelope.
    fn classify(&self, snr_50: f64, context: &BatchContext) -> Validity;
}

fn grade(snr_50: f64, ideal: Band, acceptable: Band) -> Validity {
    if ideal.contains(snr_50) {
        Validity::Ideal
    } else if acceptable.contains(snr_50) {
        Validity::Acceptable
    } else {
        Validity::Warning
    }
}

/// Fixed dB bands around the target SNR-50 of the test.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixedBands {
    pub ideal: Band,
    pub acceptable: Band,
}

impl Default for FixedBands {
    fn default() -> Self {
        Self {
            ideal: Band::new(0.5, 3.5),
            acceptable: Band::new(-1.0, 5.0),
        }
    }
}

impl FixedBands {
    #[must_use]
    pub fn grade(&self, snr_50: f64) -> Validity {
        grade(snr_50, self.ideal, self.acceptable)
    }
}

impl ValidityPolicy for FixedBands {
    fn classify(&self, snr_50: f64, _context: &BatchContext) -> Validity {
        self.grade(snr_50)
    }
}

/// Bands from the quartiles of the batch.
///
/// Falls back to the default [`FixedBands`] when the batch is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuartileBands {
    /// Multiple of the IQR added on each side of `[Q1, Q3]` for Acceptable
    pub acceptable_iqr_factor: f64,
}

impl Default for QuartileBands {
    fn default() -> Self {
        Self {
            acceptable_iqr_factor: 0.5,
        }
    }
}

impl ValidityPolicy for QuartileBands {
    fn classify(&self, snr_50: f64, context: &BatchContext) -> Validity {
        let Some(q) = context.quartiles else {
            return FixedBands::default().grade(snr_50);
        };
        let ideal = Band::new(q.q1, q.q3);
        grade(snr_50, ideal, ideal.widen(self.acceptable_iqr_factor * q.iqr()))
    }
}

/// Bands at multiples of the batch standard deviation around the batch mean.
///
/// Falls back to the default [`FixedBands`] when the batch is empty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanStdBands {
    pub ideal_sigmas: f64,
    pub acceptable_sigmas: f64,
}

impl Default for MeanStdBands {
    fn default() -> Self {
        Self {
            ideal_sigmas: 0.5,
            acceptable_sigmas: 1.0,
        }
    }
}

impl ValidityPolicy for MeanStdBands {
    fn classify(&self, snr_50: f64, context: &BatchContext) -> Validity {
        let Some(stats) = &context.stats else {
            return FixedBands::default().grade(snr_50);
        };
        let center = Band::new(stats.mean, stats.mean);
        grade(
            snr_50,
            center.widen(self.ideal_sigmas * stats.std_dev),
            center.widen(self.acceptable_sigmas * stats.std_dev),
        )
    }
}

/// Names the grading scheme to apply to a report.
#[derive(
    Default,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::FromStr,
)]
#[serde(rename_all = "snake_case")]
pub enum ValidityScheme {
    #[default]
    Fixed,
    Quartile,
    Sigma,
}

/// Parameters of every grading scheme.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySettings {
    pub fixed: FixedBands,
    pub quartile: QuartileBands,
    pub sigma: MeanStdBands,
}

impl PolicySettings {
    #[must_use]
    pub fn policy(&self, scheme: ValidityScheme) -> &dyn ValidityPolicy {
        match scheme {
            ValidityScheme::Fixed => &self.fixed,
            ValidityScheme::Quartile => &self.quartile,
            ValidityScheme::Sigma => &self.sigma,
        }
    }
}

/// Grades every sentence of a batch with `policy`.
///
/// Extrapolated sentences keep their grade. Estimates are never modified.
#[must_use]
pub fn reclassify(summaries: &[SentenceSummary], policy: &dyn ValidityPolicy) -> Vec<Validity> {
    let context = BatchContext::from_summaries(summaries);
    summaries
        .iter()
        .map(|s| {
            if s.validity.is_extrapolated() {
                Validity::Extrapolated
            } else {
                policy.classify(s.snr_50, &context)
            }
        })
        .collect()
}

impl AnalysisReport {
    /// Returns a copy of the report graded with `policy`.
    #[must_use]
    pub fn with_policy(&self, policy: &dyn ValidityPolicy) -> Self {
        let grades = reclassify(&self.summaries, policy);
        let mut report = self.clone();
        for (summary, validity) in report.summaries.iter_mut().zip(grades) {
            summary.validity = validity;
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(sentence_id: u32, snr_50: f64, validity: Validity) -> SentenceSummary {
        SentenceSummary {
            sentence_id,
            full_sentence: String::new(),
            snr_50,
            slope: 5.0,
            validity,
            total_score_sum: 0.0,
            avg_score: 0.0,
            data_points: 5,
            snr_levels: 5,
        }
    }

    #[test]
    fn test_fixed_bands() {
        let bands = FixedBands::default();
        assert_eq!(bands.grade(2.0), Validity::Ideal);
        assert_eq!(bands.grade(0.5), Validity::Ideal);
        assert_eq!(bands.grade(3.5), Validity::Ideal);
        assert_eq!(bands.grade(4.0), Validity::Acceptable);
        assert_eq!(bands.grade(-1.0), Validity::Acceptable);
        assert_eq!(bands.grade(8.0), Validity::Warning);
        assert_eq!(bands.grade(-1.5), Validity::Warning);
    }

    #[test]
    fn test_quartile_bands() {
        // Q1 = 1.0, Q3 = 3.0, IQR = 2.0
        let context = BatchContext::from_estimates(&[0.0, 1.0, 2.0, 3.0, 4.0]);
        let policy = QuartileBands::default();
        assert_eq!(policy.classify(2.0, &context), Validity::Ideal);
        assert_eq!(policy.classify(3.5, &context), Validity::Acceptable);
        assert_eq!(policy.classify(0.5, &context), Validity::Acceptable);
        assert_eq!(policy.classify(-0.5, &context), Validity::Warning);
        assert_eq!(policy.classify(4.5, &context), Validity::Warning);
    }

    #[test]
    fn test_mean_std_bands() {
        // mean 5, population sigma 2
        let context = BatchContext::from_estimates(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        let policy = MeanStdBands::default();
        assert_eq!(policy.classify(5.5, &context), Validity::Ideal);
        assert_eq!(policy.classify(6.5, &context), Validity::Acceptable);
        assert_eq!(policy.classify(2.0, &context), Validity::Warning);
    }

    #[test]
    fn test_empty_context_falls_back_to_fixed() {
        let context = BatchContext::default();
        assert_eq!(QuartileBands::default().classify(2.0, &context), Validity::Ideal);
        assert_eq!(MeanStdBands::default().classify(8.0, &context), Validity::Warning);
    }

    #[test]
    fn test_reclassify_keeps_extrapolated() {
        let summaries = vec![
            summary(1, 10.0, Validity::Warning),
            summary(2, 11.0, Validity::Warning),
            summary(3, 12.0, Validity::Warning),
            summary(4, 40.0, Validity::Extrapolated),
        ];
        let settings = PolicySettings::default();
        for scheme in [ValidityScheme::Fixed, ValidityScheme::Quartile, ValidityScheme::Sigma] {
            let grades = reclassify(&summaries, settings.policy(scheme));
            assert_eq!(grades[3], Validity::Extrapolated);
        }
        // the extrapolated outlier does not shift the adaptive bands
        let grades = reclassify(&summaries, &QuartileBands::default());
        assert_eq!(grades[1], Validity::Ideal);
        assert_eq!(grades[2], Validity::Acceptable);
    }

    #[test]
    fn test_with_policy_preserves_estimates() {
        let report = AnalysisReport {
            summaries: vec![
                summary(1, 10.0, Validity::Warning),
                summary(2, 11.0, Validity::Warning),
                summary(3, 20.0, Validity::Extrapolated),
            ],
            failures: vec![],
        };
        let adaptive = report.with_policy(&MeanStdBands::default());
        let fixed = adaptive.with_policy(&FixedBands::default());
        for (a, b) in report.summaries.iter().zip(&adaptive.summaries) {
            assert_eq!(a.snr_50, b.snr_50);
            assert_eq!(a.slope, b.slope);
        }
        assert_eq!(adaptive.summaries[2].validity, Validity::Extrapolated);
        assert_eq!(fixed.summaries, report.summaries);
    }

    #[test]
    fn test_scheme_from_str() {
        assert_eq!("quartile".parse::<ValidityScheme>().ok(), Some(ValidityScheme::Quartile));
        assert_eq!("Sigma".parse::<ValidityScheme>().ok(), Some(ValidityScheme::Sigma));
        assert!("median".parse::<ValidityScheme>().is_err());
    }
}
