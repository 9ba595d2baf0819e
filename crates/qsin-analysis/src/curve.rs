//! Psychometric curves rebuilt from report rows
//!
//! A [`SentenceSummary`] only keeps `(snr_50, slope)`. Those two numbers fully
//! determine the fitted logistic curve, so overlays of many sentences can be
//! drawn without the raw trials:
//!
//! ```text
//! b = slope / 100 × 4
//! a = -b × snr_50
//! P(snr) = 1 / (1 + exp(-(a + b·snr)))
//! ```
//!
//! # Examples
//!
//! ```
//! use qsin_analysis::curve;
//!
//! let model = curve::reconstruct(2.0, 12.5);
//! assert!((model.probability(2.0) - 0.5).abs() < 1e-12);
//! assert_eq!(model.coefficient, 0.5);
//! ```

use qsin_stats::logistic::LogisticModel;
use serde::{Deserialize, Serialize};

use crate::{
    batch::AnalysisReport,
    observation::{Observation, SentenceId},
    quality::Validity,
};

/// Rebuilds the logistic model that produced `snr_50` and `slope` (%/dB).
#[must_use]
pub fn reconstruct(snr_50: f64, slope: f64) -> LogisticModel {
    let coefficient = slope / 100.0 * 4.0;
    LogisticModel::new(-coefficient * snr_50, coefficient)
}

/// Closed SNR interval in dB to draw curves over.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SnrRange {
    pub min: f64,
    pub max: f64,
}

impl Default for SnrRange {
    fn default() -> Self {
        Self {
            min: -10.0,
            max: 20.0,
        }
    }
}

impl SnrRange {
    /// Range spanned by the SNR levels of `observations`, `None` when empty.
    #[must_use]
    pub fn of_observations(observations: &[Observation]) -> Option<Self> {
        let mut levels = observations.iter().map(|o| o.snr_level);
        let first = levels.next()?;
        let (min, max) = levels.fold((first, first), |(min, max), snr| (min.min(snr), max.max(snr)));
        Some(Self { min, max })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub snr: f64,
    pub probability: f64,
}

/// Evaluates `model` at `steps` evenly spaced SNRs covering `range` inclusively.
///
/// At least the two endpoints are always produced.
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn sample_curve(model: &LogisticModel, range: SnrRange, steps: usize) -> Vec<CurvePoint> {
    let steps = steps.max(2);
    let step = (range.max - range.min) / (steps - 1) as f64;
    (0..steps)
        .map(|i| {
            let snr = if i == steps - 1 {
                range.max
            } else {
                range.min + step * i as f64
            };
            CurvePoint {
                snr,
                probability: model.probability(snr),
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceCurve {
    pub sentence_id: SentenceId,
    pub snr_50: f64,
    pub slope: f64,
    pub validity: Validity,
    pub points: Vec<CurvePoint>,
}

/// Curves of every analysed sentence over a common SNR range.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurveOverlay {
    pub range: SnrRange,
    pub curves: Vec<SentenceCurve>,
}

impl CurveOverlay {
    #[must_use]
    pub fn from_report(report: &AnalysisReport, range: SnrRange, steps: usize) -> Self {
        let curves = report
            .summaries
            .iter()
            .map(|s| SentenceCurve {
                sentence_id: s.sentence_id,
                snr_50: s.snr_50,
                slope: s.slope,
                validity: s.validity,
                points: sample_curve(&reconstruct(s.snr_50, s.slope), range, steps),
            })
            .collect();
        Self { range, curves }
    }
}
