//! Sentence-level analysis of Quick-SIN speech-in-noise test results
//!
//! Each sentence of the item bank is played at several signal-to-noise
//! ratios. This crate estimates, per sentence, the SNR at which half of the
//! keywords are recognized (SNR-50) and the steepness of the psychometric
//! curve at that point, then grades how trustworthy each estimate is.
//!
//! # Overview
//!
//! ## Sentence Analysis Workflow
//!
//! 1. **Collect Observations** ([`observation::Observation`]): Scored sentence attempts,
//!    optionally converted from per-keyword [`observation::TrialRecord`]s and filtered by
//!    [`observation::DataPartition`]
//! 2. **Aggregate** ([`aggregate::aggregate`]): One mean correct rate per SNR level
//! 3. **Fit** ([`fit::PsychometricFitter`]): Logistic psychometric function, SNR-50 and
//!    slope in %/dB
//! 4. **Grade** ([`quality::Validity`]): Fixed dB bands, or Extrapolated when SNR-50 lies
//!    outside the tested range
//!
//! ## Batch Workflow
//!
//! 1. **Analyze** ([`batch::BatchAnalyzer`]): Fit every sentence in parallel into an
//!    [`batch::AnalysisReport`]; failed sentences are excluded, never fatal
//! 2. **Regrade** ([`quality::ValidityPolicy`]): Swap in batch-adaptive quartile or
//!    mean ± σ bands without re-fitting
//! 3. **Plot** ([`curve::CurveOverlay`]): Rebuild every curve from `(snr_50, slope)` alone
//!
//! ## Test Data
//!
//! [`simulate::SessionSimulator`] generates reproducible synthetic sessions whose session
//! ids mark them as test data.
//!
//! # Examples
//!
//! ```
//! use qsin_analysis::{
//!     batch::BatchAnalyzer,
//!     observation::Observation,
//!     quality::{QuartileBands, Validity},
//! };
//!
//! let observations = [(-10.0, 1.0), (-5.0, 3.0), (0.0, 5.0), (5.0, 7.0), (10.0, 9.0)]
//!     .map(|(snr, score)| Observation::new(1, snr, 10, score).unwrap());
//!
//! let report = BatchAnalyzer::default().analyze(&observations);
//! let summary = &report.summaries[0];
//! assert!(summary.snr_50.abs() < 0.5);
//! assert_eq!(summary.validity, Validity::Acceptable);
//!
//! let regraded = report.with_policy(&QuartileBands::default());
//! assert_eq!(regraded.summaries[0].snr_50, summary.snr_50);
//! ```

pub mod aggregate;
pub mod batch;
pub mod curve;
pub mod fit;
pub mod observation;
pub mod quality;
pub mod simulate;
