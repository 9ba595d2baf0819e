//! Optional TOML configuration for the analysis commands
//!
//! Every key is optional; missing keys keep their defaults. The fixed validity
//! scheme always uses `[fitter.bands]`.
//!
//! ```toml
//! workers = 8
//!
//! [fitter]
//! trials_per_point = 100
//! min_snr_levels = 3
//! envelope_margin_db = 5.0
//!
//! [fitter.bands]
//! ideal = { low = 0.5, high = 3.5 }
//! acceptable = { low = -1.0, high = 5.0 }
//!
//! [fitter.regression]
//! l2_penalty = 1.0
//!
//! [policies.quartile]
//! acceptable_iqr_factor = 0.5
//! ```

use std::{fs, num::NonZeroUsize, path::Path, thread};

use anyhow::Context;
use qsin_analysis::{batch::BatchAnalyzer, fit::PsychometricFitter, quality::PolicySettings};
use serde::Deserialize;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AnalysisConfig {
    pub fitter: PsychometricFitter,
    pub policies: PolicySettings,
    /// Worker threads for batch analysis, defaults to the available parallelism
    pub workers: Option<usize>,
}

impl AnalysisConfig {
    /// Loads `path`, or the defaults when no path is given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn policy_settings(&self) -> PolicySettings {
        PolicySettings {
            fixed: self.fitter.bands,
            ..self.policies
        }
    }

    /// Builds the batch analyzer, with `workers` taking precedence over the file.
    pub fn analyzer(&self, workers: Option<usize>) -> BatchAnalyzer {
        let workers = workers.or(self.workers).unwrap_or_else(|| {
            thread::available_parallelism().map_or(1, NonZeroUsize::get)
        });
        BatchAnalyzer::new(self.fitter.clone()).with_workers(workers)
    }
}
