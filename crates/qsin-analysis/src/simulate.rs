//! Synthetic test sessions
//!
//! [`SessionSimulator`] administers every sentence of an item bank at one
//! SNR level and scores each keyword 0, 0.5 or 1 with probabilities that
//! grow with the SNR:
//!
//! | SNR (dB)  | P(0) | P(0.5) | P(1) |
//! |-----------|------|--------|------|
//! | ≤ -10     | 0.80 | 0.15   | 0.05 |
//! | ≤ -5      | 0.60 | 0.30   | 0.10 |
//! | ≤ 0       | 0.30 | 0.40   | 0.30 |
//! | ≤ 5       | 0.10 | 0.40   | 0.50 |
//! | ≤ 10      | 0.05 | 0.25   | 0.70 |
//! | ≤ 15      | 0.05 | 0.10   | 0.85 |
//! | above     | 0.02 | 0.03   | 0.95 |
//!
//! Generated sessions are named with [`TEST_SESSION_PREFIX`] so they always
//! land in [`DataPartition::Test`](crate::observation::DataPartition::Test).
//!
//! # Examples
//!
//! ```
//! use qsin_analysis::{
//!     observation::{ItemBank, Sentence},
//!     simulate::{self, SessionSimulator},
//! };
//!
//! let bank = ItemBank::new(vec![Sentence {
//!     index: 1,
//!     full_sentence: "A white silk jacket goes with any shoes".to_owned(),
//!     keywords: vec!["white".into(), "silk".into(), "jacket".into()],
//! }]);
//! let session_id = simulate::test_session_id(1_700_000_000);
//! let records = SessionSimulator::new(42).administer(&bank, &session_id, 5.0);
//! assert_eq!(records[0].scores.len(), 3);
//! assert!(records[0].session_id.starts_with("dummy_"));
//! ```

use std::fmt::Display;

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::observation::{ItemBank, TEST_SESSION_PREFIX, TrialRecord};

/// Probabilities of the three keyword scores.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub miss: f64,
    pub partial: f64,
    pub hit: f64,
}

impl ScoreWeights {
    const fn new(miss: f64, partial: f64, hit: f64) -> Self {
        Self { miss, partial, hit }
    }
}

/// Keyword score distribution at `snr` dB.
#[must_use]
pub fn score_weights(snr: f64) -> ScoreWeights {
    const TABLE: [(f64, ScoreWeights); 6] = [
        (-10.0, ScoreWeights::new(0.80, 0.15, 0.05)),
        (-5.0, ScoreWeights::new(0.60, 0.30, 0.10)),
        (0.0, ScoreWeights::new(0.30, 0.40, 0.30)),
        (5.0, ScoreWeights::new(0.10, 0.40, 0.50)),
        (10.0, ScoreWeights::new(0.05, 0.25, 0.70)),
        (15.0, ScoreWeights::new(0.05, 0.10, 0.85)),
    ];
    TABLE
        .iter()
        .find(|(upper, _)| snr <= *upper)
        .map_or(ScoreWeights::new(0.02, 0.03, 0.95), |(_, weights)| *weights)
}

/// Session id for generated data, e.g. `dummy_1700000000`.
#[must_use]
pub fn test_session_id(suffix: impl Display) -> String {
    format!("{TEST_SESSION_PREFIX}{suffix}")
}

#[derive(Debug, Clone)]
pub struct SessionSimulator {
    rng: Pcg32,
}

impl SessionSimulator {
    /// Creates a simulator whose output is fully determined by `seed`.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
        }
    }

    /// Draws one keyword score.
    pub fn score_keyword(&mut self, snr: f64) -> f64 {
        let weights = score_weights(snr);
        let u = self.rng.random::<f64>() * (weights.miss + weights.partial + weights.hit);
        if u < weights.miss {
            0.0
        } else if u < weights.miss + weights.partial {
            0.5
        } else {
            1.0
        }
    }

    /// Administers every sentence of `bank` once at `snr_level`.
    ///
    /// Sentences without keywords yield records with no scores.
    pub fn administer(
        &mut self,
        bank: &ItemBank,
        session_id: &str,
        snr_level: f64,
    ) -> Vec<TrialRecord> {
        let records = bank
            .iter()
            .map(|sentence| TrialRecord {
                sentence_id: sentence.index,
                session_id: session_id.to_owned(),
                snr_level,
                full_sentence: sentence.full_sentence.clone(),
                scores: (0..sentence.num_keywords())
                    .map(|_| self.score_keyword(snr_level))
                    .collect(),
            })
            .collect::<Vec<_>>();
        debug!(session_id, snr_level, sentences = records.len(), "generated session");
        records
    }
}
