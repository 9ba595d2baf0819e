//! Scored sentence attempts and the static item bank
//!
//! # Data Structure
//!
//! ```text
//! ItemBank
//! └─ sentences: Vec<Sentence>
//!     ├─ index (sentence id, 1..N)
//!     ├─ full sentence text
//!     └─ scorable keywords (determines num_keywords)
//!
//! TrialRecord (one administered sentence, per-keyword scores)
//! └─ to_observation() ─> Observation
//!     ├─ sentence_id, snr_level, session_id
//!     ├─ num_keywords (> 0)
//!     └─ total_score (0 ..= num_keywords)
//! ```
//!
//! # Partitions
//!
//! Sessions whose id starts with `dummy_` hold generated test data and are
//! kept apart from production sessions with [`DataPartition`].
//!
//! # Serialization
//!
//! The item bank uses the keys of the sentence bank file:
//!
//! ```json
//! [
//!   { "index": 1, "fullSentence": "A white silk jacket goes with any shoes", "keyword": ["white", "silk", "jacket", "any", "shoes"] }
//! ]
//! ```

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Item-bank index of a sentence (1-based).
pub type SentenceId = u32;

/// Session id prefix marking generated test data.
pub const TEST_SESSION_PREFIX: &str = "dummy_";

#[derive(Debug, Clone, PartialEq, derive_more::Display, derive_more::Error)]
pub enum ObservationError {
    #[display("sentence {sentence_id} has no scorable keywords")]
    NoKeywords { sentence_id: SentenceId },
    #[display(
        "sentence {sentence_id} total score {total_score} is outside 0..={num_keywords}"
    )]
    ScoreOutOfRange {
        sentence_id: SentenceId,
        total_score: f64,
        num_keywords: u32,
    },
    #[display("sentence {sentence_id} has non-finite SNR level {snr_level}")]
    InvalidSnrLevel {
        sentence_id: SentenceId,
        snr_level: f64,
    },
    #[display("sentence {sentence_id} keyword {index} has score {score}, expected 0, 0.5 or 1")]
    InvalidKeywordScore {
        sentence_id: SentenceId,
        index: usize,
        score: f64,
    },
    #[display("sentence {sentence_id} has {count} keywords, more than can be counted")]
    TooManyKeywords { sentence_id: SentenceId, count: usize },
}

/// Scores a single keyword can receive.
pub const KEYWORD_SCORES: [f64; 3] = [0.0, 0.5, 1.0];

/// One scored sentence attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sentence_id: SentenceId,
    /// SNR in dB at which the sentence was presented
    pub snr_level: f64,
    /// Number of scorable keywords in the sentence
    pub num_keywords: u32,
    /// Sum of the per-keyword scores (each 0, 0.5 or 1)
    pub total_score: f64,
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub full_sentence: String,
}

impl Observation {
    /// Creates a validated observation.
    pub fn new(
        sentence_id: SentenceId,
        snr_level: f64,
        num_keywords: u32,
        total_score: f64,
    ) -> Result<Self, ObservationError> {
        let observation = Self {
            sentence_id,
            snr_level,
            num_keywords,
            total_score,
            session_id: String::new(),
            full_sentence: String::new(),
        };
        observation.validate()?;
        Ok(observation)
    }

    #[must_use]
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    #[must_use]
    pub fn with_sentence_text(mut self, full_sentence: impl Into<String>) -> Self {
        self.full_sentence = full_sentence.into();
        self
    }

    /// Checks the keyword-count and score-range invariants.
    pub fn validate(&self) -> Result<(), ObservationError> {
        let sentence_id = self.sentence_id;
        if !self.snr_level.is_finite() {
            return Err(ObservationError::InvalidSnrLevel {
                sentence_id,
                snr_level: self.snr_level,
            });
        }
        if self.num_keywords == 0 {
            return Err(ObservationError::NoKeywords { sentence_id });
        }
        if !(0.0..=f64::from(self.num_keywords)).contains(&self.total_score) {
            return Err(ObservationError::ScoreOutOfRange {
                sentence_id,
                total_score: self.total_score,
                num_keywords: self.num_keywords,
            });
        }
        Ok(())
    }

    /// Fraction of the keyword score obtained, in `0.0..=1.0`.
    #[must_use]
    pub fn correct_rate(&self) -> f64 {
        self.total_score / f64::from(self.num_keywords)
    }
}

/// A sentence administration as written by a record writer, with one score per keyword.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub sentence_id: SentenceId,
    pub session_id: String,
    pub snr_level: f64,
    #[serde(default)]
    pub full_sentence: String,
    /// Per-keyword scores, each 0, 0.5 or 1
    pub scores: Vec<f64>,
}

impl TrialRecord {
    #[must_use]
    pub fn total_score(&self) -> f64 {
        self.scores.iter().sum()
    }

    /// Converts the record to an observation.
    ///
    /// Records without any scorable keyword are excluded (`Ok(None)`). Every
    /// keyword score must be one of [`KEYWORD_SCORES`].
    pub fn to_observation(&self) -> Result<Option<Observation>, ObservationError> {
        let sentence_id = self.sentence_id;
        if self.scores.is_empty() {
            return Ok(None);
        }
        if let Some((index, &score)) = self
            .scores
            .iter()
            .enumerate()
            .find(|(_, score)| !KEYWORD_SCORES.contains(score))
        {
            return Err(ObservationError::InvalidKeywordScore {
                sentence_id,
                index,
                score,
            });
        }
        let num_keywords = u32::try_from(self.scores.len()).map_err(|_| {
            ObservationError::TooManyKeywords {
                sentence_id,
                count: self.scores.len(),
            }
        })?;
        let observation = Observation::new(
            self.sentence_id,
            self.snr_level,
            num_keywords,
            self.total_score(),
        )?
        .with_session(self.session_id.clone())
        .with_sentence_text(self.full_sentence.clone());
        Ok(Some(observation))
    }
}

/// Converts trial records to observations, dropping records without keywords.
pub fn observations_from_records(
    records: &[TrialRecord],
) -> Result<Vec<Observation>, ObservationError> {
    records
        .iter()
        .filter_map(|record| record.to_observation().transpose())
        .collect()
}

/// Selects generated test sessions or production sessions.
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
pub enum DataPartition {
    /// Sessions whose id starts with [`TEST_SESSION_PREFIX`]
    Test,
    /// All other sessions
    #[default]
    Production,
}

impl DataPartition {
    #[must_use]
    pub fn of_session(session_id: &str) -> Self {
        if session_id.starts_with(TEST_SESSION_PREFIX) {
            Self::Test
        } else {
            Self::Production
        }
    }

    #[must_use]
    pub fn contains(self, observation: &Observation) -> bool {
        Self::of_session(&observation.session_id) == self
    }

    /// Returns the observations that belong to this partition.
    #[must_use]
    pub fn select(self, observations: &[Observation]) -> Vec<Observation> {
        observations
            .iter()
            .filter(|o| self.contains(o))
            .cloned()
            .collect()
    }
}

/// One sentence of the item bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sentence {
    pub index: SentenceId,
    #[serde(rename = "fullSentence")]
    pub full_sentence: String,
    #[serde(rename = "keyword", default)]
    pub keywords: Vec<String>,
}

impl Sentence {
    #[must_use]
    pub fn num_keywords(&self) -> usize {
        self.keywords.len()
    }
}

/// The static sentence bank a test draws from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemBank {
    sentences: Vec<Sentence>,
}

impl ItemBank {
    #[must_use]
    pub fn new(sentences: Vec<Sentence>) -> Self {
        Self { sentences }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sentence> + '_ {
        self.sentences.iter()
    }

    #[must_use]
    pub fn get(&self, id: SentenceId) -> Option<&Sentence> {
        self.sentences.iter().find(|s| s.index == id)
    }

    /// All sentence ids in the bank, the universe for exclusion accounting.
    #[must_use]
    pub fn sentence_ids(&self) -> BTreeSet<SentenceId> {
        self.sentences.iter().map(|s| s.index).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correct_rate() {
        let obs = Observation::new(1, 0.0, 4, 3.0).unwrap();
        assert!((obs.correct_rate() - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_observations() {
        assert_eq!(
            Observation::new(3, 0.0, 0, 0.0),
            Err(ObservationError::NoKeywords { sentence_id: 3 })
        );
        assert!(matches!(
            Observation::new(3, 0.0, 2, 2.5),
            Err(ObservationError::ScoreOutOfRange { .. })
        ));
        assert!(matches!(
            Observation::new(3, f64::NAN, 2, 1.0),
            Err(ObservationError::InvalidSnrLevel { .. })
        ));
    }

    #[test]
    fn test_record_without_keywords_is_excluded() {
        let records = vec![
            TrialRecord {
                sentence_id: 1,
                session_id: "dummy_1".to_owned(),
                snr_level: 5.0,
                full_sentence: String::new(),
                scores: vec![1.0, 0.5, 0.0],
            },
            TrialRecord {
                sentence_id: 2,
                session_id: "dummy_1".to_owned(),
                snr_level: 5.0,
                full_sentence: String::new(),
                scores: vec![],
            },
        ];
        let observations = observations_from_records(&records).unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].num_keywords, 3);
        assert!((observations[0].total_score - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_record_with_invalid_keyword_score() {
        let record = |scores: Vec<f64>| TrialRecord {
            sentence_id: 4,
            session_id: "clinic_1".to_owned(),
            snr_level: 0.0,
            full_sentence: String::new(),
            scores,
        };
        // sums to a valid total but no keyword can score 2 or -1
        assert_eq!(
            record(vec![2.0, -1.0]).to_observation(),
            Err(ObservationError::InvalidKeywordScore {
                sentence_id: 4,
                index: 0,
                score: 2.0
            })
        );
        assert_eq!(
            record(vec![1.0, 0.7, 0.7]).to_observation(),
            Err(ObservationError::InvalidKeywordScore {
                sentence_id: 4,
                index: 1,
                score: 0.7
            })
        );
        assert!(matches!(
            record(vec![1.0, f64::NAN]).to_observation(),
            Err(ObservationError::InvalidKeywordScore { index: 1, .. })
        ));
        assert!(
            observations_from_records(&[record(vec![0.5, 0.5]), record(vec![-0.5])]).is_err()
        );
        assert!(record(vec![0.0, 0.5, 1.0]).to_observation().unwrap().is_some());
    }

    #[test]
    fn test_keyword_errors_name_the_sentence() {
        let score = ObservationError::InvalidKeywordScore {
            sentence_id: 4,
            index: 2,
            score: 0.7,
        };
        assert_eq!(
            score.to_string(),
            "sentence 4 keyword 2 has score 0.7, expected 0, 0.5 or 1"
        );
        let count = ObservationError::TooManyKeywords {
            sentence_id: 9,
            count: usize::MAX,
        };
        assert!(
            count
                .to_string()
                .starts_with(&format!("sentence 9 has {} keywords", usize::MAX))
        );
    }

    #[test]
    fn test_partition_by_session_prefix() {
        let test = Observation::new(1, 0.0, 1, 1.0)
            .unwrap()
            .with_session("dummy_1700000000");
        let prod = Observation::new(1, 0.0, 1, 1.0)
            .unwrap()
            .with_session("clinic_42");
        let all = [test.clone(), prod.clone()];
        assert_eq!(DataPartition::Test.select(&all), vec![test]);
        assert_eq!(DataPartition::Production.select(&all), vec![prod]);
        assert_eq!("test".parse::<DataPartition>().ok(), Some(DataPartition::Test));
    }

    #[test]
    fn test_item_bank_json() {
        let json = r#"[
            {"index": 1, "fullSentence": "A white silk jacket", "keyword": ["white", "silk", "jacket"]},
            {"index": 2, "fullSentence": "No keywords here"}
        ]"#;
        let bank: ItemBank = serde_json::from_str(json).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(1).unwrap().num_keywords(), 3);
        assert_eq!(bank.get(2).unwrap().num_keywords(), 0);
        assert_eq!(bank.sentence_ids().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }
}
