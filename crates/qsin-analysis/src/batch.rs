//! Item-bank-wide analysis
//!
//! [`BatchAnalyzer`] groups observations by sentence, fits every sentence
//! independently and collects the successful fits into an [`AnalysisReport`].
//! A sentence that fails to fit never stops the batch: it is left out of
//! [`AnalysisReport::summaries`] and recorded in [`AnalysisReport::failures`].
//!
//! Sentences are spread over scoped worker threads. Every fit only reads the
//! observations of its own sentence, and results are put back in the order
//! in which each sentence id first appeared in the input.
//!
//! # Examples
//!
//! ```
//! use qsin_analysis::{batch::BatchAnalyzer, observation::Observation};
//!
//! let observations = [(-10.0, 1.0), (-5.0, 3.0), (0.0, 5.0), (5.0, 7.0), (10.0, 9.0)]
//!     .map(|(snr, score)| Observation::new(1, snr, 10, score).unwrap());
//! let report = BatchAnalyzer::default().analyze(&observations);
//! assert_eq!(report.summaries.len(), 1);
//! assert_eq!(report.excluded_ids([1, 2]), vec![2]);
//! ```

use std::{
    collections::{BTreeMap, BTreeSet, HashMap},
    panic,
    sync::atomic::{AtomicUsize, Ordering},
    thread,
};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
    aggregate,
    fit::{FitResult, FitStatus, PsychometricFitter},
    observation::{ItemBank, Observation, SentenceId},
    quality::Validity,
};

/// Analysis row of one successfully fitted sentence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceSummary {
    pub sentence_id: SentenceId,
    pub full_sentence: String,
    pub snr_50: f64,
    pub slope: f64,
    pub validity: Validity,
    /// Sum of the total scores of all observations
    pub total_score_sum: f64,
    /// Mean total score per observation
    pub avg_score: f64,
    /// Number of observations
    pub data_points: usize,
    /// Number of distinct SNR levels
    pub snr_levels: usize,
}

/// A sentence left out of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitFailure {
    pub sentence_id: SentenceId,
    pub status: FitStatus,
    pub data_points: usize,
    pub snr_levels: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub summaries: Vec<SentenceSummary>,
    pub failures: Vec<FitFailure>,
}

/// Headline numbers of a report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportOverview {
    pub analyzed: usize,
    pub failed: usize,
    pub mean_snr_50: Option<f64>,
    pub mean_slope: Option<f64>,
    pub validity_counts: BTreeMap<Validity, usize>,
}

impl AnalysisReport {
    #[must_use]
    pub fn get(&self, sentence_id: SentenceId) -> Option<&SentenceSummary> {
        self.summaries.iter().find(|s| s.sentence_id == sentence_id)
    }

    #[must_use]
    pub fn analyzed_ids(&self) -> BTreeSet<SentenceId> {
        self.summaries.iter().map(|s| s.sentence_id).collect()
    }

    /// Ids of `universe` without a summary, sorted and deduplicated.
    ///
    /// This includes both sentences that failed to fit and sentences that
    /// had no observations at all.
    #[must_use]
    pub fn excluded_ids<I>(&self, universe: I) -> Vec<SentenceId>
    where
        I: IntoIterator<Item = SentenceId>,
    {
        let analyzed = self.analyzed_ids();
        universe
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .filter(|id| !analyzed.contains(id))
            .collect()
    }

    #[expect(clippy::cast_precision_loss)]
    #[must_use]
    pub fn overview(&self) -> ReportOverview {
        let n = self.summaries.len();
        let (snr_sum, slope_sum) = self
            .summaries
            .iter()
            .fold((0.0, 0.0), |(snr, slope), s| (snr + s.snr_50, slope + s.slope));
        let mean = |sum: f64| (n > 0).then(|| sum / n as f64);
        let mut validity_counts = BTreeMap::new();
        for summary in &self.summaries {
            *validity_counts.entry(summary.validity).or_insert(0) += 1;
        }
        ReportOverview {
            analyzed: n,
            failed: self.failures.len(),
            mean_snr_50: mean(snr_sum),
            mean_slope: mean(slope_sum),
            validity_counts,
        }
    }

    /// Summaries ordered from best to worst measurement quality.
    ///
    /// Sorted by grade first (Ideal before Acceptable before Warning before
    /// Extrapolated), then by descending slope, then by sentence id.
    #[must_use]
    pub fn ranked(&self) -> Vec<&SentenceSummary> {
        let mut ranked = self.summaries.iter().collect::<Vec<_>>();
        ranked.sort_by(|a, b| {
            a.validity
                .cmp(&b.validity)
                .then(b.slope.total_cmp(&a.slope))
                .then(a.sentence_id.cmp(&b.sentence_id))
        });
        ranked
    }

    /// Fills empty sentence texts from the item bank.
    pub fn fill_sentence_text(&mut self, bank: &ItemBank) {
        for summary in &mut self.summaries {
            if !summary.full_sentence.is_empty() {
                continue;
            }
            if let Some(sentence) = bank.get(summary.sentence_id) {
                summary.full_sentence.clone_from(&sentence.full_sentence);
            }
        }
    }
}

/// Progress of a running batch, reported after every sentence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    pub completed: usize,
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchAnalyzer {
    pub fitter: PsychometricFitter,
    /// Number of worker threads (values below 1 are treated as 1)
    pub workers: usize,
}

impl Default for BatchAnalyzer {
    fn default() -> Self {
        Self {
            fitter: PsychometricFitter::default(),
            workers: 1,
        }
    }
}

type SentenceGroup<'a> = (SentenceId, Vec<&'a Observation>);

impl BatchAnalyzer {
    #[must_use]
    pub fn new(fitter: PsychometricFitter) -> Self {
        Self {
            fitter,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    #[must_use]
    pub fn analyze(&self, observations: &[Observation]) -> AnalysisReport {
        self.analyze_with_progress(observations, |_| {})
    }

    #[must_use]
    pub fn analyze_with_progress<F>(
        &self,
        observations: &[Observation],
        progress: F,
    ) -> AnalysisReport
    where
        F: Fn(BatchProgress) + Sync,
    {
        let groups = group_by_sentence(observations);
        let total = groups.len();
        let completed = AtomicUsize::new(0);
        let workers = self.workers.clamp(1, total.max(1));
        info!(
            sentences = total,
            observations = observations.len(),
            workers,
            "starting batch analysis"
        );

        let run = |chunk: &[SentenceGroup<'_>]| {
            chunk
                .iter()
                .map(|(sentence_id, group)| {
                    let outcome = self.analyze_sentence(*sentence_id, group);
                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    progress(BatchProgress {
                        completed: done,
                        total,
                    });
                    outcome
                })
                .collect::<Vec<_>>()
        };

        let outcomes = if workers == 1 {
            run(groups.as_slice())
        } else {
            let chunk_size = total.div_ceil(workers);
            let run = &run;
            thread::scope(|s| {
                let handles = groups
                    .chunks(chunk_size)
                    .map(|chunk| s.spawn(move || run(chunk)))
                    .collect::<Vec<_>>();
                handles
                    .into_iter()
                    .flat_map(|handle| handle.join().unwrap_or_else(|e| panic::resume_unwind(e)))
                    .collect::<Vec<_>>()
            })
        };

        let mut report = AnalysisReport::default();
        for outcome in outcomes {
            match outcome {
                Ok(summary) => report.summaries.push(summary),
                Err(failure) => report.failures.push(failure),
            }
        }
        info!(
            analyzed = report.summaries.len(),
            failed = report.failures.len(),
            "batch analysis finished"
        );
        report
    }

    fn analyze_sentence(
        &self,
        sentence_id: SentenceId,
        observations: &[&Observation],
    ) -> Result<SentenceSummary, FitFailure> {
        let points = aggregate::aggregate(observations.iter().copied());
        let FitResult {
            status,
            snr_50,
            slope,
            validity,
            ..
        } = self.fitter.fit(&points);
        debug!(sentence_id, %status, "fitted sentence");

        let data_points = observations.len();
        let snr_levels = points.len();
        match (snr_50, slope, validity) {
            (Some(snr_50), Some(slope), Some(validity)) if status.is_success() => {
                let total_score_sum = observations.iter().map(|o| o.total_score).sum::<f64>();
                #[expect(clippy::cast_precision_loss)]
                let avg_score = total_score_sum / data_points as f64;
                let full_sentence = observations
                    .iter()
                    .map(|o| o.full_sentence.as_str())
                    .find(|text| !text.is_empty())
                    .unwrap_or_default()
                    .to_owned();
                Ok(SentenceSummary {
                    sentence_id,
                    full_sentence,
                    snr_50,
                    slope,
                    validity,
                    total_score_sum,
                    avg_score,
                    data_points,
                    snr_levels,
                })
            }
            _ => Err(FitFailure {
                sentence_id,
                status,
                data_points,
                snr_levels,
            }),
        }
    }
}

/// Groups observations by sentence id in order of first appearance.
fn group_by_sentence(observations: &[Observation]) -> Vec<SentenceGroup<'_>> {
    let mut index = HashMap::new();
    let mut groups: Vec<SentenceGroup<'_>> = vec![];
    for observation in observations {
        let slot = *index.entry(observation.sentence_id).or_insert_with(|| {
            groups.push((observation.sentence_id, vec![]));
            groups.len() - 1
        });
        groups[slot].1.push(observation);
    }
    groups
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    fn sentence(id: SentenceId, levels: &[f64], rates: &[f64]) -> Vec<Observation> {
        levels
            .iter()
            .zip(rates)
            .map(|(&snr, &rate)| {
                Observation::new(id, snr, 10, rate * 10.0)
                    .unwrap()
                    .with_sentence_text(format!("sentence {id}"))
            })
            .collect()
    }

    fn good(id: SentenceId) -> Vec<Observation> {
        sentence(
            id,
            &[-10.0, -5.0, 0.0, 5.0, 10.0],
            &[0.1, 0.3, 0.5, 0.7, 0.9],
        )
    }

    #[test]
    fn test_summary_fields() {
        let mut observations = good(4);
        observations.extend(sentence(4, &[0.0], &[0.7]));
        let report = BatchAnalyzer::default().analyze(&observations);
        let summary = report.get(4).unwrap();
        assert_eq!(summary.data_points, 6);
        assert_eq!(summary.snr_levels, 5);
        assert!((summary.total_score_sum - 32.0).abs() < 1e-9);
        assert!((summary.avg_score - 32.0 / 6.0).abs() < 1e-9);
        assert_eq!(summary.full_sentence, "sentence 4");
    }

    #[test]
    fn test_failures_are_isolated() {
        let mut observations = good(1);
        observations.extend(sentence(2, &[0.0, 5.0], &[0.2, 0.8]));
        observations.extend(sentence(3, &[-5.0, 0.0, 5.0], &[0.5, 0.5, 0.5]));
        observations.extend(good(4));
        let report = BatchAnalyzer::default().analyze(&observations);

        let ids = report.summaries.iter().map(|s| s.sentence_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![1, 4]);
        assert_eq!(report.failures.len(), 2);
        assert_eq!(report.failures[0].status, FitStatus::InsufficientData);
        assert_eq!(report.failures[1].status, FitStatus::DegenerateData);
        assert_eq!(report.excluded_ids(1..=5), vec![2, 3, 5]);
    }

    #[test]
    fn test_first_encountered_order() {
        let mut observations = good(9);
        observations.extend(good(2));
        observations.extend(good(5));
        observations.rotate_left(3);
        let report = BatchAnalyzer::default().analyze(&observations);
        let ids = report.summaries.iter().map(|s| s.sentence_id).collect::<Vec<_>>();
        assert_eq!(ids, vec![9, 2, 5]);
    }

    #[test]
    fn test_parallel_matches_sequential() {
        let observations = (1..=40).flat_map(good).collect::<Vec<_>>();
        let sequential = BatchAnalyzer::default().analyze(&observations);
        let parallel = BatchAnalyzer::default()
            .with_workers(4)
            .analyze(&observations);
        assert_eq!(sequential, parallel);
    }

    #[test]
    fn test_progress_reports_every_sentence() {
        let observations = (1..=10).flat_map(good).collect::<Vec<_>>();
        let seen = Mutex::new(vec![]);
        let report = BatchAnalyzer::default()
            .with_workers(3)
            .analyze_with_progress(&observations, |p| {
                seen.lock().unwrap().push(p);
            });
        assert_eq!(report.summaries.len(), 10);
        let mut completed = seen
            .into_inner()
            .unwrap()
            .into_iter()
            .map(|p| {
                assert_eq!(p.total, 10);
                p.completed
            })
            .collect::<Vec<_>>();
        completed.sort_unstable();
        assert_eq!(completed, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input() {
        let report = BatchAnalyzer::default().with_workers(8).analyze(&[]);
        assert!(report.summaries.is_empty());
        assert_eq!(report.overview().mean_snr_50, None);
    }

    #[test]
    fn test_overview_and_ranking() {
        let mut observations = good(1);
        // steeper curve centered at 2 dB
        observations.extend(sentence(
            2,
            &[-8.0, -3.0, 2.0, 7.0, 12.0],
            &[0.02, 0.1, 0.5, 0.9, 0.98],
        ));
        observations.extend(sentence(
            3,
            &[-8.0, -3.0, 2.0, 7.0, 12.0],
            &[0.1, 0.3, 0.5, 0.7, 0.9],
        ));
        let report = BatchAnalyzer::default().analyze(&observations);
        let overview = report.overview();
        assert_eq!(overview.analyzed, 3);
        assert_eq!(overview.validity_counts.get(&Validity::Ideal), Some(&2));
        assert_eq!(overview.validity_counts.get(&Validity::Acceptable), Some(&1));

        let ranked = report.ranked().iter().map(|s| s.sentence_id).collect::<Vec<_>>();
        assert_eq!(ranked, vec![2, 3, 1]);
    }

    #[test]
    fn test_fill_sentence_text() {
        let observations = good(1)
            .into_iter()
            .map(|o| o.with_sentence_text(""))
            .collect::<Vec<_>>();
        let mut report = BatchAnalyzer::default().analyze(&observations);
        let bank: ItemBank =
            serde_json::from_str(r#"[{"index": 1, "fullSentence": "The cat sat", "keyword": []}]"#)
                .unwrap();
        report.fill_sentence_text(&bank);
        assert_eq!(report.summaries[0].full_sentence, "The cat sat");
    }
}
