//! Per-SNR-level reduction of a sentence's observations

use serde::{Deserialize, Serialize};

use crate::observation::{Observation, SentenceId};

/// Mean correct rate of one sentence at one SNR level.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregatedPoint {
    pub snr_level: f64,
    pub mean_correct_rate: f64,
    /// Number of observations averaged into this point
    pub count: usize,
}

/// Reduces the observations of a single sentence to one point per distinct SNR level.
///
/// Points are returned in ascending SNR order. An empty input gives an empty output.
///
/// # Panics
///
/// Panics if the observations belong to more than one sentence.
///
/// # Examples
///
/// ```
/// use qsin_analysis::{aggregate::aggregate, observation::Observation};
///
/// let observations = [
///     Observation::new(1, 5.0, 4, 4.0).unwrap(),
///     Observation::new(1, -5.0, 4, 1.0).unwrap(),
///     Observation::new(1, 5.0, 4, 2.0).unwrap(),
/// ];
/// let points = aggregate(&observations);
/// assert_eq!(points.len(), 2);
/// assert_eq!(points[0].snr_level, -5.0);
/// assert_eq!(points[1].mean_correct_rate, 0.75);
/// ```
#[expect(clippy::cast_precision_loss)]
#[must_use]
pub fn aggregate<'a, I>(observations: I) -> Vec<AggregatedPoint>
where
    I: IntoIterator<Item = &'a Observation>,
{
    let mut sentence_id: Option<SentenceId> = None;
    let mut rates = observations
        .into_iter()
        .map(|o| {
            let id = *sentence_id.get_or_insert(o.sentence_id);
            assert_eq!(
                id, o.sentence_id,
                "observations of sentences {id} and {} cannot be aggregated together",
                o.sentence_id
            );
            // -0.0 and 0.0 are the same level
            (o.snr_level + 0.0, o.correct_rate())
        })
        .collect::<Vec<_>>();
    rates.sort_by(|a, b| a.0.total_cmp(&b.0));

    rates
        .chunk_by(|a, b| a.0 == b.0)
        .map(|group| AggregatedPoint {
            snr_level: group[0].0,
            mean_correct_rate: group.iter().map(|(_, rate)| rate).sum::<f64>() / group.len() as f64,
            count: group.len(),
        })
        .collect()
}
