use std::path::PathBuf;

use qsin_analysis::curve::{CurveOverlay, SnrRange};
use tracing::{info, warn};

use super::analyze::AnalysisOutput;
use crate::util::{self, InputFormat, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct CurvesArg {
    /// Report JSON file written by `analyze`
    report: PathBuf,
    /// Observations JSON file whose SNR range the curves cover. Without it,
    /// bounds not given by `--min` / `--max` default to -10 ..= 20 dB
    #[arg(long)]
    observations: Option<PathBuf>,
    /// Layout of the observations file (observations or records)
    #[arg(long, default_value = "observations")]
    format: InputFormat,
    /// Lowest SNR in dB, overrides the observed range
    #[arg(long, allow_negative_numbers = true)]
    min: Option<f64>,
    /// Highest SNR in dB, overrides the observed range
    #[arg(long, allow_negative_numbers = true)]
    max: Option<f64>,
    /// Points per curve
    #[arg(long, default_value_t = 61)]
    steps: usize,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &CurvesArg) -> anyhow::Result<()> {
    let CurvesArg {
        report,
        observations,
        format,
        min,
        max,
        steps,
        output,
    } = arg;

    let input: AnalysisOutput = util::read_json_file("report", report)?;
    let observed = match observations {
        Some(path) => {
            let observations = util::read_observations_file(path, *format, None)?;
            SnrRange::of_observations(&observations)
        }
        None => None,
    };
    let range = resolve_range(observed, *min, *max);
    anyhow::ensure!(
        range.min < range.max,
        "Empty SNR range: {} ..= {}",
        range.min,
        range.max
    );

    let overlay = CurveOverlay::from_report(&input.report, range, *steps);
    info!(
        curves = overlay.curves.len(),
        min = range.min,
        max = range.max,
        steps,
        "curves rebuilt"
    );

    Output::save_json(&overlay, output.clone())?;
    Ok(())
}

/// Combines the observed range with the `--min` / `--max` overrides.
///
/// Bounds that are neither observed nor given fall back to the default range.
fn resolve_range(observed: Option<SnrRange>, min: Option<f64>, max: Option<f64>) -> SnrRange {
    let base = observed.unwrap_or_else(|| {
        let base = SnrRange::default();
        if min.is_none() || max.is_none() {
            warn!(
                min = base.min,
                max = base.max,
                "no observed SNR range, using the default for missing bounds"
            );
        }
        base
    });
    SnrRange {
        min: min.unwrap_or(base.min),
        max: max.unwrap_or(base.max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_range() {
        let observed = SnrRange {
            min: -5.0,
            max: 15.0,
        };
        assert_eq!(resolve_range(Some(observed), None, None), observed);
        assert_eq!(
            resolve_range(Some(observed), Some(-2.0), None),
            SnrRange {
                min: -2.0,
                max: 15.0
            }
        );
        assert_eq!(
            resolve_range(None, Some(0.0), Some(10.0)),
            SnrRange {
                min: 0.0,
                max: 10.0
            }
        );
        assert_eq!(resolve_range(None, None, None), SnrRange::default());
        assert_eq!(
            resolve_range(None, None, Some(30.0)),
            SnrRange {
                min: -10.0,
                max: 30.0
            }
        );
    }
}
