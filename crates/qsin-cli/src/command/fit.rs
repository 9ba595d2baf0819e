use std::path::PathBuf;

use anyhow::ensure;
use qsin_analysis::observation::{DataPartition, SentenceId};
use tracing::info;

use crate::{
    config::AnalysisConfig,
    util::{self, InputFormat, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct FitArg {
    /// Observations JSON file
    observations: PathBuf,
    /// Sentence to fit
    #[arg(long)]
    sentence_id: SentenceId,
    /// Layout of the observations file (observations or records)
    #[arg(long, default_value = "observations")]
    format: InputFormat,
    /// Only use test or production sessions
    #[arg(long)]
    partition: Option<DataPartition>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &FitArg) -> anyhow::Result<()> {
    let FitArg {
        observations,
        sentence_id,
        format,
        partition,
        config,
        output,
    } = arg;

    let config = AnalysisConfig::load(config.as_deref())?;
    let observations = util::read_observations_file(observations, *format, *partition)?
        .into_iter()
        .filter(|o| o.sentence_id == *sentence_id)
        .collect::<Vec<_>>();
    ensure!(
        !observations.is_empty(),
        "No observations for sentence {sentence_id}"
    );

    let result = config.fitter.fit_observations(&observations);
    info!(
        sentence_id,
        status = %result.status,
        snr_50 = ?result.snr_50,
        slope = ?result.slope,
        validity = ?result.validity,
        "sentence fitted"
    );

    Output::save_json(&result, output.clone())?;
    Ok(())
}
