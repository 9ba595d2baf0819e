use std::path::PathBuf;

use qsin_analysis::quality::ValidityScheme;
use tracing::info;

use super::analyze::AnalysisOutput;
use crate::{
    config::AnalysisConfig,
    util::{self, Output},
};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct ClassifyArg {
    /// Report JSON file written by `analyze`
    report: PathBuf,
    /// Validity scheme (fixed, quartile or sigma)
    #[arg(long)]
    scheme: ValidityScheme,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &ClassifyArg) -> anyhow::Result<()> {
    let ClassifyArg {
        report,
        scheme,
        config,
        output,
    } = arg;

    let config = AnalysisConfig::load(config.as_deref())?;
    let input: AnalysisOutput = util::read_json_file("report", report)?;
    let regraded = input
        .report
        .with_policy(config.policy_settings().policy(*scheme));

    let changed = input
        .report
        .summaries
        .iter()
        .zip(&regraded.summaries)
        .filter(|(before, after)| before.validity != after.validity)
        .count();
    info!(from = %input.scheme, to = %scheme, changed, "report regraded");

    let output_data = AnalysisOutput::new(*scheme, regraded, input.excluded_ids);
    Output::save_json(&output_data, output.clone())?;
    Ok(())
}
