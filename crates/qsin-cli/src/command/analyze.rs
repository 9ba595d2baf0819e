use std::path::PathBuf;

use qsin_analysis::{
    batch::{AnalysisReport, BatchProgress, ReportOverview},
    observation::{DataPartition, SentenceId},
    quality::ValidityScheme,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::{
    config::AnalysisConfig,
    util::{self, InputFormat, Output},
};

/// Report file written by `analyze` and `classify`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AnalysisOutput {
    pub scheme: ValidityScheme,
    pub overview: ReportOverview,
    /// Known sentences without a summary
    pub excluded_ids: Vec<SentenceId>,
    #[serde(flatten)]
    pub report: AnalysisReport,
}

impl AnalysisOutput {
    pub fn new(
        scheme: ValidityScheme,
        report: AnalysisReport,
        excluded_ids: Vec<SentenceId>,
    ) -> Self {
        Self {
            scheme,
            overview: report.overview(),
            excluded_ids,
            report,
        }
    }
}

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct AnalyzeArg {
    /// Observations JSON file
    observations: PathBuf,
    /// Layout of the observations file (observations or records)
    #[arg(long, default_value = "observations")]
    format: InputFormat,
    /// Item bank JSON file, used for sentence texts and excluded ids
    #[arg(long)]
    item_bank: Option<PathBuf>,
    /// Only analyze test or production sessions
    #[arg(long)]
    partition: Option<DataPartition>,
    /// Validity scheme (fixed, quartile or sigma)
    #[arg(long, default_value = "fixed")]
    scheme: ValidityScheme,
    /// Worker threads, overrides the config file
    #[arg(long)]
    workers: Option<usize>,
    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &AnalyzeArg) -> anyhow::Result<()> {
    let AnalyzeArg {
        observations,
        format,
        item_bank,
        partition,
        scheme,
        workers,
        config,
        output,
    } = arg;

    let config = AnalysisConfig::load(config.as_deref())?;
    let observations = util::read_observations_file(observations, *format, *partition)?;
    let item_bank = item_bank
        .as_ref()
        .map(util::read_item_bank_file)
        .transpose()?;

    let analyzer = config.analyzer(*workers);
    let report = analyzer.analyze_with_progress(&observations, log_progress);
    let mut report = report.with_policy(config.policy_settings().policy(*scheme));

    let universe = match &item_bank {
        Some(bank) => {
            report.fill_sentence_text(bank);
            bank.sentence_ids()
        }
        None => observations.iter().map(|o| o.sentence_id).collect(),
    };
    let excluded_ids = report.excluded_ids(universe);
    for failure in &report.failures {
        warn!(
            sentence_id = failure.sentence_id,
            status = %failure.status,
            snr_levels = failure.snr_levels,
            "sentence excluded"
        );
    }

    let output_data = AnalysisOutput::new(*scheme, report, excluded_ids);
    let overview = &output_data.overview;
    info!(
        analyzed = overview.analyzed,
        excluded = output_data.excluded_ids.len(),
        mean_snr_50 = ?overview.mean_snr_50,
        mean_slope = ?overview.mean_slope,
        %scheme,
        "analysis completed"
    );
    for (validity, count) in &overview.validity_counts {
        info!(%validity, count, "validity");
    }

    Output::save_json(&output_data, output.clone())?;
    Ok(())
}

fn log_progress(progress: BatchProgress) {
    let BatchProgress { completed, total } = progress;
    let step = (total / 10).max(1);
    if completed % step == 0 || completed == total {
        info!(completed, total, "fitting sentences");
    }
}
