use std::path::PathBuf;

use anyhow::ensure;
use chrono::Utc;
use qsin_analysis::simulate::{self, SessionSimulator};
use rand::Rng as _;
use tracing::info;

use crate::util::{self, Output};

#[derive(Default, Debug, Clone, clap::Args)]
pub(crate) struct GenerateArg {
    /// Item bank JSON file
    item_bank: PathBuf,
    /// SNR levels in dB to administer the bank at
    #[arg(long, required = true, allow_negative_numbers = true)]
    snr_level: Vec<f64>,
    /// Sessions per SNR level
    #[arg(long, default_value_t = 1)]
    sessions: usize,
    /// Random seed, drawn from the OS when omitted
    #[arg(long)]
    seed: Option<u64>,
    /// Output file path
    #[arg(long)]
    output: Option<PathBuf>,
}

pub(crate) fn run(arg: &GenerateArg) -> anyhow::Result<()> {
    let GenerateArg {
        item_bank,
        snr_level,
        sessions,
        seed,
        output,
    } = arg;

    ensure!(
        snr_level.iter().all(|snr| snr.is_finite()),
        "SNR levels must be finite"
    );
    let bank = util::read_item_bank_file(item_bank)?;
    let seed = seed.unwrap_or_else(|| rand::rng().random());
    info!(sentences = bank.len(), seed, "generating sessions");

    let mut simulator = SessionSimulator::new(seed);
    let timestamp = Utc::now().timestamp();
    let mut records = vec![];
    let mut session_count = 0;
    for &snr in snr_level {
        for _ in 0..*sessions {
            let session_id = simulate::test_session_id(format!("{timestamp}_{session_count}"));
            records.extend(simulator.administer(&bank, &session_id, snr));
            session_count += 1;
        }
    }
    info!(sessions = session_count, records = records.len(), "sessions generated");

    Output::save_json(&records, output.clone())?;
    Ok(())
}
