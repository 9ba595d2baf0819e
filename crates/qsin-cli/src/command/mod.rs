use clap::{Parser, Subcommand};

use self::{
    analyze::AnalyzeArg, classify::ClassifyArg, curves::CurvesArg, fit::FitArg,
    generate::GenerateArg,
};

mod analyze;
mod classify;
mod curves;
mod fit;
mod generate;

#[derive(Debug, Clone, Parser)]
#[command(author, version, about, long_about = None)]
pub struct CommandArgs {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Debug, Clone, Subcommand)]
enum Mode {
    /// Fit every sentence and write the analysis report
    Analyze(#[clap(flatten)] AnalyzeArg),
    /// Fit a single sentence and write the full fit result
    Fit(#[clap(flatten)] FitArg),
    /// Regrade an analysis report with another validity scheme
    Classify(#[clap(flatten)] ClassifyArg),
    /// Rebuild the psychometric curves of an analysis report
    Curves(#[clap(flatten)] CurvesArg),
    /// Generate synthetic trial records for an item bank
    Generate(#[clap(flatten)] GenerateArg),
}

pub fn run() -> anyhow::Result<()> {
    let args = CommandArgs::parse();
    match args.mode {
        Mode::Analyze(arg) => analyze::run(&arg)?,
        Mode::Fit(arg) => fit::run(&arg)?,
        Mode::Classify(arg) => classify::run(&arg)?,
        Mode::Curves(arg) => curves::run(&arg)?,
        Mode::Generate(arg) => generate::run(&arg)?,
    }
    Ok(())
}
