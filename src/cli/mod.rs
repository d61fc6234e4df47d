//! Command-line interface (clap derive).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::TauMethod;

#[derive(Debug, Parser)]
#[command(
    name = "irap",
    version,
    about = "IRAP trial-type correlation meta-analysis",
    long_about = "Correlates the four IRAP trial-type scores within each stimulus domain,\n\
                  converts the correlations to Fisher-z effect sizes, and pools them with a\n\
                  random-effects meta-analysis (domain as random intercept)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Full analysis: tables, pooled fit, summary, and optional plot/exports.
    Run(RunArgs),
    /// Per-domain correlation table only.
    Table(RunArgs),
    /// Pooled meta-analysis block only.
    Meta(RunArgs),
    /// Generate a synthetic scores CSV with a known correlation structure.
    Sample(SampleArgs),
    /// Reprint the pooled fit from a saved meta JSON (see --export-meta).
    Show(ShowArgs),
}

#[derive(Debug, Args, Clone)]
pub struct RunArgs {
    /// Scores CSV (participant, domain, timepoint, criterion, tt1..tt4).
    #[arg(short = 'i', long)]
    pub input: PathBuf,

    /// Timepoint label to analyze (matched case-insensitively).
    #[arg(short = 't', long, default_value = "1")]
    pub timepoint: String,

    /// Boolean column marking participants who met the quality criterion.
    #[arg(long, default_value = "passed")]
    pub criterion: String,

    /// Keep every row at the timepoint, ignoring the criterion column.
    #[arg(long)]
    pub no_criterion_filter: bool,

    /// Flag domains with fewer participants than this in the run header.
    #[arg(long, default_value_t = 10)]
    pub min_n: usize,

    /// Between-domain variance estimator.
    #[arg(long, value_enum, default_value_t = TauMethod::Reml)]
    pub tau_method: TauMethod,

    /// Iteration cap for the REML refinement (DL fallback on overrun).
    #[arg(long, default_value_t = 500)]
    pub reml_max_iter: usize,

    /// Suppress the ASCII caterpillar plot (rendered by default for `run`).
    #[arg(long)]
    pub no_plot: bool,

    /// Plot width in characters.
    #[arg(long, default_value_t = 100)]
    pub width: usize,

    /// Maximum plot rows before subsetting.
    #[arg(long, default_value_t = 30)]
    pub height: usize,

    /// Write the per-pair results table as CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Write the pooled fit as JSON.
    #[arg(long)]
    pub export_meta: Option<PathBuf>,

    /// Write a timestamped markdown bundle with all intermediates.
    #[arg(long)]
    pub debug_bundle: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Meta JSON file written by a previous run's --export-meta.
    #[arg(short = 'm', long)]
    pub meta: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Output CSV path.
    #[arg(short = 'o', long)]
    pub out: PathBuf,

    /// Number of stimulus domains.
    #[arg(long, default_value_t = 5)]
    pub domains: usize,

    /// Participants per domain.
    #[arg(long, default_value_t = 30)]
    pub participants: usize,

    /// Target inter-trial-type correlation, in [0, 1).
    #[arg(long, default_value_t = 0.3)]
    pub rho: f64,

    /// Probability a participant passes the quality criterion.
    #[arg(long, default_value_t = 0.9)]
    pub pass_rate: f64,

    /// RNG seed (generation is deterministic given the seed).
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn run_defaults_are_applied() {
        let cli = Cli::parse_from(["irap", "run", "-i", "scores.csv"]);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.timepoint, "1");
                assert_eq!(args.criterion, "passed");
                assert_eq!(args.tau_method, TauMethod::Reml);
                assert_eq!(args.reml_max_iter, 500);
                assert!(!args.no_plot);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn sample_flags_parse() {
        let cli = Cli::parse_from([
            "irap", "sample", "-o", "demo.csv", "--domains", "3", "--rho", "0.4", "--seed", "7",
        ]);
        match cli.command {
            Command::Sample(args) => {
                assert_eq!(args.domains, 3);
                assert_eq!(args.seed, 7);
                assert!((args.rho - 0.4).abs() < 1e-12);
            }
            _ => panic!("expected sample subcommand"),
        }
    }

    #[test]
    fn show_takes_a_meta_json_path() {
        let cli = Cli::parse_from(["irap", "show", "-m", "fit.json"]);
        match cli.command {
            Command::Show(args) => {
                assert_eq!(args.meta, PathBuf::from("fit.json"));
            }
            _ => panic!("expected show subcommand"),
        }
    }

    #[test]
    fn tau_method_value_enum_parses_dl() {
        let cli = Cli::parse_from(["irap", "meta", "-i", "x.csv", "--tau-method", "dl"]);
        match cli.command {
            Command::Meta(args) => assert_eq!(args.tau_method, TauMethod::Dl),
            _ => panic!("expected meta subcommand"),
        }
    }
}
