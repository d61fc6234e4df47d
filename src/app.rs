//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments
//! - generates synthetic samples
//! - runs the correlation + meta-analysis pipeline
//! - prints reports/plots
//! - writes optional exports and debug bundles

use clap::Parser;

use crate::cli::{Command, RunArgs, SampleArgs, ShowArgs};
use crate::domain::AnalysisConfig;
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `irap` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();

    match cli.command {
        Command::Run(args) => handle_run(args, OutputMode::Full),
        Command::Table(args) => handle_run(args, OutputMode::TableOnly),
        Command::Meta(args) => handle_run(args, OutputMode::MetaOnly),
        Command::Sample(args) => handle_sample(args),
        Command::Show(args) => handle_show(args),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputMode {
    Full,
    TableOnly,
    MetaOnly,
}

fn handle_run(args: RunArgs, mode: OutputMode) -> Result<(), AppError> {
    let config = analysis_config_from_args(&args);
    let run = pipeline::run_analysis(&config)?;

    if mode == OutputMode::Full {
        println!("{}", crate::report::format_run_summary(&run.ingest, &config));
    }

    if mode != OutputMode::MetaOnly {
        println!("{}", crate::report::format_pair_table(&run.results));
    }

    match (&run.meta, mode) {
        (Ok(fit), OutputMode::Full | OutputMode::MetaOnly) => {
            println!("{}", crate::report::format_meta_summary(fit));
        }
        (Err(e), OutputMode::MetaOnly) => return Err(e.clone()),
        (Err(e), OutputMode::Full) => {
            println!("Random-effects meta-analysis: not estimable ({e})");
        }
        (_, OutputMode::TableOnly) => {}
    }

    if mode == OutputMode::Full {
        println!("{}", crate::report::format_summary_stats(&run.summary));

        if config.plot {
            if let Ok(fit) = &run.meta {
                let plot = crate::report::render_caterpillar(
                    &run.results,
                    fit,
                    config.plot_width,
                    config.plot_height,
                );
                println!("{plot}");
            }
        }
    }

    // Optional exports.
    if let Some(path) = &config.export_results {
        crate::io::export::write_results_csv(path, &run.results)?;
        eprintln!("Wrote results CSV: {}", path.display());
    }
    if let Some(path) = &config.export_meta {
        let fit = run.meta.as_ref().map_err(AppError::clone)?;
        crate::io::meta_file::write_meta_json(path, fit, &run.summary, &config)?;
        eprintln!("Wrote meta JSON: {}", path.display());
    }
    if config.debug_bundle {
        let bundle = crate::debug::write_debug_bundle(
            &run.ingest,
            &run.results,
            run.meta.as_ref().ok(),
            &run.summary,
            &config,
        )?;
        eprintln!("Wrote debug bundle: {}", bundle.display());
    }

    Ok(())
}

fn handle_sample(args: SampleArgs) -> Result<(), AppError> {
    let config = crate::data::SampleConfig {
        domains: args.domains,
        participants: args.participants,
        rho: args.rho,
        pass_rate: args.pass_rate,
        seed: args.seed,
    };
    let rows = crate::data::generate_sample(&config)?;
    crate::data::write_sample_csv(&args.out, &rows)?;
    println!(
        "Wrote {} rows ({} domains x {} participants x 2 timepoints) to {}",
        rows.len(),
        args.domains,
        args.participants,
        args.out.display()
    );
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    let saved = crate::io::meta_file::read_meta_json(&args.meta)?;
    println!(
        "Saved meta-analysis for {} (timepoint {})",
        saved.input, saved.timepoint
    );
    println!("{}", crate::report::format_meta_summary(&saved.fit));
    println!("{}", crate::report::format_summary_stats(&saved.summary));
    Ok(())
}

pub fn analysis_config_from_args(args: &RunArgs) -> AnalysisConfig {
    AnalysisConfig {
        input_path: args.input.clone(),
        timepoint: args.timepoint.clone(),
        criterion_column: args.criterion.clone(),
        no_criterion_filter: args.no_criterion_filter,
        min_n_warn: args.min_n,
        tau_method: args.tau_method,
        reml_max_iter: args.reml_max_iter,
        plot: !args.no_plot,
        plot_width: args.width,
        plot_height: args.height,
        export_results: args.export.clone(),
        export_meta: args.export_meta.clone(),
        debug_bundle: args.debug_bundle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn config_from_args_maps_every_flag() {
        let cli = crate::cli::Cli::parse_from([
            "irap",
            "run",
            "-i",
            "scores.csv",
            "-t",
            "2",
            "--criterion",
            "quality_ok",
            "--no-plot",
            "--tau-method",
            "dl",
            "--export",
            "out.csv",
        ]);
        let args = match cli.command {
            Command::Run(args) => args,
            _ => panic!("expected run"),
        };
        let config = analysis_config_from_args(&args);
        assert_eq!(config.timepoint, "2");
        assert_eq!(config.criterion_column, "quality_ok");
        assert!(!config.plot);
        assert_eq!(config.tau_method, crate::domain::TauMethod::Dl);
        assert_eq!(config.export_results.as_deref(), Some("out.csv".as_ref()));
        assert!(config.export_meta.is_none());
    }

    #[test]
    fn plot_is_on_unless_suppressed() {
        let cli = crate::cli::Cli::parse_from(["irap", "run", "-i", "scores.csv"]);
        let args = match cli.command {
            Command::Run(args) => args,
            _ => panic!("expected run"),
        };
        assert!(analysis_config_from_args(&args).plot);
    }

    #[test]
    fn show_reprints_a_saved_fit() {
        use crate::domain::{MetaFit, SummaryStats, TauMethod};

        let fit = MetaFit {
            k: 6,
            n_domains: 2,
            pooled_z: 0.25,
            se: 0.07,
            ci_lower_z: 0.1128,
            ci_upper_z: 0.3872,
            pi_lower_z: 0.05,
            pi_upper_z: 0.45,
            tau2: 0.005,
            q: 7.2,
            q_df: 5,
            q_pvalue: 0.206,
            tau_method: TauMethod::Reml,
            fell_back: false,
        };
        let summary = SummaryStats {
            n_defined: 6,
            n_undefined: 0,
            n_significant: 3,
            pct_significant: 50.0,
            n_domains: 2,
            n_domains_with_sig: 2,
            pct_domains_with_sig: 100.0,
        };
        let config = AnalysisConfig {
            input_path: "scores.csv".into(),
            timepoint: "1".to_string(),
            criterion_column: "passed".to_string(),
            no_criterion_filter: false,
            min_n_warn: 10,
            tau_method: TauMethod::Reml,
            reml_max_iter: 500,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_results: None,
            export_meta: None,
            debug_bundle: false,
        };

        let path = std::env::temp_dir().join(format!("irap-show-{}.json", std::process::id()));
        crate::io::meta_file::write_meta_json(&path, &fit, &summary, &config).unwrap();
        handle_show(ShowArgs { meta: path.clone() }).unwrap();
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn show_missing_file_is_a_usage_error() {
        let err = handle_show(ShowArgs {
            meta: "does-not-exist.json".into(),
        })
        .unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
