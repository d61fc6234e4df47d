//! Debug bundle writer for inspecting a full analysis run.
//!
//! Writes a timestamped markdown file under `debug/` containing the dataset
//! stats, every per-pair record (including degenerate ones), and the pooled
//! fit. Useful when a reported figure looks off and you need the
//! intermediate numbers without re-running under a debugger.

use std::fs::{File, create_dir_all};
use std::io::Write;
use std::path::PathBuf;

use chrono::Local;

use crate::domain::{AnalysisConfig, MetaFit, PairResult, SummaryStats};
use crate::error::AppError;
use crate::io::ingest::IngestedData;

pub fn write_debug_bundle(
    ingest: &IngestedData,
    results: &[PairResult],
    fit: Option<&MetaFit>,
    summary: &SummaryStats,
    config: &AnalysisConfig,
) -> Result<PathBuf, AppError> {
    let dir = PathBuf::from("debug");
    create_dir_all(&dir)
        .map_err(|e| AppError::compute(format!("Failed to create debug dir: {e}")))?;

    let ts = Local::now().format("%Y%m%d_%H%M%S");
    let path = dir.join(format!("irap_debug_tp{}_{ts}.md", config.timepoint));

    let mut file = File::create(&path)
        .map_err(|e| AppError::compute(format!("Failed to create debug file: {e}")))?;

    writeln!(file, "# irap debug bundle")
        .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- generated: {}", Local::now().to_rfc3339())
        .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- input: {}", config.input_path.display())
        .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;
    writeln!(file, "- timepoint: {}", config.timepoint)
        .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;
    writeln!(
        file,
        "- criterion: {}",
        if config.no_criterion_filter {
            "off".to_string()
        } else {
            config.criterion_column.clone()
        }
    )
    .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;
    writeln!(
        file,
        "- rows: read={} used={} excluded_by_criterion={} row_errors={}",
        ingest.rows_read,
        ingest.rows_used,
        ingest.rows_excluded_criterion,
        ingest.row_errors.len()
    )
    .map_err(|e| AppError::compute(format!("Failed to write debug header: {e}")))?;

    writeln!(file, "\n## Domains")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    writeln!(file, "| domain | n |")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - |")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    for (domain, n) in &ingest.stats.domain_counts {
        writeln!(file, "| {domain} | {n} |")
            .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    }

    writeln!(file, "\n## Pairs")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    writeln!(
        file,
        "| domain | pair | n | r | yi | vi | se | ci_lower | ci_upper | sig | status |"
    )
    .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    writeln!(file, "| - | - | - | - | - | - | - | - | - | - | - |")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    for pr in results {
        let rec = &pr.effect.record;
        writeln!(
            file,
            "| {} | {} | {} | {:.6} | {:.6} | {:.6} | {:.6} | {:.6} | {:.6} | {} | {} |",
            rec.domain,
            rec.pair.label(),
            rec.n,
            rec.r,
            pr.effect.yi,
            pr.effect.vi,
            pr.se,
            pr.ci_lower,
            pr.ci_upper,
            pr.sig,
            rec.status.label()
        )
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    }

    writeln!(file, "\n## Meta-analysis")
        .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
    match fit {
        Some(fit) => {
            writeln!(
                file,
                "- k={} domains={} method={}{}",
                fit.k,
                fit.n_domains,
                fit.tau_method.display_name(),
                if fit.fell_back { " (DL fallback)" } else { "" }
            )
            .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
            writeln!(
                file,
                "- pooled_z={:.6} se={:.6} ci_z=[{:.6}, {:.6}] pi_z=[{:.6}, {:.6}]",
                fit.pooled_z, fit.se, fit.ci_lower_z, fit.ci_upper_z, fit.pi_lower_z, fit.pi_upper_z
            )
            .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
            writeln!(
                file,
                "- pooled_r={:.6} tau2={:.8} Q={:.6} df={} p={:.6}",
                fit.pooled_r(),
                fit.tau2,
                fit.q,
                fit.q_df,
                fit.q_pvalue
            )
            .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
        }
        None => {
            writeln!(file, "- not estimable (no usable effect sizes)")
                .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;
        }
    }

    writeln!(
        file,
        "\n## Summary\n- defined={} undefined={} significant={} domains={} domains_with_sig={}",
        summary.n_defined,
        summary.n_undefined,
        summary.n_significant,
        summary.n_domains,
        summary.n_domains_with_sig
    )
    .map_err(|e| AppError::compute(format!("Failed to write debug: {e}")))?;

    Ok(path)
}
