//! Read/write meta-analysis JSON files.
//!
//! The meta JSON is the "portable" representation of a pooled run:
//! - the full `MetaFit` (z-scale)
//! - correlation-scale conveniences (pooled r, CI, prediction interval)
//! - summary scalars and run metadata
//!
//! The schema is defined by `domain::MetaFile`.

use std::fs::File;
use std::path::Path;

use crate::domain::{AnalysisConfig, MetaFile, MetaFit, SummaryStats};
use crate::error::AppError;

/// Write a meta-analysis JSON file.
pub fn write_meta_json(
    path: &Path,
    fit: &MetaFit,
    summary: &SummaryStats,
    config: &AnalysisConfig,
) -> Result<(), AppError> {
    let file = File::create(path).map_err(|e| {
        AppError::usage(format!(
            "Failed to create meta JSON '{}': {e}",
            path.display()
        ))
    })?;

    let out = MetaFile {
        tool: "irap".to_string(),
        input: config.input_path.display().to_string(),
        timepoint: config.timepoint.clone(),
        fit: fit.clone(),
        pooled_r: fit.pooled_r(),
        ci_r: fit.ci_r(),
        pi_r: fit.pi_r(),
        summary: summary.clone(),
    };

    serde_json::to_writer_pretty(file, &out)
        .map_err(|e| AppError::compute(format!("Failed to write meta JSON: {e}")))?;

    Ok(())
}

/// Read a meta-analysis JSON file.
pub fn read_meta_json(path: &Path) -> Result<MetaFile, AppError> {
    let file = File::open(path).map_err(|e| {
        AppError::usage(format!("Failed to open meta JSON '{}': {e}", path.display()))
    })?;
    let meta: MetaFile = serde_json::from_reader(file)
        .map_err(|e| AppError::usage(format!("Invalid meta JSON: {e}")))?;
    Ok(meta)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TauMethod;

    #[test]
    fn meta_json_round_trips() {
        let fit = MetaFit {
            k: 12,
            n_domains: 2,
            pooled_z: 0.35,
            se: 0.08,
            ci_lower_z: 0.1932,
            ci_upper_z: 0.5068,
            pi_lower_z: 0.05,
            pi_upper_z: 0.65,
            tau2: 0.02,
            q: 18.4,
            q_df: 11,
            q_pvalue: 0.073,
            tau_method: TauMethod::Reml,
            fell_back: false,
        };
        let summary = SummaryStats {
            n_defined: 12,
            n_undefined: 0,
            n_significant: 7,
            pct_significant: 58.33,
            n_domains: 2,
            n_domains_with_sig: 2,
            pct_domains_with_sig: 100.0,
        };
        let config = AnalysisConfig {
            input_path: "scores.csv".into(),
            timepoint: "1".to_string(),
            criterion_column: "passed".to_string(),
            no_criterion_filter: false,
            min_n_warn: 4,
            tau_method: TauMethod::Reml,
            reml_max_iter: 500,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_results: None,
            export_meta: None,
            debug_bundle: false,
        };

        let path = std::env::temp_dir().join(format!("irap-meta-{}.json", std::process::id()));
        write_meta_json(&path, &fit, &summary, &config).unwrap();
        let back = read_meta_json(&path).unwrap();
        std::fs::remove_file(&path).ok();

        assert_eq!(back.fit.k, 12);
        assert!((back.pooled_r - fit.pooled_r()).abs() < 1e-12);
        assert_eq!(back.summary.n_significant, 7);
        assert_eq!(back.timepoint, "1");
    }
}
