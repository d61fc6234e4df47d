//! The analysis pipeline: ingest -> correlate -> effect sizes -> pool.
//!
//! Kept free of any terminal I/O so it can be driven identically by every
//! subcommand and by tests.

use crate::analysis::{correlate_all, derive_pair_results};
use crate::domain::{AnalysisConfig, MetaFit, PairResult, SummaryStats};
use crate::error::AppError;
use crate::io::ingest::{IngestedData, load_score_records};
use crate::meta::run_meta;
use crate::report::summarize;

/// Everything a full run produces.
///
/// The pooled fit is carried as a `Result`: a dataset where every pair is
/// degenerate still has a reportable table, so meta failure must not take
/// the rest of the output down with it. Callers that need the fit (the
/// `meta` subcommand, exports) propagate the error at their level.
pub struct RunOutput {
    pub ingest: IngestedData,
    pub results: Vec<PairResult>,
    pub meta: Result<MetaFit, AppError>,
    pub summary: SummaryStats,
}

/// Run the full pipeline for one configuration.
pub fn run_analysis(config: &AnalysisConfig) -> Result<RunOutput, AppError> {
    let ingest = load_score_records(config)?;
    let correlations = correlate_all(&ingest.records);
    let results = derive_pair_results(correlations);
    let meta = run_meta(&results, config.tau_method, config.reml_max_iter);
    let summary = summarize(&results);

    Ok(RunOutput {
        ingest,
        results,
        meta,
        summary,
    })
}
