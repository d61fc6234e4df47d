//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during the analysis pipeline
//! - exported to JSON/CSV
//! - reloaded later for comparisons across runs
//!
//! Entities flow strictly downstream:
//! `ScoreRecord -> CorrelationRecord -> EffectSize -> PairResult`, and
//! independently `EffectSize(s) -> MetaFit`. Nothing is mutated after
//! creation; each stage produces a new collection.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Fixed z critical value for two-sided 95% intervals.
///
/// The original reporting convention uses 1.96 everywhere (transformed-scale
/// Wald intervals). Downstream figures depend on this exact constant, so it is
/// deliberately not configurable.
pub const Z_95: f64 = 1.96;

/// One of the four IRAP trial types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrialType {
    Tt1,
    Tt2,
    Tt3,
    Tt4,
}

impl TrialType {
    pub const ALL: [TrialType; 4] = [
        TrialType::Tt1,
        TrialType::Tt2,
        TrialType::Tt3,
        TrialType::Tt4,
    ];

    /// Column name in the input CSV (and label in reports).
    pub fn column_name(self) -> &'static str {
        match self {
            TrialType::Tt1 => "tt1",
            TrialType::Tt2 => "tt2",
            TrialType::Tt3 => "tt3",
            TrialType::Tt4 => "tt4",
        }
    }
}

/// An unordered pair of distinct trial types.
///
/// Construction is restricted to the six canonical pairs so that a pair label
/// in one record always compares equal to the same pair in another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TrialTypePair {
    pub a: TrialType,
    pub b: TrialType,
}

impl TrialTypePair {
    /// The six unordered pairs from {tt1..tt4}, in canonical order.
    pub const ALL: [TrialTypePair; 6] = [
        TrialTypePair { a: TrialType::Tt1, b: TrialType::Tt2 },
        TrialTypePair { a: TrialType::Tt1, b: TrialType::Tt3 },
        TrialTypePair { a: TrialType::Tt1, b: TrialType::Tt4 },
        TrialTypePair { a: TrialType::Tt2, b: TrialType::Tt3 },
        TrialTypePair { a: TrialType::Tt2, b: TrialType::Tt4 },
        TrialTypePair { a: TrialType::Tt3, b: TrialType::Tt4 },
    ];

    /// Compact label for tables and exports, e.g. `tt1-tt2`.
    pub fn label(self) -> String {
        format!("{}-{}", self.a.column_name(), self.b.column_name())
    }
}

/// One participant's scores at the analyzed timepoint.
#[derive(Debug, Clone)]
pub struct ScoreRecord {
    pub participant: String,
    pub domain: String,
    pub scores: [f64; 4],
}

impl ScoreRecord {
    pub fn score(&self, tt: TrialType) -> f64 {
        match tt {
            TrialType::Tt1 => self.scores[0],
            TrialType::Tt2 => self.scores[1],
            TrialType::Tt3 => self.scores[2],
            TrialType::Tt4 => self.scores[3],
        }
    }
}

/// Why a per-pair result is (or is not) usable downstream.
///
/// Degenerate inputs are surfaced on the affected record rather than failing
/// the run: one bad domain must not block reporting for the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Ok,
    /// Domain has n <= 3 participants; `1/(n-3)` is ill-defined.
    SmallSample,
    /// A trial-type column is constant within the domain; r is undefined.
    ZeroVariance,
    /// |r| = 1; the Fisher transform diverges.
    UnitCorrelation,
}

impl RecordStatus {
    pub fn is_ok(self) -> bool {
        matches!(self, RecordStatus::Ok)
    }

    /// Short label for tables and exports.
    pub fn label(self) -> &'static str {
        match self {
            RecordStatus::Ok => "ok",
            RecordStatus::SmallSample => "small_sample",
            RecordStatus::ZeroVariance => "zero_variance",
            RecordStatus::UnitCorrelation => "unit_correlation",
        }
    }
}

/// Pearson correlation for one trial-type pair within one domain.
///
/// `r` is NaN whenever `status != Ok`; the NaN is propagated deliberately so
/// downstream stages can detect and reject it instead of seeing a default.
#[derive(Debug, Clone)]
pub struct CorrelationRecord {
    pub domain: String,
    pub pair: TrialTypePair,
    pub r: f64,
    /// Participants in the domain. The same n applies to all six pairs.
    pub n: usize,
    pub status: RecordStatus,
}

/// Fisher-z effect size layered on a correlation record.
///
/// `yi = atanh(r)`, `vi = 1/(n-3)`; both NaN when the record is unusable.
#[derive(Debug, Clone)]
pub struct EffectSize {
    pub record: CorrelationRecord,
    pub yi: f64,
    pub vi: f64,
}

impl EffectSize {
    /// True when this effect can enter the meta-analysis.
    pub fn is_usable(&self) -> bool {
        self.record.status.is_ok() && self.yi.is_finite() && self.vi.is_finite() && self.vi > 0.0
    }
}

/// Confidence interval and significance flag for one pair.
///
/// Bounds are on the correlation scale (back-transformed from z). All four
/// derived fields are NaN/false when the underlying effect is unusable.
#[derive(Debug, Clone)]
pub struct PairResult {
    pub effect: EffectSize,
    pub se: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
    pub sig: bool,
}

/// How the between-domain variance component was estimated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TauMethod {
    /// Restricted maximum likelihood (deterministic grid + refinement).
    Reml,
    /// DerSimonian-Laird method of moments.
    Dl,
}

impl TauMethod {
    pub fn display_name(self) -> &'static str {
        match self {
            TauMethod::Reml => "REML",
            TauMethod::Dl => "DL",
        }
    }
}

/// Random-effects meta-analysis output.
///
/// All pooled quantities live on the z-scale; use the `*_r` accessors for
/// correlation-scale reporting. Read-only once computed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFit {
    /// Number of pooled effect sizes.
    pub k: usize,
    /// Number of distinct domains contributing.
    pub n_domains: usize,
    pub pooled_z: f64,
    pub se: f64,
    pub ci_lower_z: f64,
    pub ci_upper_z: f64,
    pub pi_lower_z: f64,
    pub pi_upper_z: f64,
    /// Between-domain variance component (clamped to >= 0).
    pub tau2: f64,
    pub q: f64,
    pub q_df: usize,
    /// NaN when q_df == 0 (a single effect size).
    pub q_pvalue: f64,
    pub tau_method: TauMethod,
    /// True when REML failed to converge and the DL estimate was used instead.
    pub fell_back: bool,
}

impl MetaFit {
    pub fn pooled_r(&self) -> f64 {
        self.pooled_z.tanh()
    }

    pub fn ci_r(&self) -> (f64, f64) {
        (self.ci_lower_z.tanh(), self.ci_upper_z.tanh())
    }

    pub fn pi_r(&self) -> (f64, f64) {
        (self.pi_lower_z.tanh(), self.pi_upper_z.tanh())
    }
}

/// Derived scalar summaries for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryStats {
    /// Pairs with a defined correlation/interval.
    pub n_defined: usize,
    /// Pairs flagged degenerate (small sample, zero variance, |r| = 1).
    pub n_undefined: usize,
    pub n_significant: usize,
    /// Percent of defined pairs that are significant.
    pub pct_significant: f64,
    pub n_domains: usize,
    pub n_domains_with_sig: usize,
    /// Percent of domains with at least one significant pair.
    pub pct_domains_with_sig: f64,
}

/// A full run's configuration as understood by the pipeline.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    pub input_path: PathBuf,
    /// Timepoint label to keep (matched case-insensitively).
    pub timepoint: String,
    /// Name of the boolean quality-criterion column.
    pub criterion_column: String,
    /// Skip the criterion filter entirely (keep every row at the timepoint).
    pub no_criterion_filter: bool,
    /// Domains with fewer participants are still reported, but flagged.
    pub min_n_warn: usize,
    pub tau_method: TauMethod,
    /// Iteration cap for the REML refinement.
    pub reml_max_iter: usize,

    pub plot: bool,
    pub plot_width: usize,
    pub plot_height: usize,

    pub export_results: Option<PathBuf>,
    pub export_meta: Option<PathBuf>,
    pub debug_bundle: bool,
}

/// A saved meta-analysis file (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub tool: String,
    pub input: String,
    pub timepoint: String,
    pub fit: MetaFit,
    pub pooled_r: f64,
    pub ci_r: (f64, f64),
    pub pi_r: (f64, f64),
    pub summary: SummaryStats,
}
