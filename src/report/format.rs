//! Formatted terminal output.
//!
//! We keep formatting code in one place so:
//! - the statistics code stays clean and testable
//! - output changes are localized (important for future snapshot tests)

use crate::domain::{AnalysisConfig, MetaFit, PairResult, SummaryStats};
use crate::io::ingest::IngestedData;

/// Round half away from zero to `digits` decimals.
///
/// Presentation-layer convention carried over from the original report;
/// Rust's default `{:.n}` rounds half to even, which would flip a handful
/// of reported figures.
pub fn round_half_up(v: f64, digits: u32) -> f64 {
    if !v.is_finite() {
        return v;
    }
    let factor = 10f64.powi(digits as i32);
    (v.abs() * factor + 0.5).floor() / factor * v.signum()
}

/// Format the run header (dataset stats + filters).
pub fn format_run_summary(ingest: &IngestedData, config: &AnalysisConfig) -> String {
    let mut out = String::new();

    out.push_str("=== irap - trial-type correlation meta-analysis ===\n");
    out.push_str(&format!("Input: {}\n", config.input_path.display()));
    out.push_str(&format!("Timepoint: {}\n", config.timepoint));
    if config.no_criterion_filter {
        out.push_str("Criterion filter: off\n");
    } else {
        out.push_str(&format!(
            "Criterion: `{}` ({} rows excluded)\n",
            config.criterion_column, ingest.rows_excluded_criterion
        ));
    }
    out.push_str(&format!(
        "Rows: read={} used={} | score range=[{:.3}, {:.3}]\n",
        ingest.rows_read, ingest.rows_used, ingest.stats.score_min, ingest.stats.score_max
    ));

    out.push_str("Domains:\n");
    for (domain, n) in &ingest.stats.domain_counts {
        let flag = if *n < config.min_n_warn { " (small n)" } else { "" };
        out.push_str(&format!("  {domain:<24} n={n}{flag}\n"));
    }

    if !ingest.row_errors.is_empty() {
        out.push_str(&format!("Row errors: {} (first shown below)\n", ingest.row_errors.len()));
        if let Some(e) = ingest.row_errors.first() {
            out.push_str(&format!("  line {}: {}\n", e.line, e.message));
        }
    }

    out
}

/// Format the per-domain, per-pair correlation table.
pub fn format_pair_table(results: &[PairResult]) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{:<20} {:<9} {:>4} {:>7} {:>8} {:>8} {:>4} {:<16}\n",
        "domain", "pair", "n", "r", "ci_lo", "ci_hi", "sig", "status"
    ));
    out.push_str(&format!(
        "{:-<20} {:-<9} {:-<4} {:-<7} {:-<8} {:-<8} {:-<4} {:-<16}\n",
        "", "", "", "", "", "", "", ""
    ));

    for pr in results {
        let rec = &pr.effect.record;
        out.push_str(&format!(
            "{:<20} {:<9} {:>4} {:>7} {:>8} {:>8} {:>4} {:<16}\n",
            truncate(&rec.domain, 20),
            rec.pair.label(),
            rec.n,
            fmt_r(rec.r),
            fmt_r(pr.ci_lower),
            fmt_r(pr.ci_upper),
            if pr.sig { "*" } else { "" },
            rec.status.label(),
        ));
    }

    out
}

/// Format the pooled meta-analysis block.
pub fn format_meta_summary(fit: &MetaFit) -> String {
    let mut out = String::new();
    let (ci_lo, ci_hi) = fit.ci_r();
    let (pi_lo, pi_hi) = fit.pi_r();

    out.push_str("Random-effects meta-analysis (domain as random intercept):\n");
    out.push_str(&format!(
        "- k={} effects across {} domains\n",
        fit.k, fit.n_domains
    ));
    out.push_str(&format!(
        "- pooled r = {} [95% CI {}, {}]\n",
        fmt_r(fit.pooled_r()),
        fmt_r(ci_lo),
        fmt_r(ci_hi)
    ));
    out.push_str(&format!(
        "- prediction interval [{}, {}]\n",
        fmt_r(pi_lo),
        fmt_r(pi_hi)
    ));
    out.push_str(&format!(
        "- tau^2 = {:.4} ({}{})\n",
        round_half_up(fit.tau2, 4),
        fit.tau_method.display_name(),
        if fit.fell_back {
            ", fell back to DL after non-convergence"
        } else {
            ""
        }
    ));
    out.push_str(&format!(
        "- Q = {:.3}, df = {}, p = {}\n",
        round_half_up(fit.q, 3),
        fit.q_df,
        fmt_p(fit.q_pvalue)
    ));

    out
}

/// Format the derived scalar summaries.
pub fn format_summary_stats(summary: &SummaryStats) -> String {
    let mut out = String::new();
    out.push_str("Summary:\n");
    out.push_str(&format!(
        "- {} of {} defined correlations significant ({}%)\n",
        summary.n_significant,
        summary.n_defined,
        fmt_pct(summary.pct_significant)
    ));
    out.push_str(&format!(
        "- {} of {} domains with >=1 significant correlation ({}%)\n",
        summary.n_domains_with_sig,
        summary.n_domains,
        fmt_pct(summary.pct_domains_with_sig)
    ));
    if summary.n_undefined > 0 {
        out.push_str(&format!(
            "- {} pair(s) undefined (small sample / zero variance / |r|=1)\n",
            summary.n_undefined
        ));
    }
    out
}

fn fmt_r(v: f64) -> String {
    if v.is_finite() {
        format!("{:.2}", round_half_up(v, 2))
    } else {
        "NA".to_string()
    }
}

fn fmt_p(p: f64) -> String {
    if !p.is_finite() {
        "NA".to_string()
    } else if p < 0.001 {
        "<.001".to_string()
    } else {
        format!("{:.3}", round_half_up(p, 3))
    }
}

fn fmt_pct(v: f64) -> String {
    if v.is_finite() {
        format!("{:.1}", round_half_up(v, 1))
    } else {
        "NA".to_string()
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out = String::new();
    for (i, ch) in s.chars().enumerate() {
        if i + 1 >= max {
            break;
        }
        out.push(ch);
    }
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{effect_size, significance};
    use crate::domain::{CorrelationRecord, RecordStatus, TauMethod, TrialTypePair};

    #[test]
    fn round_half_up_breaks_ties_away_from_zero() {
        assert_eq!(round_half_up(0.125, 2), 0.13);
        assert_eq!(round_half_up(-0.125, 2), -0.13);
        assert_eq!(round_half_up(2.5, 0), 3.0);
        assert_eq!(round_half_up(0.124, 2), 0.12);
        assert!(round_half_up(f64::NAN, 2).is_nan());
    }

    #[test]
    fn pair_table_shows_na_for_undefined_records() {
        let results = vec![significance(effect_size(CorrelationRecord {
            domain: "flat".to_string(),
            pair: TrialTypePair::ALL[0],
            r: f64::NAN,
            n: 10,
            status: RecordStatus::ZeroVariance,
        }))];
        let table = format_pair_table(&results);
        assert!(table.contains("NA"));
        assert!(table.contains("zero_variance"));
    }

    #[test]
    fn meta_summary_mentions_fallback_when_flagged() {
        let fit = MetaFit {
            k: 3,
            n_domains: 3,
            pooled_z: 0.3,
            se: 0.1,
            ci_lower_z: 0.104,
            ci_upper_z: 0.496,
            pi_lower_z: 0.0,
            pi_upper_z: 0.6,
            tau2: 0.01,
            q: 4.0,
            q_df: 2,
            q_pvalue: 0.135,
            tau_method: TauMethod::Reml,
            fell_back: true,
        };
        let text = format_meta_summary(&fit);
        assert!(text.contains("fell back to DL"));
        assert!(text.contains("Q = 4"));
    }
}
