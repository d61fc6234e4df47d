//! Reporting utilities: summary scalars, formatted tables, caterpillar plot.

pub mod forest;
pub mod format;

pub use forest::*;
pub use format::*;

use crate::domain::{PairResult, SummaryStats};

/// Derive the scalar summaries reported alongside the tables.
///
/// Percentages are computed over *defined* pairs only; degenerate records
/// count toward `n_undefined` and nothing else.
pub fn summarize(results: &[PairResult]) -> SummaryStats {
    let mut n_defined = 0usize;
    let mut n_undefined = 0usize;
    let mut n_significant = 0usize;

    let mut domains: std::collections::BTreeMap<&str, bool> = std::collections::BTreeMap::new();

    for pr in results {
        let domain_sig = domains.entry(pr.effect.record.domain.as_str()).or_default();
        if pr.effect.is_usable() {
            n_defined += 1;
            if pr.sig {
                n_significant += 1;
                *domain_sig = true;
            }
        } else {
            n_undefined += 1;
        }
    }

    let n_domains = domains.len();
    let n_domains_with_sig = domains.values().filter(|&&s| s).count();

    let pct = |num: usize, den: usize| {
        if den == 0 {
            f64::NAN
        } else {
            100.0 * num as f64 / den as f64
        }
    };

    SummaryStats {
        n_defined,
        n_undefined,
        n_significant,
        pct_significant: pct(n_significant, n_defined),
        n_domains,
        n_domains_with_sig,
        pct_domains_with_sig: pct(n_domains_with_sig, n_domains),
    }
}
