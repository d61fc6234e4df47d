//! Correlation stage: six pairwise Pearson correlations per domain.
//!
//! Design goals:
//! - **Deterministic output order** (domains sorted, pairs in canonical order)
//! - **Degenerate data is flagged, not fatal**: a zero-variance column marks
//!   the pairs that touch it, a tiny sample marks the whole domain, and the
//!   pipeline moves on
//! - **Separation of concerns**: no effect-size or pooling logic here

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::domain::{CorrelationRecord, RecordStatus, ScoreRecord, TrialType, TrialTypePair};
use crate::math::{pearson, sample_variance};

/// Compute the six pairwise correlations for one domain.
///
/// Invariant: returns exactly one record per canonical pair, all sharing
/// `n = records.len()` (all four trial types are measured on the same
/// participant set).
pub fn correlate_domain(domain: &str, records: &[ScoreRecord]) -> Vec<CorrelationRecord> {
    let n = records.len();

    let columns: Vec<Vec<f64>> = TrialType::ALL
        .iter()
        .map(|&tt| records.iter().map(|rec| rec.score(tt)).collect())
        .collect();

    let degenerate: Vec<bool> = columns
        .iter()
        .map(|col| {
            let v = sample_variance(col);
            !v.is_finite() || v <= 0.0
        })
        .collect();

    TrialTypePair::ALL
        .iter()
        .map(|&pair| {
            let x = &columns[index_of(pair.a)];
            let y = &columns[index_of(pair.b)];
            let r = pearson(x, y);

            // A constant column only undefines the pairs it participates in;
            // correlations between the other columns stay usable.
            let pair_degenerate = degenerate[index_of(pair.a)] || degenerate[index_of(pair.b)];

            // Small samples take precedence: with n <= 3 the record is
            // unusable regardless of what the columns look like.
            let status = if n <= 3 {
                RecordStatus::SmallSample
            } else if pair_degenerate || r.is_nan() {
                RecordStatus::ZeroVariance
            } else if r.abs() >= 1.0 {
                RecordStatus::UnitCorrelation
            } else {
                RecordStatus::Ok
            };

            let r = if status == RecordStatus::ZeroVariance {
                f64::NAN
            } else {
                r
            };

            CorrelationRecord {
                domain: domain.to_string(),
                pair,
                r,
                n,
                status,
            }
        })
        .collect()
}

/// Group records by domain and correlate each domain independently.
///
/// Domains are independent shards with no shared state, so they are
/// evaluated in parallel; the output order stays deterministic (sorted by
/// domain label).
pub fn correlate_all(records: &[ScoreRecord]) -> Vec<CorrelationRecord> {
    let mut by_domain: BTreeMap<&str, Vec<&ScoreRecord>> = BTreeMap::new();
    for rec in records {
        by_domain.entry(rec.domain.as_str()).or_default().push(rec);
    }

    let domains: Vec<(&str, Vec<ScoreRecord>)> = by_domain
        .into_iter()
        .map(|(d, recs)| (d, recs.into_iter().cloned().collect()))
        .collect();

    domains
        .par_iter()
        .flat_map(|(domain, recs)| correlate_domain(domain, recs))
        .collect()
}

fn index_of(tt: TrialType) -> usize {
    match tt {
        TrialType::Tt1 => 0,
        TrialType::Tt2 => 1,
        TrialType::Tt3 => 2,
        TrialType::Tt4 => 3,
    }
}
