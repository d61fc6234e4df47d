//! Effect-size and interval/significance stages.
//!
//! For each correlation record:
//! - `yi = atanh(r)` and `vi = 1/(n-3)` (Fisher-z effect size)
//! - `se = sqrt(vi)`, z-scale CI `yi ± 1.96*se`, back-transformed with `tanh`
//! - `sig = true` iff the correlation-scale interval excludes zero and has
//!   the same sign as r
//!
//! Undefined quantities stay NaN and are surfaced on the record; they are
//! never replaced with defaults.

use crate::domain::{CorrelationRecord, EffectSize, PairResult, Z_95};
use crate::math::{fisher_z, inverse_fisher_z, sampling_variance};

/// Layer a Fisher-z effect size onto a correlation record.
pub fn effect_size(record: CorrelationRecord) -> EffectSize {
    let (yi, vi) = if record.status.is_ok() {
        (fisher_z(record.r), sampling_variance(record.n))
    } else {
        (f64::NAN, f64::NAN)
    };
    EffectSize { record, yi, vi }
}

/// Derive the 95% interval and significance flag for one effect.
pub fn significance(effect: EffectSize) -> PairResult {
    if !effect.is_usable() {
        return PairResult {
            effect,
            se: f64::NAN,
            ci_lower: f64::NAN,
            ci_upper: f64::NAN,
            sig: false,
        };
    }

    let se = effect.vi.sqrt();
    let ci_lower = inverse_fisher_z(effect.yi - Z_95 * se);
    let ci_upper = inverse_fisher_z(effect.yi + Z_95 * se);

    let r = effect.record.r;
    let sig = (r > 0.0 && ci_lower > 0.0) || (r < 0.0 && ci_upper < 0.0);

    PairResult {
        effect,
        se,
        ci_lower,
        ci_upper,
        sig,
    }
}

/// Run both stages over a full collection of correlation records.
pub fn derive_pair_results(records: Vec<CorrelationRecord>) -> Vec<PairResult> {
    records
        .into_iter()
        .map(|rec| significance(effect_size(rec)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{RecordStatus, TrialTypePair};

    fn record(r: f64, n: usize, status: RecordStatus) -> CorrelationRecord {
        CorrelationRecord {
            domain: "d".to_string(),
            pair: TrialTypePair::ALL[0],
            r,
            n,
            status,
        }
    }

    #[test]
    fn effect_size_known_values() {
        let es = effect_size(record(0.8, 4, RecordStatus::Ok));
        assert!((es.yi - 1.0986122886681098).abs() < 1e-12);
        assert!((es.vi - 1.0).abs() < 1e-15);
        assert!(es.is_usable());
    }

    #[test]
    fn small_sample_stays_undefined() {
        let es = effect_size(record(0.5, 3, RecordStatus::SmallSample));
        assert!(es.yi.is_nan());
        assert!(es.vi.is_nan());
        assert!(!es.is_usable());

        let pr = significance(es);
        assert!(!pr.sig);
        assert!(pr.ci_lower.is_nan() && pr.ci_upper.is_nan());
    }

    #[test]
    fn sig_implies_interval_excludes_zero() {
        // Large n so the interval is tight around a clearly positive r.
        let pr = significance(effect_size(record(0.6, 100, RecordStatus::Ok)));
        assert!(pr.sig);
        assert!(pr.ci_lower > 0.0);

        // Weak r with small n: interval crosses zero.
        let pr = significance(effect_size(record(0.1, 10, RecordStatus::Ok)));
        assert!(!pr.sig);
        assert!(pr.ci_lower < 0.0 && pr.ci_upper > 0.0);
    }

    #[test]
    fn negative_r_uses_upper_bound() {
        let pr = significance(effect_size(record(-0.6, 100, RecordStatus::Ok)));
        assert!(pr.sig);
        assert!(pr.ci_upper < 0.0);
    }

    #[test]
    fn bounds_are_on_the_correlation_scale() {
        let pr = significance(effect_size(record(0.8, 30, RecordStatus::Ok)));
        assert!(pr.ci_lower > -1.0 && pr.ci_upper < 1.0);
        assert!(pr.ci_lower < 0.8 && 0.8 < pr.ci_upper);
    }
}
