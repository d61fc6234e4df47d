//! Pooling, heterogeneity, and assembly of the final `MetaFit`.

use statrs::distribution::{ChiSquared, ContinuousCDF};

use crate::domain::{EffectSize, MetaFit, PairResult, TauMethod, Z_95};
use crate::error::AppError;
use crate::meta::reml::{dersimonian_laird, estimate_reml, group_blocks, profile_at};

/// Fixed-effect heterogeneity statistic `Q = Σ wi (yi - θ_FE)²`, `wi = 1/vi`.
pub fn q_statistic(yi: &[f64], vi: &[f64]) -> f64 {
    let w: Vec<f64> = vi.iter().map(|v| 1.0 / v).collect();
    let sw: f64 = w.iter().sum();
    if sw <= 0.0 {
        return 0.0;
    }
    let theta_fe: f64 = w.iter().zip(yi.iter()).map(|(wi, y)| wi * y).sum::<f64>() / sw;
    w.iter()
        .zip(yi.iter())
        .map(|(wi, y)| wi * (y - theta_fe) * (y - theta_fe))
        .sum()
}

/// Upper-tail chi-squared p-value for Q with `df` degrees of freedom.
///
/// NaN when df == 0 (no heterogeneity is estimable from one effect).
pub fn q_pvalue(q: f64, df: usize) -> Result<f64, AppError> {
    if df == 0 {
        return Ok(f64::NAN);
    }
    let dist = ChiSquared::new(df as f64)
        .map_err(|e| AppError::compute(format!("Chi-squared distribution error: {e}")))?;
    Ok(1.0 - dist.cdf(q))
}

/// Pool all usable effect sizes with the domain random-intercept model.
///
/// τ² is estimated per `method`; REML non-convergence degrades to the
/// clamped DL estimate and is flagged on the output (`fell_back`) rather
/// than silently reported as REML.
pub fn run_meta(
    results: &[PairResult],
    method: TauMethod,
    reml_max_iter: usize,
) -> Result<MetaFit, AppError> {
    let usable: Vec<&EffectSize> = results
        .iter()
        .filter(|pr| pr.effect.is_usable())
        .map(|pr| &pr.effect)
        .collect();

    let k = usable.len();
    if k == 0 {
        return Err(AppError::data(
            "No estimable effect sizes remain; cannot run the meta-analysis.",
        ));
    }

    let yi: Vec<f64> = usable.iter().map(|es| es.yi).collect();
    let vi: Vec<f64> = usable.iter().map(|es| es.vi).collect();
    let blocks = group_blocks(&usable);
    let n_domains = blocks.len();

    let q = q_statistic(&yi, &vi);
    let q_df = k - 1;
    let q_p = q_pvalue(q, q_df)?;

    // A single effect: τ² is inestimable, the pool is that effect, and the
    // prediction interval collapses onto the CI.
    if k == 1 {
        let pooled_z = yi[0];
        let se = vi[0].sqrt();
        let (lo, hi) = (pooled_z - Z_95 * se, pooled_z + Z_95 * se);
        return Ok(MetaFit {
            k,
            n_domains,
            pooled_z,
            se,
            ci_lower_z: lo,
            ci_upper_z: hi,
            pi_lower_z: lo,
            pi_upper_z: hi,
            tau2: 0.0,
            q: 0.0,
            q_df: 0,
            q_pvalue: f64::NAN,
            tau_method: method,
            fell_back: false,
        });
    }

    let (tau2, fit, fell_back) = match method {
        TauMethod::Reml => match estimate_reml(&blocks, reml_max_iter) {
            Ok((tau2, fit)) => (tau2, fit, false),
            Err(_) => {
                // Bounded-iteration failure is fatal for REML only; the DL
                // moment estimate is the flagged degraded mode.
                let tau2 = dersimonian_laird(&yi, &vi);
                let fit = profile_at(&blocks, tau2).ok_or_else(|| {
                    AppError::compute("Meta-analysis failed: GLS pool did not factorize.")
                })?;
                (tau2, fit, true)
            }
        },
        TauMethod::Dl => {
            let tau2 = dersimonian_laird(&yi, &vi);
            let fit = profile_at(&blocks, tau2).ok_or_else(|| {
                AppError::compute("Meta-analysis failed: GLS pool did not factorize.")
            })?;
            (tau2, fit, false)
        }
    };

    let pooled_z = fit.theta;
    let se = fit.se;
    // Prediction interval: expected spread of a *new* domain's true effect,
    // wider than the CI on the pooled mean.
    let pi_half = Z_95 * (tau2 + se * se).sqrt();

    Ok(MetaFit {
        k,
        n_domains,
        pooled_z,
        se,
        ci_lower_z: pooled_z - Z_95 * se,
        ci_upper_z: pooled_z + Z_95 * se,
        pi_lower_z: pooled_z - pi_half,
        pi_upper_z: pooled_z + pi_half,
        tau2,
        q,
        q_df,
        q_pvalue: q_p,
        tau_method: method,
        fell_back,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{effect_size, significance};
    use crate::domain::{CorrelationRecord, RecordStatus, TrialTypePair};

    fn pair_result(domain: &str, r: f64, n: usize) -> PairResult {
        significance(effect_size(CorrelationRecord {
            domain: domain.to_string(),
            pair: TrialTypePair::ALL[0],
            r,
            n,
            status: if n <= 3 {
                RecordStatus::SmallSample
            } else {
                RecordStatus::Ok
            },
        }))
    }

    #[test]
    fn q_is_zero_only_for_identical_effects() {
        assert!(q_statistic(&[0.4, 0.4, 0.4], &[1.0, 1.0, 1.0]).abs() < 1e-15);
        assert!(q_statistic(&[0.4, 0.6], &[1.0, 1.0]) > 0.0);
    }

    #[test]
    fn two_domain_scenario_pools_between_the_effects() {
        // Domain A: r = 0.8 with n = 4; domain B: r = 0.1 with n = 4.
        // yi_A ≈ 1.0986, yi_B ≈ 0.1003, vi = 1 for both.
        let results = vec![pair_result("a", 0.8, 4), pair_result("b", 0.1, 4)];
        let fit = run_meta(&results, TauMethod::Reml, 500).unwrap();

        assert_eq!(fit.k, 2);
        assert_eq!(fit.n_domains, 2);
        assert!(fit.pooled_z > 0.1003 && fit.pooled_z < 1.0987, "pooled_z={}", fit.pooled_z);
        let pooled_r = fit.pooled_r();
        assert!(pooled_r > 0.1 && pooled_r < 0.8, "pooled_r={pooled_r}");
        assert!(fit.tau2 >= 0.0);
        assert!(fit.q >= 0.0);
        assert_eq!(fit.q_df, 1);
        assert!(fit.q_pvalue > 0.0 && fit.q_pvalue < 1.0);
    }

    #[test]
    fn prediction_interval_is_at_least_as_wide_as_ci() {
        let results = vec![
            pair_result("a", 0.7, 30),
            pair_result("b", 0.2, 25),
            pair_result("c", -0.1, 40),
            pair_result("d", 0.5, 35),
        ];
        let fit = run_meta(&results, TauMethod::Reml, 500).unwrap();
        assert!(fit.pi_lower_z <= fit.ci_lower_z);
        assert!(fit.pi_upper_z >= fit.ci_upper_z);
    }

    #[test]
    fn single_effect_pool_equals_that_effect() {
        let results = vec![pair_result("only", 0.4, 20)];
        let fit = run_meta(&results, TauMethod::Reml, 500).unwrap();

        let expected_z = 0.4_f64.atanh();
        assert!((fit.pooled_z - expected_z).abs() < 1e-12);
        assert_eq!(fit.tau2, 0.0);
        assert_eq!(fit.q_df, 0);
        assert!(fit.q_pvalue.is_nan());
        // Prediction interval collapses onto the CI.
        assert_eq!(fit.pi_lower_z, fit.ci_lower_z);
        assert_eq!(fit.pi_upper_z, fit.ci_upper_z);
    }

    #[test]
    fn unusable_effects_are_excluded_not_fatal() {
        let results = vec![
            pair_result("a", 0.5, 20),
            pair_result("tiny", 0.9, 3), // small sample, excluded
            pair_result("b", 0.3, 25),
        ];
        let fit = run_meta(&results, TauMethod::Reml, 500).unwrap();
        assert_eq!(fit.k, 2);
        assert_eq!(fit.n_domains, 2);
    }

    #[test]
    fn no_usable_effects_is_a_data_error() {
        let results = vec![pair_result("tiny", 0.9, 3)];
        let err = run_meta(&results, TauMethod::Reml, 500).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn dl_method_is_deterministic_and_clamped() {
        let results = vec![
            pair_result("a", 0.4, 20),
            pair_result("b", 0.4, 20),
            pair_result("c", 0.4, 20),
        ];
        let fit = run_meta(&results, TauMethod::Dl, 500).unwrap();
        assert_eq!(fit.tau2, 0.0);
        assert!(!fit.fell_back);
        assert!((fit.pooled_r() - 0.4).abs() < 1e-6);
    }
}
