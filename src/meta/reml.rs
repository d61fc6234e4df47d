//! τ² estimation for the domain random-intercept model.
//!
//! Model: `yi = θ + u_domain + e_i`, `e_i ~ N(0, vi)`, `u_domain ~ N(0, τ²)`.
//! The marginal covariance is block-diagonal per domain:
//!
//! ```text
//! V_d = diag(v_1..v_m) + τ² J      (J = all-ones m×m)
//! ```
//!
//! We maximize the restricted log-likelihood over τ² >= 0 with a
//! deterministic log-spaced grid followed by golden-section refinement.
//!
//! Why grid + refine instead of Fisher scoring?
//! - It avoids step-size pathologies near the τ² = 0 boundary.
//! - It is deterministic given the same inputs/flags.
//! - The profile is one-dimensional and each evaluation factorizes a handful
//!   of tiny blocks, so a modest grid is fast enough for any realistic run.

use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use crate::domain::EffectSize;

/// Effects for one domain, as dense vectors ready for block algebra.
#[derive(Debug, Clone)]
pub struct DomainBlock {
    pub domain: String,
    pub y: DVector<f64>,
    pub v: DVector<f64>,
}

/// GLS pooling summary at a fixed τ².
#[derive(Debug, Clone, Copy)]
pub struct ProfileFit {
    pub theta: f64,
    pub se: f64,
    /// Restricted log-likelihood up to an additive constant.
    pub restricted_ll: f64,
}

/// REML estimation failed within the iteration budget.
#[derive(Debug, Clone)]
pub struct NonConvergence {
    pub iterations: usize,
}

/// Group usable effects into per-domain blocks, sorted by domain label.
pub fn group_blocks(effects: &[&EffectSize]) -> Vec<DomainBlock> {
    let mut by_domain: BTreeMap<&str, Vec<&EffectSize>> = BTreeMap::new();
    for es in effects {
        by_domain.entry(es.record.domain.as_str()).or_default().push(es);
    }

    by_domain
        .into_iter()
        .map(|(domain, group)| DomainBlock {
            domain: domain.to_string(),
            y: DVector::from_iterator(group.len(), group.iter().map(|es| es.yi)),
            v: DVector::from_iterator(group.len(), group.iter().map(|es| es.vi)),
        })
        .collect()
}

/// Evaluate the GLS pool and restricted likelihood at a fixed τ².
///
/// Returns `None` when a block fails to factorize (possible only for
/// pathological vi near zero combined with τ² = 0).
pub fn profile_at(blocks: &[DomainBlock], tau2: f64) -> Option<ProfileFit> {
    // Accumulators across blocks: a = Σ 1'V⁻¹1, b = Σ 1'V⁻¹y, c = Σ y'V⁻¹y.
    let mut a = 0.0;
    let mut b = 0.0;
    let mut c = 0.0;
    let mut log_det = 0.0;

    for block in blocks {
        let m = block.y.len();
        let mut v = DMatrix::<f64>::from_fn(m, m, |_, _| tau2);
        for i in 0..m {
            v[(i, i)] += block.v[i];
        }

        let chol = v.cholesky()?;
        for i in 0..m {
            log_det += 2.0 * chol.l_dirty()[(i, i)].ln();
        }

        let ones = DVector::<f64>::from_element(m, 1.0);
        let vinv_ones = chol.solve(&ones);
        let vinv_y = chol.solve(&block.y);

        a += ones.dot(&vinv_ones);
        b += ones.dot(&vinv_y);
        c += block.y.dot(&vinv_y);
    }

    if !(a.is_finite() && a > 0.0 && b.is_finite() && c.is_finite()) {
        return None;
    }

    let theta = b / a;
    let se = (1.0 / a).sqrt();
    // Restricted likelihood profiles out θ and penalizes its information.
    let restricted_ll = -0.5 * (log_det + a.ln() + (c - b * b / a));

    if !(theta.is_finite() && se.is_finite() && restricted_ll.is_finite()) {
        return None;
    }

    Some(ProfileFit {
        theta,
        se,
        restricted_ll,
    })
}

/// DerSimonian-Laird method-of-moments estimate of τ², clamped to >= 0.
///
/// Ignores the grouping structure (each effect treated as its own stratum);
/// used for the search upper bound and as the non-convergence fallback.
pub fn dersimonian_laird(yi: &[f64], vi: &[f64]) -> f64 {
    let k = yi.len();
    if k < 2 {
        return 0.0;
    }

    let w: Vec<f64> = vi.iter().map(|v| 1.0 / v).collect();
    let sw: f64 = w.iter().sum();
    let theta_fe: f64 = w.iter().zip(yi.iter()).map(|(wi, y)| wi * y).sum::<f64>() / sw;
    let q: f64 = w
        .iter()
        .zip(yi.iter())
        .map(|(wi, y)| wi * (y - theta_fe) * (y - theta_fe))
        .sum();

    let sw2: f64 = w.iter().map(|wi| wi * wi).sum();
    let denom = sw - sw2 / sw;
    if denom <= 0.0 {
        return 0.0;
    }

    ((q - (k as f64 - 1.0)) / denom).max(0.0)
}

/// Estimate τ² by REML over the grouped blocks.
///
/// Deterministic: a fixed grid of candidates (always including τ² = 0)
/// followed by golden-section refinement around the best candidate. The
/// refinement is capped at `max_iter` evaluations; exceeding the cap is a
/// `NonConvergence` error and the caller decides on a fallback.
pub fn estimate_reml(
    blocks: &[DomainBlock],
    max_iter: usize,
) -> Result<(f64, ProfileFit), NonConvergence> {
    let yi: Vec<f64> = blocks.iter().flat_map(|b| b.y.iter().copied()).collect();
    let vi: Vec<f64> = blocks.iter().flat_map(|b| b.v.iter().copied()).collect();

    // Search ceiling: generously above both the moment estimate and the raw
    // spread of the effects.
    let dl = dersimonian_laird(&yi, &vi);
    let spread = crate::math::sample_variance(&yi);
    let hi = (4.0 * dl)
        .max(if spread.is_finite() { 4.0 * spread } else { 0.0 })
        .max(1.0);

    // Candidate grid: 0 plus log-spaced values in (1e-8, hi].
    const GRID_STEPS: usize = 48;
    let mut candidates = Vec::with_capacity(GRID_STEPS + 1);
    candidates.push(0.0);
    let ln_lo = 1e-8_f64.ln();
    let ln_hi = hi.ln();
    for i in 0..GRID_STEPS {
        let u = i as f64 / (GRID_STEPS as f64 - 1.0);
        candidates.push((ln_lo + u * (ln_hi - ln_lo)).exp());
    }

    let mut evals = 0usize;
    let mut best_idx = None;
    let mut best_ll = f64::NEG_INFINITY;
    let mut profiles: Vec<Option<ProfileFit>> = Vec::with_capacity(candidates.len());
    for (idx, &tau2) in candidates.iter().enumerate() {
        let fit = profile_at(blocks, tau2);
        evals += 1;
        if let Some(f) = fit {
            if f.restricted_ll > best_ll {
                best_ll = f.restricted_ll;
                best_idx = Some(idx);
            }
        }
        profiles.push(fit);
    }

    let Some(best_idx) = best_idx else {
        return Err(NonConvergence { iterations: evals });
    };

    // Bracket the maximum with the grid neighbors and refine.
    let lo = if best_idx == 0 {
        0.0
    } else {
        candidates[best_idx - 1]
    };
    let hi_bracket = if best_idx + 1 < candidates.len() {
        candidates[best_idx + 1]
    } else {
        candidates[best_idx]
    };

    let (tau2, fit) = golden_refine(blocks, lo, hi_bracket, max_iter.saturating_sub(evals))
        .ok_or(NonConvergence { iterations: evals })?;

    // Keep the grid winner if refinement somehow did worse (flat profiles).
    if let Some(Some(grid_fit)) = profiles.get(best_idx) {
        if grid_fit.restricted_ll > fit.restricted_ll {
            return Ok((candidates[best_idx], *grid_fit));
        }
    }

    Ok((tau2, fit))
}

/// Golden-section search for the restricted-likelihood maximum on [lo, hi].
fn golden_refine(
    blocks: &[DomainBlock],
    mut lo: f64,
    mut hi: f64,
    budget: usize,
) -> Option<(f64, ProfileFit)> {
    const INV_PHI: f64 = 0.618_033_988_749_894_8;
    const TOL: f64 = 1e-10;

    if hi <= lo {
        return profile_at(blocks, lo.max(0.0)).map(|f| (lo.max(0.0), f));
    }

    let ll_at = |t: f64| profile_at(blocks, t).map(|f| f.restricted_ll);

    let mut x1 = hi - INV_PHI * (hi - lo);
    let mut x2 = lo + INV_PHI * (hi - lo);
    let mut f1 = ll_at(x1)?;
    let mut f2 = ll_at(x2)?;
    let mut used = 2usize;

    while (hi - lo) > TOL * (1.0 + hi) {
        if used >= budget {
            return None;
        }
        if f1 >= f2 {
            hi = x2;
            x2 = x1;
            f2 = f1;
            x1 = hi - INV_PHI * (hi - lo);
            f1 = ll_at(x1)?;
        } else {
            lo = x1;
            x1 = x2;
            f1 = f2;
            x2 = lo + INV_PHI * (hi - lo);
            f2 = ll_at(x2)?;
        }
        used += 1;
    }

    let tau2 = (0.5 * (lo + hi)).max(0.0);
    profile_at(blocks, tau2).map(|f| (tau2, f))
}
