//! Fisher z-transform and its sampling variance.
//!
//! Raw correlation coefficients are bounded and skewed near ±1; on the
//! z-scale (`atanh(r)`) the sampling distribution is approximately normal
//! with a variance that depends only on the sample size. That normality is
//! the precondition for the Wald intervals and the meta-analytic pooling.

/// Fisher z-transform: `atanh(r) = 0.5 * ln((1+r)/(1-r))`.
///
/// Returns NaN for non-finite input or |r| >= 1 (the transform diverges at
/// the boundary; ±infinity cannot be pooled).
pub fn fisher_z(r: f64) -> f64 {
    if !r.is_finite() || r.abs() >= 1.0 {
        return f64::NAN;
    }
    r.atanh()
}

/// Inverse transform back to the correlation scale.
pub fn inverse_fisher_z(z: f64) -> f64 {
    z.tanh()
}

/// Sampling variance of a Fisher-z effect: `1/(n-3)`.
///
/// NaN for n <= 3, where the variance is ill-defined.
pub fn sampling_variance(n: usize) -> f64 {
    if n <= 3 {
        return f64::NAN;
    }
    1.0 / (n as f64 - 3.0)
}
