//! Pearson product-moment correlation.
//!
//! `r = cov(x, y) / (sd(x) * sd(y))` with the standard sample (n-1
//! denominator) covariance and variances.
//!
//! Degenerate inputs produce NaN on purpose: a zero-variance sequence has no
//! defined correlation, and substituting a default here would silently
//! corrupt every downstream stage. Callers inspect `is_finite()`.

/// Arithmetic mean. NaN for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Sample variance (n-1 denominator). NaN for fewer than 2 values.
pub fn sample_variance(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    ss / (n as f64 - 1.0)
}

/// Pearson's r for two equal-length sequences.
///
/// Returns NaN when the sequences differ in length, have fewer than 2
/// elements, contain non-finite values, or either has zero variance.
/// The result is clamped to [-1, 1] to absorb floating-point round-off.
pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len();
    if n != y.len() || n < 2 {
        return f64::NAN;
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return f64::NAN;
    }

    let mx = mean(x);
    let my = mean(y);

    let mut cov = 0.0;
    let mut vx = 0.0;
    let mut vy = 0.0;
    for i in 0..n {
        let dx = x[i] - mx;
        let dy = y[i] - my;
        cov += dx * dy;
        vx += dx * dx;
        vy += dy * dy;
    }

    if vx <= 0.0 || vy <= 0.0 {
        return f64::NAN;
    }

    // The (n-1) factors cancel between numerator and denominator.
    (cov / (vx.sqrt() * vy.sqrt())).clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pearson_perfect_positive() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [2.0, 4.0, 6.0, 8.0];
        assert!((pearson(&x, &y) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_perfect_negative() {
        let x = [1.0, 2.0, 3.0, 4.0];
        let y = [8.0, 6.0, 4.0, 2.0];
        assert!((pearson(&x, &y) + 1.0).abs() < 1e-12);
    }

    #[test]
    fn pearson_is_symmetric_and_bounded() {
        let x = [0.3, -1.2, 0.8, 2.1, -0.4];
        let y = [1.1, 0.2, -0.7, 1.9, 0.5];
        let rxy = pearson(&x, &y);
        let ryx = pearson(&y, &x);
        assert!((rxy - ryx).abs() < 1e-15);
        assert!((-1.0..=1.0).contains(&rxy));
    }

    #[test]
    fn pearson_zero_variance_is_nan() {
        let x = [1.0, 1.0, 1.0, 1.0];
        let y = [0.1, 0.5, 0.9, 0.2];
        assert!(pearson(&x, &y).is_nan());
        assert!(pearson(&y, &x).is_nan());
    }

    #[test]
    fn pearson_length_mismatch_is_nan() {
        assert!(pearson(&[1.0, 2.0], &[1.0, 2.0, 3.0]).is_nan());
    }

    #[test]
    fn sample_variance_matches_hand_computation() {
        // var([1,2,3,4]) with n-1 denominator = 5/3.
        let v = sample_variance(&[1.0, 2.0, 3.0, 4.0]);
        assert!((v - 5.0 / 3.0).abs() < 1e-12);
    }
}
