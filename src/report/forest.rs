//! ASCII caterpillar (forest) plot for terminal output.
//!
//! This is intentionally "dumb" (fixed-width character grid), optimized for:
//! - quick visual sanity checks in a terminal
//! - deterministic output (helpful for golden tests)
//!
//! Plot elements, one row per defined pair sorted by r:
//! - `o` point estimate, `-` confidence whiskers
//! - `|` the zero line
//! - pooled estimate at the bottom: `#` point, `=` whiskers

use crate::domain::{MetaFit, PairResult};

/// Render the caterpillar plot.
///
/// Undefined pairs are skipped. When there are more defined pairs than
/// `max_rows`, an evenly spaced subset is shown and noted in the header.
pub fn render_caterpillar(
    results: &[PairResult],
    fit: &MetaFit,
    width: usize,
    max_rows: usize,
) -> String {
    let width = width.max(40);
    let label_w = 18usize;
    let axis_w = width - label_w - 1;

    let mut defined: Vec<&PairResult> = results.iter().filter(|pr| pr.effect.is_usable()).collect();
    defined.sort_by(|a, b| {
        a.effect
            .record
            .r
            .partial_cmp(&b.effect.record.r)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let total = defined.len();
    let rows = shown_subset(&defined, max_rows.max(3));

    // Axis range: cover every interval, the pooled interval, and zero.
    let (pi_lo, pi_hi) = fit.pi_r();
    let mut lo = pi_lo.min(0.0);
    let mut hi = pi_hi.max(0.0);
    for pr in &rows {
        lo = lo.min(pr.ci_lower);
        hi = hi.max(pr.ci_upper);
    }
    let (lo, hi) = pad_range(lo, hi, 0.05);

    let mut out = String::new();
    out.push_str(&format!(
        "Caterpillar: r=[{lo:.2}, {hi:.2}] | showing {} of {} pairs\n",
        rows.len(),
        total
    ));

    let zero_col = map_x(0.0, lo, hi, axis_w);

    for pr in &rows {
        let rec = &pr.effect.record;
        let label = format!("{}/{}", rec.domain, rec.pair.label());

        let mut line = vec![' '; axis_w];
        line[zero_col] = '|';

        let x0 = map_x(pr.ci_lower, lo, hi, axis_w);
        let x1 = map_x(pr.ci_upper, lo, hi, axis_w);
        for cell in line.iter_mut().take(x1 + 1).skip(x0) {
            if *cell == ' ' {
                *cell = '-';
            }
        }
        line[map_x(rec.r, lo, hi, axis_w)] = 'o';

        out.push_str(&format!(
            "{:<label_w$} {}\n",
            truncate(&label, label_w),
            line.into_iter().collect::<String>()
        ));
    }

    // Pooled row.
    let (ci_lo, ci_hi) = fit.ci_r();
    let mut line = vec![' '; axis_w];
    line[zero_col] = '|';
    let x0 = map_x(ci_lo, lo, hi, axis_w);
    let x1 = map_x(ci_hi, lo, hi, axis_w);
    for cell in line.iter_mut().take(x1 + 1).skip(x0) {
        if *cell == ' ' {
            *cell = '=';
        }
    }
    line[map_x(fit.pooled_r(), lo, hi, axis_w)] = '#';
    out.push_str(&format!(
        "{:<label_w$} {}\n",
        "pooled",
        line.into_iter().collect::<String>()
    ));

    out
}

fn shown_subset<'a>(defined: &[&'a PairResult], max_rows: usize) -> Vec<&'a PairResult> {
    if defined.len() <= max_rows {
        return defined.to_vec();
    }
    // Evenly spaced indices, always keeping first and last.
    (0..max_rows)
        .map(|i| {
            let u = i as f64 / (max_rows as f64 - 1.0);
            let idx = (u * (defined.len() as f64 - 1.0)).round() as usize;
            defined[idx]
        })
        .collect()
}

fn pad_range(min: f64, max: f64, frac: f64) -> (f64, f64) {
    let span = (max - min).abs();
    let pad = (span * frac).max(1e-12);
    (min - pad, max + pad)
}

fn map_x(v: f64, lo: f64, hi: f64, width: usize) -> usize {
    let width = width.max(2);
    let u = ((v - lo) / (hi - lo)).clamp(0.0, 1.0);
    (u * (width as f64 - 1.0)).round() as usize
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
