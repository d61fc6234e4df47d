//! Export per-pair results to CSV.
//!
//! The export is meant to be easy to consume in spreadsheets or downstream
//! scripts: one row per domain/pair with the correlation, effect size,
//! interval, and status.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use crate::domain::PairResult;
use crate::error::AppError;

/// Write per-pair results to a CSV file.
///
/// Undefined quantities are written as empty fields, not zeros.
pub fn write_results_csv(path: &Path, results: &[PairResult]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::usage(format!(
            "Failed to create export CSV '{}': {e}",
            path.display()
        ))
    })?;

    writeln!(
        file,
        "domain,pair,n,r,yi,vi,se,ci_lower,ci_upper,sig,status"
    )
    .map_err(|e| AppError::compute(format!("Failed to write export CSV header: {e}")))?;

    for pr in results {
        let rec = &pr.effect.record;
        writeln!(
            file,
            "{},{},{},{},{},{},{},{},{},{},{}",
            rec.domain,
            rec.pair.label(),
            rec.n,
            fmt_field(rec.r),
            fmt_field(pr.effect.yi),
            fmt_field(pr.effect.vi),
            fmt_field(pr.se),
            fmt_field(pr.ci_lower),
            fmt_field(pr.ci_upper),
            pr.sig,
            rec.status.label(),
        )
        .map_err(|e| AppError::compute(format!("Failed to write export CSV row: {e}")))?;
    }

    Ok(())
}

fn fmt_field(v: f64) -> String {
    if v.is_finite() {
        format!("{v:.10}")
    } else {
        String::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{effect_size, significance};
    use crate::domain::{CorrelationRecord, RecordStatus, TrialTypePair};

    #[test]
    fn export_writes_one_row_per_result_and_blanks_undefined() {
        let results = vec![
            significance(effect_size(CorrelationRecord {
                domain: "flowers".to_string(),
                pair: TrialTypePair::ALL[0],
                r: 0.5,
                n: 20,
                status: RecordStatus::Ok,
            })),
            significance(effect_size(CorrelationRecord {
                domain: "tiny".to_string(),
                pair: TrialTypePair::ALL[1],
                r: f64::NAN,
                n: 2,
                status: RecordStatus::SmallSample,
            })),
        ];

        let path = std::env::temp_dir().join(format!("irap-export-{}.csv", std::process::id()));
        write_results_csv(&path, &results).unwrap();
        let body = std::fs::read_to_string(&path).unwrap();
        std::fs::remove_file(&path).ok();

        let lines: Vec<&str> = body.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("flowers,tt1-tt2,20,0.5"));
        assert!(lines[2].starts_with("tiny,tt1-tt3,2,,"));
        assert!(lines[2].contains("small_sample"));
    }
}
