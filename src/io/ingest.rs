//! CSV ingest and normalization.
//!
//! This module turns a per-participant scores CSV into a clean set of
//! `ScoreRecord`s that are safe to analyze.
//!
//! Design goals:
//! - **Strict schema** for required fields (clear errors + exit code 2)
//! - **Row-level validation** (skip bad rows, but report what happened)
//! - **Deterministic behavior** (no hidden randomness)
//! - **Separation of concerns**: no statistics here
//!
//! Expected columns (case-insensitive, BOM tolerated):
//! `participant`, `domain`, `timepoint`, the quality-criterion column
//! (default `passed`), and `tt1`..`tt4`.

use std::collections::{HashMap, HashSet};
use std::fs::File;

use csv::StringRecord;

use crate::domain::{AnalysisConfig, ScoreRecord, TrialType};
use crate::error::AppError;

/// Summary stats about the records actually used for analysis.
#[derive(Debug, Clone)]
pub struct DatasetStats {
    pub n_records: usize,
    /// Per-domain participant counts, sorted by domain label.
    pub domain_counts: Vec<(String, usize)>,
    pub score_min: f64,
    pub score_max: f64,
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub participant: Option<String>,
    pub message: String,
}

/// Ingest output: normalized records + stats + row errors.
#[derive(Debug, Clone)]
pub struct IngestedData {
    pub records: Vec<ScoreRecord>,
    pub stats: DatasetStats,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
    pub rows_used: usize,
    /// Rows at the requested timepoint that failed the quality criterion.
    pub rows_excluded_criterion: usize,
}

/// Load and normalize the scores CSV, applying the timepoint and
/// quality-criterion filters.
pub fn load_score_records(config: &AnalysisConfig) -> Result<IngestedData, AppError> {
    let file = File::open(&config.input_path).map_err(|e| {
        AppError::usage(format!(
            "Failed to open CSV '{}': {e}",
            config.input_path.display()
        ))
    })?;

    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| AppError::usage(format!("Failed to read CSV headers: {e}")))?
        .clone();

    let header_map = build_header_map(&headers);
    ensure_required_columns_exist(config, &header_map)?;

    let criterion_col = normalize_header_name(&config.criterion_column);

    let mut records = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;
    let mut rows_excluded_criterion = 0usize;
    let mut seen: HashSet<(String, String)> = HashSet::new();

    for (idx, result) in reader.records().enumerate() {
        // +2 because records() starts after the header row and CSV lines
        // are 1-based.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    participant: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match parse_row(&record, &header_map, &criterion_col, config) {
            Ok(ParsedRow::Kept(rec)) => {
                let key = (rec.domain.clone(), rec.participant.clone());
                if !seen.insert(key) {
                    row_errors.push(RowError {
                        line,
                        participant: Some(rec.participant.clone()),
                        message: format!(
                            "Duplicate participant '{}' in domain '{}' at this timepoint.",
                            rec.participant, rec.domain
                        ),
                    });
                    continue;
                }
                records.push(rec);
            }
            Ok(ParsedRow::WrongTimepoint) => {}
            Ok(ParsedRow::FailedCriterion) => rows_excluded_criterion += 1,
            Err((participant, message)) => row_errors.push(RowError {
                line,
                participant,
                message,
            }),
        }
    }

    let rows_used = records.len();
    if rows_used == 0 {
        return Err(AppError::data(
            "No valid rows remain after timepoint/criterion filtering.",
        ));
    }

    let stats = compute_stats(&records)
        .ok_or_else(|| AppError::data("No valid records remain after filtering."))?;

    Ok(IngestedData {
        records,
        stats,
        row_errors,
        rows_read,
        rows_used,
        rows_excluded_criterion,
    })
}

enum ParsedRow {
    Kept(ScoreRecord),
    WrongTimepoint,
    FailedCriterion,
}

fn parse_row(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    criterion_col: &str,
    config: &AnalysisConfig,
) -> Result<ParsedRow, (Option<String>, String)> {
    let participant = get_required(record, header_map, "participant")
        .map_err(|e| (None, e))?
        .to_string();
    let err = |msg: String| (Some(participant.clone()), msg);

    let domain = get_required(record, header_map, "domain")
        .map_err(&err)?
        .to_string();
    let timepoint = get_required(record, header_map, "timepoint").map_err(&err)?;

    if !timepoint.eq_ignore_ascii_case(&config.timepoint) {
        return Ok(ParsedRow::WrongTimepoint);
    }

    if !config.no_criterion_filter {
        let raw = get_required(record, header_map, criterion_col).map_err(&err)?;
        match parse_bool(raw) {
            Some(true) => {}
            Some(false) => return Ok(ParsedRow::FailedCriterion),
            None => {
                return Err(err(format!(
                    "Invalid `{criterion_col}` value '{raw}' (expected a boolean)."
                )));
            }
        }
    }

    let mut scores = [0.0f64; 4];
    for (slot, tt) in scores.iter_mut().zip(TrialType::ALL) {
        let raw = get_required(record, header_map, tt.column_name()).map_err(&err)?;
        let v: f64 = raw
            .parse()
            .map_err(|_| err(format!("Invalid `{}` value '{raw}'.", tt.column_name())))?;
        if !v.is_finite() {
            return Err(err(format!("Non-finite `{}` value.", tt.column_name())));
        }
        *slot = v;
    }

    Ok(ParsedRow::Kept(ScoreRecord {
        participant,
        domain,
        scores,
    }))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Excel and other tools sometimes emit UTF-8 CSVs with a BOM prefix on
    // the first header. If we don't strip it, schema validation will
    // incorrectly report missing columns.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn ensure_required_columns_exist(
    config: &AnalysisConfig,
    header_map: &HashMap<String, usize>,
) -> Result<(), AppError> {
    let mut required = vec![
        "participant".to_string(),
        "domain".to_string(),
        "timepoint".to_string(),
    ];
    if !config.no_criterion_filter {
        required.push(normalize_header_name(&config.criterion_column));
    }
    for tt in TrialType::ALL {
        required.push(tt.column_name().to_string());
    }

    for name in required {
        if !header_map.contains_key(&name) {
            return Err(AppError::usage(format!("Missing required column: `{name}`")));
        }
    }
    Ok(())
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn compute_stats(records: &[ScoreRecord]) -> Option<DatasetStats> {
    let mut score_min = f64::INFINITY;
    let mut score_max = f64::NEG_INFINITY;
    let mut counts: std::collections::BTreeMap<&str, usize> = std::collections::BTreeMap::new();

    for rec in records {
        *counts.entry(rec.domain.as_str()).or_default() += 1;
        for &s in &rec.scores {
            score_min = score_min.min(s);
            score_max = score_max.max(s);
        }
    }

    if !score_min.is_finite() || !score_max.is_finite() {
        return None;
    }

    Some(DatasetStats {
        n_records: records.len(),
        domain_counts: counts
            .into_iter()
            .map(|(d, n)| (d.to_string(), n))
            .collect(),
        score_min,
        score_max,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::path::PathBuf;

    fn base_config(path: PathBuf) -> AnalysisConfig {
        AnalysisConfig {
            input_path: path,
            timepoint: "1".to_string(),
            criterion_column: "passed".to_string(),
            no_criterion_filter: false,
            min_n_warn: 4,
            tau_method: crate::domain::TauMethod::Reml,
            reml_max_iter: 500,
            plot: false,
            plot_width: 80,
            plot_height: 20,
            export_results: None,
            export_meta: None,
            debug_bundle: false,
        }
    }

    fn write_temp_csv(name: &str, contents: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("irap-ingest-{name}-{}.csv", std::process::id()));
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn ingest_filters_timepoint_and_criterion() {
        let path = write_temp_csv(
            "filter",
            "participant,domain,timepoint,passed,tt1,tt2,tt3,tt4\n\
             p1,flowers,1,true,0.1,0.2,0.3,0.4\n\
             p2,flowers,1,false,0.5,0.6,0.7,0.8\n\
             p3,flowers,2,true,0.9,1.0,1.1,1.2\n",
        );
        let ingest = load_score_records(&base_config(path.clone())).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(ingest.rows_read, 3);
        assert_eq!(ingest.rows_used, 1);
        assert_eq!(ingest.rows_excluded_criterion, 1);
        assert_eq!(ingest.records[0].participant, "p1");
        assert_eq!(ingest.stats.domain_counts, vec![("flowers".to_string(), 1)]);
    }

    #[test]
    fn bad_rows_are_collected_not_fatal() {
        let path = write_temp_csv(
            "rowerr",
            "participant,domain,timepoint,passed,tt1,tt2,tt3,tt4\n\
             p1,flowers,1,true,0.1,0.2,0.3,0.4\n\
             p2,flowers,1,true,not-a-number,0.6,0.7,0.8\n\
             p1,flowers,1,true,0.2,0.3,0.4,0.5\n",
        );
        let ingest = load_score_records(&base_config(path.clone())).unwrap();
        std::fs::remove_file(path).ok();

        assert_eq!(ingest.rows_used, 1);
        assert_eq!(ingest.row_errors.len(), 2);
        assert!(ingest.row_errors[0].message.contains("tt1"));
        assert!(ingest.row_errors[1].message.contains("Duplicate"));
    }

    #[test]
    fn missing_column_is_a_usage_error() {
        let path = write_temp_csv(
            "missing",
            "participant,domain,timepoint,tt1,tt2,tt3,tt4\n\
             p1,flowers,1,0.1,0.2,0.3,0.4\n",
        );
        let err = load_score_records(&base_config(path.clone())).unwrap_err();
        std::fs::remove_file(path).ok();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn no_criterion_filter_skips_the_column_entirely() {
        let path = write_temp_csv(
            "nocrit",
            "participant,domain,timepoint,tt1,tt2,tt3,tt4\n\
             p1,flowers,1,0.1,0.2,0.3,0.4\n",
        );
        let mut config = base_config(path.clone());
        config.no_criterion_filter = true;
        let ingest = load_score_records(&config).unwrap();
        std::fs::remove_file(path).ok();
        assert_eq!(ingest.rows_used, 1);
    }
}
