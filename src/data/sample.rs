//! Synthetic IRAP dataset generation.
//!
//! Generates a scores CSV with a known latent correlation structure, useful
//! for demos and for exercising the full pipeline in tests. Each
//! participant's four trial-type scores share a single latent factor:
//!
//! ```text
//! tt_j = sqrt(rho) * g + sqrt(1 - rho) * e_j,   g, e_j ~ N(0, 1)
//! ```
//!
//! which yields an expected inter-trial-type correlation of exactly `rho`.
//! Generation is deterministic given the seed.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;

use crate::error::AppError;

/// Settings for the synthetic dataset.
#[derive(Debug, Clone)]
pub struct SampleConfig {
    pub domains: usize,
    /// Participants per domain.
    pub participants: usize,
    /// Target inter-trial-type correlation, in [0, 1).
    pub rho: f64,
    /// Probability that a participant passes the quality criterion.
    pub pass_rate: f64,
    pub seed: u64,
}

/// One generated CSV row.
#[derive(Debug, Clone)]
pub struct SampleRow {
    pub participant: String,
    pub domain: String,
    pub timepoint: String,
    pub passed: bool,
    pub scores: [f64; 4],
}

/// Generate rows for both timepoints across all domains.
pub fn generate_sample(config: &SampleConfig) -> Result<Vec<SampleRow>, AppError> {
    if config.domains == 0 || config.participants == 0 {
        return Err(AppError::usage("Domains and participants must be > 0."));
    }
    if !(0.0..1.0).contains(&config.rho) {
        return Err(AppError::usage("`rho` must be in [0, 1)."));
    }
    if !(0.0..=1.0).contains(&config.pass_rate) {
        return Err(AppError::usage("`pass_rate` must be in [0, 1]."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::compute(format!("Noise distribution error: {e}")))?;

    let shared = config.rho.sqrt();
    let unique = (1.0 - config.rho).sqrt();

    let mut rows = Vec::with_capacity(config.domains * config.participants * 2);
    for d in 0..config.domains {
        let domain = format!("domain-{:02}", d + 1);
        for p in 0..config.participants {
            let participant = format!("{domain}-p{:03}", p + 1);
            let passed = rng.gen_range(0.0..1.0) < config.pass_rate;

            for timepoint in ["1", "2"] {
                let g: f64 = normal.sample(&mut rng);
                let mut scores = [0.0f64; 4];
                for s in scores.iter_mut() {
                    let e: f64 = normal.sample(&mut rng);
                    *s = shared * g + unique * e;
                }
                rows.push(SampleRow {
                    participant: participant.clone(),
                    domain: domain.clone(),
                    timepoint: timepoint.to_string(),
                    passed,
                    scores,
                });
            }
        }
    }

    Ok(rows)
}

/// Write generated rows as a scores CSV in the ingest schema.
pub fn write_sample_csv(path: &Path, rows: &[SampleRow]) -> Result<(), AppError> {
    let mut file = File::create(path).map_err(|e| {
        AppError::usage(format!(
            "Failed to create sample CSV '{}': {e}",
            path.display()
        ))
    })?;

    writeln!(file, "participant,domain,timepoint,passed,tt1,tt2,tt3,tt4")
        .map_err(|e| AppError::compute(format!("Failed to write sample CSV header: {e}")))?;

    for row in rows {
        writeln!(
            file,
            "{},{},{},{},{:.6},{:.6},{:.6},{:.6}",
            row.participant,
            row.domain,
            row.timepoint,
            row.passed,
            row.scores[0],
            row.scores[1],
            row.scores[2],
            row.scores[3],
        )
        .map_err(|e| AppError::compute(format!("Failed to write sample CSV row: {e}")))?;
    }

    Ok(())
}
