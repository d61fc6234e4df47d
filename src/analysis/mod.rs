//! Per-domain analysis stages.
//!
//! Responsibilities:
//!
//! - compute the six pairwise correlations per domain (parallel across domains)
//! - layer Fisher-z effect sizes onto each correlation
//! - derive 95% intervals and significance flags

pub mod correlate;
pub mod effect;

pub use correlate::*;
pub use effect::*;
