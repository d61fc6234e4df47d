//! Random-effects meta-analysis of Fisher-z effect sizes.
//!
//! Responsibilities:
//!
//! - group effects into per-domain covariance blocks
//! - estimate the between-domain variance component τ² (REML, DL fallback)
//! - pool the effects and derive CI / prediction interval / heterogeneity

pub mod pool;
pub mod reml;

pub use pool::*;
pub use reml::*;
