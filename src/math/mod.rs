//! Mathematical primitives: Pearson correlation and the Fisher z-transform.

pub mod correlation;
pub mod transform;

pub use correlation::*;
pub use transform::*;
