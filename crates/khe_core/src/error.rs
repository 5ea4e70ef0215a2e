//! Configuration failures.
//!
//! These are fatal: a seed or cache built from a rejected configuration would
//! produce meaningless loops, so construction stops instead of degrading.

use num_complex::Complex;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum KheError {
    #[error("seed radius {radius} has {found} lattice points on its circle, expected {expected}")]
    RadiusLatticeCount {
        radius: u32,
        found: usize,
        expected: usize,
    },
    #[error("seed radius {radius} is outside 1..={max}")]
    RadiusOutOfRange { radius: u32, max: u32 },
    #[error("seed radius {radius} has {found} first-octant points, expected {expected}")]
    SeedSymmetry {
        radius: u32,
        found: usize,
        expected: usize,
    },
    #[error("seed center {0} must be finite and different from 2")]
    InvalidCenter(Complex<f64>),
    #[error("max_doublings {requested} exceeds the supported limit {limit}")]
    DoublingLimit { requested: u32, limit: u32 },
}
