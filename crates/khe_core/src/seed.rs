//! Seed loops.
//!
//! For very negative x, khe(x + iy) is 1 + 4e^x e^{iy} to within rounding, a
//! circle of radius 4e^x around 1. The seed places that circle around a
//! centre `c` instead, with radius `R` ulps, using the integral lattice
//! points `a² + b² = R²`: each sample `c + (a + bi) ulp` is exactly
//! representable for `c` in [1, 2) and lies exactly on the circle. Divided by
//! `c` it is the loop at `x = ln(R ulp / (4c))`.

use std::f64::consts::TAU;
use std::sync::Arc;

use num_complex::Complex;

use crate::config::{SEED_POINTS, ULP};
use crate::error::KheError;
use crate::loops::Loop;

/// Largest accepted seed radius, in ulps.
pub const MAX_SEED_RADIUS: u32 = 1 << 16;

/// Lattice points with angle in [0°, 45°) on a 36-point circle.
const OCTANT_POINTS: usize = 5;

#[derive(Debug, Clone)]
pub struct SeedCircle {
    radius: u32,
    offsets: Vec<(i64, i64)>,
    angles: Arc<[f64]>,
}

impl SeedCircle {
    /// Builds the seed lattice for `radius`, rejecting radii that do not give
    /// exactly [`SEED_POINTS`] points.
    pub fn new(radius: u32) -> Result<Self, KheError> {
        if radius == 0 || radius > MAX_SEED_RADIUS {
            return Err(KheError::RadiusOutOfRange {
                radius,
                max: MAX_SEED_RADIUS,
            });
        }
        let quadrant = quadrant_points(radius);
        let found = 4 * quadrant.len();
        if found != SEED_POINTS {
            return Err(KheError::RadiusLatticeCount {
                radius,
                found,
                expected: SEED_POINTS,
            });
        }
        let octant = quadrant.iter().filter(|&&(a, b)| b < a).count();
        if octant != OCTANT_POINTS {
            return Err(KheError::SeedSymmetry {
                radius,
                found: octant,
                expected: OCTANT_POINTS,
            });
        }

        let offsets: Vec<(i64, i64)> = (0..4)
            .flat_map(|turns| quadrant.iter().map(move |&p| rotate_quarter(p, turns)))
            .collect();
        let angles: Vec<f64> = offsets
            .iter()
            .map(|&(a, b)| (b as f64).atan2(a as f64).rem_euclid(TAU))
            .collect();

        Ok(Self {
            radius,
            offsets,
            angles: angles.into(),
        })
    }

    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Lattice offsets `(a, b)` in angle order, starting at `(R, 0)`.
    pub fn lattice_points(&self) -> &[(i64, i64)] {
        &self.offsets
    }

    /// Angles of the lattice points in [0, 2π), strictly increasing.
    pub fn angles(&self) -> &Arc<[f64]> {
        &self.angles
    }

    /// Centre whose seed circle, divided by the centre, is the loop at `x`.
    pub fn circle_center(&self, x: f64) -> f64 {
        (-x).exp() * self.radius as f64 / 4.0 * ULP
    }

    /// Real part represented by a seed circle around `center`; inverse of
    /// [`SeedCircle::circle_center`].
    pub fn seed_real_part(&self, center: f64) -> f64 {
        (self.radius as f64 * ULP / (4.0 * center)).ln()
    }

    /// The seed loop around `center`.
    pub fn tiny_circle(&self, center: Complex<f64>) -> Result<Loop, KheError> {
        let finite = center.re.is_finite() && center.im.is_finite();
        if !finite || (Complex::new(2.0, 0.0) - center).norm() == 0.0 {
            return Err(KheError::InvalidCenter(center));
        }
        Ok(self.seed_loop(center))
    }

    pub(crate) fn seed_loop(&self, center: Complex<f64>) -> Loop {
        let points = self
            .offsets
            .iter()
            .map(|&(a, b)| center + Complex::new(a as f64 * ULP, b as f64 * ULP))
            .collect();
        Loop::new(points, 0, Arc::clone(&self.angles))
    }
}

/// Lattice points with a > 0, b >= 0 in increasing angle.
fn quadrant_points(radius: u32) -> Vec<(i64, i64)> {
    let r = radius as i64;
    (1..=r)
        .rev()
        .filter_map(|a| {
            let b2 = r * r - a * a;
            let b = isqrt(b2);
            (b * b == b2).then_some((a, b))
        })
        .collect()
}

fn rotate_quarter(point: (i64, i64), turns: usize) -> (i64, i64) {
    (0..turns).fold(point, |(a, b), _| (-b, a))
}

fn isqrt(n: i64) -> i64 {
    let mut root = (n as f64).sqrt() as i64;
    while root * root > n {
        root -= 1;
    }
    while (root + 1) * (root + 1) <= n {
        root += 1;
    }
    root
}
