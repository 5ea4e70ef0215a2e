//! Loops: khe sampled over one period of the imaginary part.
//!
//! A loop after `depth` doublings has `36 * 2^depth` samples. Sample `i` sits
//! at angle `(A[i mod 36] + 2π⌊i/36⌋) / 2^depth`, where `A` are the lattice
//! angles of the seed circle, so the samples are not equally spaced but are
//! known exactly.

use std::f64::consts::TAU;
use std::sync::Arc;

use num_complex::Complex;

#[derive(Debug, Clone, PartialEq)]
pub struct Loop {
    points: Vec<Complex<f64>>,
    depth: u32,
    seed_angles: Arc<[f64]>,
}

impl Loop {
    pub(crate) fn new(points: Vec<Complex<f64>>, depth: u32, seed_angles: Arc<[f64]>) -> Self {
        debug_assert_eq!(points.len(), seed_angles.len() << depth);
        Self {
            points,
            depth,
            seed_angles,
        }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of doublings separating this loop from its seed.
    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn points(&self) -> &[Complex<f64>] {
        &self.points
    }

    pub fn seed_angles(&self) -> &Arc<[f64]> {
        &self.seed_angles
    }

    /// Sample at a periodic index.
    pub fn point(&self, index: i64) -> Complex<f64> {
        self.points[index.rem_euclid(self.points.len() as i64) as usize]
    }

    /// Imaginary part sampled by `index`, unwrapped: indices outside
    /// `0..len` continue into the neighbouring periods.
    pub fn angle(&self, index: i64) -> f64 {
        self.grid().angle(index)
    }

    pub(crate) fn grid(&self) -> SampleGrid<'_> {
        SampleGrid::new(&self.seed_angles, self.depth)
    }
}

/// Sample angles of a loop at some depth, without the samples.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SampleGrid<'a> {
    seed_angles: &'a [f64],
    depth: u32,
}

impl<'a> SampleGrid<'a> {
    pub(crate) fn new(seed_angles: &'a [f64], depth: u32) -> Self {
        Self { seed_angles, depth }
    }

    pub(crate) fn len(&self) -> usize {
        self.seed_angles.len() << self.depth
    }

    pub(crate) fn angle(&self, index: i64) -> f64 {
        let seed_len = self.seed_angles.len() as i64;
        let cycle = index.div_euclid(seed_len);
        let slot = index.rem_euclid(seed_len) as usize;
        ldexp(self.seed_angles[slot] + TAU * cycle as f64, -(self.depth as i32))
    }

    /// Index of the sample closest to `y` in `[0, 2π]`; `2π` itself maps to 0.
    pub(crate) fn nearest(&self, y: f64) -> usize {
        let len = self.len();
        let (mut lo, mut hi) = (0usize, len);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.angle(mid as i64) <= y {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        // `lo` samples lie at or below `y`.
        let above = lo;
        let below = lo.saturating_sub(1);
        let nearest = if (self.angle(above as i64) - y).abs() < (y - self.angle(below as i64)).abs() {
            above
        } else {
            below
        };
        nearest % len
    }
}

/// `x * 2^exp`, exact unless it overflows or underflows.
pub(crate) fn ldexp(x: f64, exp: i32) -> f64 {
    x * 2f64.powi(exp)
}

/// Read-only view of a cached loop, rescaled by its seed centre.
///
/// The raw loop is centred near `center` so that its seed is exactly
/// representable; dividing by the centre gives khe itself. The view shares
/// the cached loop and rescales on access.
#[derive(Debug, Clone)]
pub struct LoopView {
    raw: Arc<Loop>,
    center: f64,
}

impl LoopView {
    pub(crate) fn new(raw: Arc<Loop>, center: f64) -> Self {
        Self { raw, center }
    }

    pub fn center(&self) -> f64 {
        self.center
    }

    pub fn raw(&self) -> &Arc<Loop> {
        &self.raw
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn depth(&self) -> u32 {
        self.raw.depth()
    }

    pub fn point(&self, index: i64) -> Complex<f64> {
        self.raw.point(index).unscale(self.center)
    }

    pub fn angle(&self, index: i64) -> f64 {
        self.raw.angle(index)
    }

    /// All samples of khe on this loop.
    pub fn to_vec(&self) -> Vec<Complex<f64>> {
        self.raw
            .points()
            .iter()
            .map(|p| p.unscale(self.center))
            .collect()
    }
}
