//! Cubic interpolation between loop samples.
//!
//! Samples are unequally spaced, so endpoint slopes come from five-point
//! Lagrange derivative stencils over the actual sample angles. The cubic is
//! written in Bezier form with the inner control points one third of an
//! interval along each endpoint tangent.

use std::f64::consts::TAU;

use num_complex::Complex;

use crate::loops::LoopView;

/// Samples on each side of the bracket used for the slopes.
const PADDING: usize = 2;
const WINDOW: usize = 2 * PADDING + 2;

/// Six consecutive samples around the interval containing a query angle.
#[derive(Debug, Clone, PartialEq)]
pub struct InterpWindow {
    angles: [f64; WINDOW],
    values: [Complex<f64>; WINDOW],
}

impl InterpWindow {
    pub fn from_samples(angles: [f64; WINDOW], values: [Complex<f64>; WINDOW]) -> Self {
        Self { angles, values }
    }

    /// Collects the window whose middle interval contains `y`, for `y` in
    /// `[0, 2π)`.
    pub fn gather(view: &LoopView, y: f64) -> Self {
        let len = view.len() as i64;
        let mut index = ((y / TAU) * len as f64).floor() as i64;
        index = index.clamp(0, len - 1);
        while index > 0 && view.angle(index) > y {
            index -= 1;
        }
        while view.angle(index + 1) <= y {
            index += 1;
        }
        assert!(
            view.angle(index) <= y && y < view.angle(index + 1),
            "no sample interval contains y = {y}"
        );

        let first = index - PADDING as i64;
        let angles = std::array::from_fn(|k| view.angle(first + k as i64));
        let values = std::array::from_fn(|k| view.point(first + k as i64));
        Self { angles, values }
    }

    /// Lower end and width of the bracketing interval.
    pub fn bracket(&self) -> (f64, f64) {
        let lo = self.angles[PADDING];
        (lo, self.angles[PADDING + 1] - lo)
    }

    /// Interpolated value at `y`, which must lie in the bracket.
    pub fn evaluate(&self, y: f64) -> Complex<f64> {
        let (lo, width) = self.bracket();
        let along = y - lo;
        assert!(
            (0.0..width).contains(&along),
            "y = {y} outside the bracket [{lo}, {})",
            lo + width
        );

        let left = self.values[PADDING];
        let right = self.values[PADDING + 1];
        let offset = if left.norm() <= right.norm() { left } else { right };
        let shifted: [Complex<f64>; WINDOW] = std::array::from_fn(|k| self.values[k] - offset);

        let s0 = stencil_slope(&self.angles[..5], &shifted[..5], PADDING);
        let s1 = stencil_slope(&self.angles[1..], &shifted[1..], PADDING);

        let p0 = shifted[PADDING];
        let p3 = shifted[PADDING + 1];
        let p1 = p0 + s0.scale(width / 3.0);
        let p2 = p3 - s1.scale(width / 3.0);

        let t = along / width;
        let u = 1.0 - t;
        let curve = p0.scale(u * u * u)
            + p1.scale(3.0 * u * u * t)
            + p2.scale(3.0 * u * t * t)
            + p3.scale(t * t * t);
        curve + offset
    }
}

/// Derivative at `xs[center]` of the polynomial through `(xs, ys)`.
pub fn stencil_slope(xs: &[f64], ys: &[Complex<f64>], center: usize) -> Complex<f64> {
    debug_assert_eq!(xs.len(), ys.len());
    let xc = xs[center];
    let mut slope = Complex::new(0.0, 0.0);
    for (j, (&xj, &yj)) in xs.iter().zip(ys).enumerate() {
        let weight = if j == center {
            xs.iter()
                .enumerate()
                .filter(|&(m, _)| m != center)
                .map(|(_, &xm)| 1.0 / (xc - xm))
                .sum::<f64>()
        } else {
            xs.iter()
                .enumerate()
                .filter(|&(m, _)| m != center && m != j)
                .map(|(_, &xm)| (xc - xm) / (xj - xm))
                .product::<f64>()
                / (xj - xc)
        };
        slope += yj.scale(weight);
    }
    slope
}
