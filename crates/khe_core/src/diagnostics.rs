//! Checks and summaries of loops.
//!
//! Nothing here is needed to evaluate khe. These are the measurements used
//! to decide whether a doubled loop can be trusted: round trips through the
//! forward AGM, conjugate symmetry, smoothness and the Fourier coefficients
//! that should match the q-series of θ₃².

use std::f64::consts::TAU;

use anyhow::{bail, Result};
use num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;

use crate::agm::agm1;
use crate::config::ULP;
use crate::evaluator::Khe;
use crate::loops::{Loop, LoopView};
use crate::summation::pairwise_mean;

/// Steps this many times larger than both neighbours look like a swapped
/// root pair.
const ORDERING_JUMP: f64 = 8.0;
/// Steps below this fraction of the largest magnitude are never flagged.
const ORDERING_FLOOR: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MaxMagnitude {
    pub index: usize,
    pub magnitude: f64,
    /// Imaginary part of the sample.
    pub angle: f64,
}

/// The largest sample of a loop.
pub fn out_max_mag(view: &LoopView) -> Option<MaxMagnitude> {
    view.to_vec()
        .iter()
        .enumerate()
        .map(|(index, p)| (index, p.norm()))
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(index, magnitude)| MaxMagnitude {
            index,
            magnitude,
            angle: view.angle(index as i64),
        })
}

fn max_norm(points: &[Complex<f64>]) -> f64 {
    points.iter().map(|p| p.norm()).fold(0.0, f64::max)
}

/// Mean half-distance between samples half a period apart. On a seed loop
/// this is the circle radius.
pub fn avg_radius(points: &[Complex<f64>]) -> Option<f64> {
    let half = points.len() / 2;
    let radii: Vec<f64> = (0..half)
        .map(|i| (points[i] - points[i + half]).norm() / 2.0)
        .collect();
    pairwise_mean(&radii)
}

/// Log-magnitudes `ln |p|` of the samples; the phase lives in [`vec_arg`].
pub fn vec_log(points: &[Complex<f64>]) -> Vec<f64> {
    points.iter().map(|p| p.norm().ln()).collect()
}

/// Arguments of the samples, unwrapped so consecutive values differ by less
/// than π.
pub fn vec_arg(points: &[Complex<f64>]) -> Vec<f64> {
    let mut out = Vec::with_capacity(points.len());
    let mut turns = 0.0;
    let mut previous: Option<f64> = None;
    for p in points {
        let arg = p.arg();
        if let Some(prev) = previous {
            let step = arg + turns - prev;
            if step > std::f64::consts::PI {
                turns -= TAU;
            } else if step < -std::f64::consts::PI {
                turns += TAU;
            }
        }
        let unwrapped = arg + turns;
        out.push(unwrapped);
        previous = Some(unwrapped);
    }
    out
}

/// Indices `i` where `points[i]` and `conj(points[N - i])` differ by more than
/// `tolerance` times the largest magnitude.
pub fn conjugate_symmetry_defects(points: &[Complex<f64>], tolerance: f64) -> Vec<usize> {
    let len = points.len();
    let limit = tolerance * max_norm(points);
    (0..len)
        .filter(|&i| (points[i] - points[(len - i) % len].conj()).norm() > limit)
        .collect()
}

/// Indices `i` where the step to `i + 1` jumps far above both neighbouring
/// steps.
pub fn ordering_defects(points: &[Complex<f64>]) -> Vec<usize> {
    let len = points.len();
    if len < 3 {
        return Vec::new();
    }
    let steps: Vec<f64> = (0..len)
        .map(|i| (points[(i + 1) % len] - points[i]).norm())
        .collect();
    let floor = ORDERING_FLOOR * max_norm(points);
    (0..len)
        .filter(|&i| {
            let step = steps[i];
            let before = steps[(i + len - 1) % len];
            let after = steps[(i + 1) % len];
            step > floor && step > ORDERING_JUMP * before && step > ORDERING_JUMP * after
        })
        .collect()
}

/// Parent indices whose child pair `(child[i], child[i + N])` does not map
/// back to `parent[i]` and `parent[i + N/2]²` within `ulps` ulps.
pub fn doubling_defects(parent: &Loop, child: &Loop, ulps: f64) -> Vec<usize> {
    let len = parent.len();
    if child.len() != 2 * len {
        return (0..len).collect();
    }
    let source = parent.points();
    let doubled = child.points();
    (0..len)
        .filter(|&i| {
            let (p, q) = (doubled[i], doubled[i + len]);
            let scale = p.norm().max(q.norm());
            let (mean, _) = agm1(p, q);
            let geo = source[(i + len / 2) % len];
            (mean - source[i]).norm() > ulps * ULP * scale
                || (p * q - geo * geo).norm() > ulps * ULP * scale * scale
        })
        .collect()
}

/// Fourier coefficients `c_m` of `y -> khe(x + iy)`, so that
/// `khe(x + iy) ≈ Σ c_m e^{imy}`. Index `m` holds `c_m` for `m < samples / 2`
/// and `c_{m - samples}` above.
pub fn loop_spectrum(khe: &Khe, x: f64, samples: usize) -> Result<Vec<Complex<f64>>> {
    if samples == 0 {
        bail!("loop_spectrum needs at least one sample");
    }
    let mut buffer: Vec<Complex<f64>> = (0..samples)
        .map(|k| khe.evaluate(Complex::new(x, TAU * k as f64 / samples as f64)))
        .collect();
    if buffer.iter().any(|v| !v.re.is_finite() || !v.im.is_finite()) {
        bail!("khe is not finite on the loop at x = {x}");
    }

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(samples);
    fft.process(&mut buffer);
    let n = samples as f64;
    Ok(buffer.into_iter().map(|c| c.unscale(n)).collect())
}
