use std::f64::consts::TAU;

use anyhow::{Context, Result};
use num_complex::Complex;

use crate::cache::{LoopCache, Reach};
use crate::config::KheConfig;
use crate::interp::InterpWindow;
use crate::loops::LoopView;

/// Evaluator for khe(z) on the left half plane.
///
/// Each evaluator owns its loop cache; evaluators never share loops, even
/// with equal configurations.
#[derive(Debug)]
pub struct Khe {
    config: KheConfig,
    cache: LoopCache,
}

impl Khe {
    pub fn new(config: KheConfig) -> Result<Self> {
        let cache = LoopCache::new(&config)
            .with_context(|| format!("invalid khe configuration (radius {})", config.radius))?;
        Ok(Self { config, cache })
    }

    pub fn with_radius(radius: u32) -> Result<Self> {
        Self::new(KheConfig::with_radius(radius))
    }

    pub fn config(&self) -> &KheConfig {
        &self.config
    }

    pub fn cache(&self) -> &LoopCache {
        &self.cache
    }

    /// The loop sampling khe at real part `x`, if one is used there.
    pub fn get_loop(&self, x: f64) -> Option<LoopView> {
        self.cache.get_loop(x)
    }

    /// khe(z). NaN outside the open left half plane, for non-finite
    /// imaginary parts, and where no trustworthy loop reaches: closer to the
    /// imaginary axis than `max_doublings` allows, or past a refused doubling.
    pub fn evaluate(&self, z: Complex<f64>) -> Complex<f64> {
        let nan = Complex::new(f64::NAN, f64::NAN);
        if z.re.is_nan() || z.re >= 0.0 || !z.im.is_finite() {
            return nan;
        }
        let view = match self.cache.lookup(z.re) {
            Reach::Asymptotic => return Self::asymptotic(z),
            Reach::Unreachable => return nan,
            Reach::Sampled(view) => view,
        };
        let mut y = z.im.rem_euclid(TAU);
        if y >= TAU {
            y -= TAU;
        }
        InterpWindow::gather(&view, y).evaluate(y)
    }

    /// `4e^z + 1`, the value of khe to machine precision for very negative
    /// real parts.
    pub fn asymptotic(z: Complex<f64>) -> Complex<f64> {
        z.exp().scale(4.0) + 1.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{near_odd_sixteenth, theta_squared};
    use std::f64::consts::PI;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err:#}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn khe(radius: u32) -> Khe {
        Khe::with_radius(radius).expect("admissible radius")
    }

    /// Largest |khe| on the loop at `x`, reached at y = 0.
    fn scale_at(x: f64) -> f64 {
        theta_squared(Complex::new(x, 0.0)).norm()
    }

    #[test]
    fn rejects_bad_configurations() {
        assert_err_contains(Khe::with_radius(5), "12 lattice points");
        assert_err_contains(Khe::with_radius(5), "invalid khe configuration");
        assert_err_contains(
            Khe::new(KheConfig {
                radius: 65,
                max_doublings: 40,
            }),
            "exceeds",
        );
    }

    #[test]
    fn nan_outside_the_left_half_plane() {
        let khe = khe(65);
        for z in [
            Complex::new(0.0, 1.0),
            Complex::new(0.25, -2.0),
            Complex::new(f64::NAN, 0.0),
            Complex::new(-1.0, f64::INFINITY),
            Complex::new(-1.0, f64::NAN),
        ] {
            let w = khe.evaluate(z);
            assert!(w.re.is_nan() && w.im.is_nan(), "z = {z}");
        }
    }

    #[test]
    fn far_left_is_the_asymptote() {
        let khe = khe(65);
        for z in [Complex::new(-40.0, 0.3), Complex::new(-700.0, -5.0)] {
            assert_eq!(khe.evaluate(z), Khe::asymptotic(z));
        }
        assert!(khe.cache().is_empty());
    }

    #[test]
    fn radii_agree_with_each_other() {
        let z = Complex::new(-1.0, -1.0);
        let values: Vec<Complex<f64>> = [65, 85, 221].iter().map(|&r| khe(r).evaluate(z)).collect();
        let scale = scale_at(-1.0);
        for pair in values.windows(2) {
            let err = (pair[0] - pair[1]).norm() / scale;
            assert!(err < 1.5e-8, "radii disagree by {err:e}");
        }
    }

    #[test]
    fn matches_theta_squared() {
        let khe = khe(85);
        for x in [-12.0, -3.0, -1.0, -0.4, -0.15] {
            let scale = scale_at(x);
            for k in 0..37 {
                let y = -PI + 2.0 * PI * k as f64 / 37.0 + 0.01;
                let z = Complex::new(x, y);
                let err = (khe.evaluate(z) - theta_squared(z)).norm() / scale;
                assert!(err < 1e-8, "z = {z} error {err:e}");
            }
        }
    }

    #[test]
    fn matches_theta_squared_near_the_axis() {
        for radius in [65, 85, 221] {
            let khe = khe(radius);
            for x in [-0.05, -0.02, -0.012] {
                let scale = scale_at(x);
                for k in 0..61 {
                    let y = -PI + 2.0 * PI * k as f64 / 61.0 + 0.01;
                    let z = Complex::new(x, y);
                    let err = (khe.evaluate(z) - theta_squared(z)).norm() / scale;
                    let limit = if near_odd_sixteenth(y) { 1e-4 } else { 2e-8 };
                    assert!(err < limit, "radius {radius} z = {z} error {err:e}");
                }
            }
        }
    }

    #[test]
    fn beyond_the_depth_cap_is_nan() {
        let khe = khe(65);
        for x in [-1e-5, -1e-4] {
            let w = khe.evaluate(Complex::new(x, 0.0));
            assert!(w.re.is_nan() && w.im.is_nan(), "x = {x} gave {w}");
            assert!(khe.get_loop(x).is_none());
        }
        assert!(khe.cache().is_empty());

        let shallow = Khe::new(KheConfig {
            radius: 65,
            max_doublings: 4,
        })
        .expect("valid config");
        assert!(shallow.evaluate(Complex::new(-1.0, 0.5)).re.is_nan());
        let z = Complex::new(-2.0, 0.5);
        let err = (shallow.evaluate(z) - theta_squared(z)).norm() / scale_at(-2.0);
        assert!(err < 1e-8);
    }

    #[test]
    fn imaginary_period_is_two_pi() {
        let khe = khe(65);
        let z = Complex::new(-0.8, 0.7);
        let shifted = khe.evaluate(z + Complex::new(0.0, 3.0 * TAU));
        assert!((khe.evaluate(z) - shifted).norm() < 1e-12 * scale_at(-0.8));
    }

    #[test]
    fn satisfies_the_duplication_formulas() {
        let khe = khe(221);
        let half_turn = Complex::new(0.0, PI);
        for z in [Complex::new(-0.6, 0.3), Complex::new(-1.3, -2.1)] {
            let a = khe.evaluate(z);
            let b = khe.evaluate(z + half_turn);
            let doubled = khe.evaluate(z.scale(2.0));
            let shifted = khe.evaluate(z.scale(2.0) + half_turn);
            let scale = scale_at(z.re);
            assert!((a + b - doubled.scale(2.0)).norm() < 1e-7 * scale);
            assert!((a * b - shifted * shifted).norm() < 1e-7 * scale * scale);
        }
    }

    #[test]
    fn respects_conjugate_symmetry() {
        let khe = khe(65);
        for z in [Complex::new(-0.5, 0.4), Complex::new(-2.0, 2.9)] {
            let err = (khe.evaluate(z.conj()) - khe.evaluate(z).conj()).norm();
            assert!(err < 1e-9 * scale_at(z.re));
        }
    }

    #[test]
    fn real_axis_is_real_and_above_one() {
        let khe = khe(85);
        for x in [-5.0, -1.0, -0.3] {
            let w = khe.evaluate(Complex::new(x, 0.0));
            assert!(w.re > 1.0);
            assert!(w.im.abs() < 1e-12 * w.re);
        }
    }

    #[test]
    fn evaluator_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Khe>();

        let khe = khe(65);
        let z = Complex::new(-0.9, 1.1);
        let expected = khe.evaluate(z);
        std::thread::scope(|scope| {
            for _ in 0..4 {
                scope.spawn(|| assert_eq!(khe.evaluate(z), expected));
            }
        });
    }
}
