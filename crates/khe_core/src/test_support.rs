use std::f64::consts::TAU;

use num_complex::Complex;

/// Direct series for khe: `(1 + 2 Σ_{n≥1} e^{n² z})²`. It converges for every
/// `Re z < 0`; the 200-term cut keeps it accurate to rounding for
/// `Re z <= -0.001`.
pub(crate) fn theta_squared(z: Complex<f64>) -> Complex<f64> {
    let mut sum = Complex::new(1.0, 0.0);
    for n in 1..200u32 {
        let term = (z * (n * n) as f64).exp();
        sum += term.scale(2.0);
        if term.norm() < 1e-20 {
            break;
        }
    }
    sum * sum
}

/// Whether `y` lies within 0.004 of a turn of an odd multiple of 1/16 turn.
///
/// Both roots of a doubling peak together there and agree to within
/// rounding, so loops eleven doublings deep carry that rounding into their
/// samples.
pub(crate) fn near_odd_sixteenth(y: f64) -> bool {
    let sixteenths = y.rem_euclid(TAU) / TAU * 16.0;
    let nearest = sixteenths.round();
    (sixteenths - nearest).abs() < 16.0 * 0.004 && nearest as i64 % 2 == 1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn series_matches_truncated_theta() {
        let q = (-3.0f64).exp();
        let root = 1.0 + 2.0 * q + 2.0 * q.powi(4);
        let expected = root * root;
        let got = theta_squared(Complex::new(-3.0, 0.0));
        assert!((got.re - expected).abs() < 1e-9);
        assert_eq!(got.im, 0.0);
    }

    #[test]
    fn series_has_the_axis_pole() {
        // khe(x) ~ π/|x| as x -> 0-.
        let x = -0.002;
        let got = theta_squared(Complex::new(x, 0.0)).re;
        assert!((got * x.abs() / std::f64::consts::PI - 1.0).abs() < 1e-10);
    }

    #[test]
    fn odd_sixteenths_are_flagged() {
        assert!(near_odd_sixteenth(TAU / 16.0));
        assert!(near_odd_sixteenth(TAU * 13.0 / 16.0 + 0.01));
        assert!(near_odd_sixteenth(-TAU / 16.0));
        assert!(!near_odd_sixteenth(TAU / 8.0));
        assert!(!near_odd_sixteenth(0.0));
        assert!(!near_odd_sixteenth(TAU * 0.1));
    }
}
