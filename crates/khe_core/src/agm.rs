//! Single steps of the arithmetic-geometric mean.
//!
//! The forward step averages a pair and takes its geometric mean; the
//! inverse step recovers a pair from its two means. Loop doubling only
//! needs the inverse step, the forward step is used to check its results.

use num_complex::Complex;

use crate::traits::InverseAgm;

/// Forward AGM step: returns `((a + g) / 2, sqrt(a * g))` with the principal
/// square root.
pub fn agm1(a: Complex<f64>, g: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
    ((a + g).unscale(2.0), (a * g).sqrt())
}

/// Inverse AGM step that stays accurate when `a` and `g` agree to many digits.
///
/// `a² - g²` is formed as `(a - g)(a + g)`, so the difference of two nearly
/// equal means keeps its relative precision. The larger-magnitude root is
/// taken as `a ± sqrt(a² - g²)` and the other one as `g² / p`, avoiding the
/// cancellation in `a ∓ sqrt(a² - g²)`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StableInverseAgm;

impl InverseAgm for StableInverseAgm {
    fn inverse_step(&self, a: Complex<f64>, g: Complex<f64>) -> (Complex<f64>, Complex<f64>) {
        let root = ((a - g) * (a + g)).sqrt();
        let plus = a + root;
        let minus = a - root;
        let big = if plus.norm_sqr() >= minus.norm_sqr() {
            plus
        } else {
            minus
        };
        let scale = big.norm();
        if scale == 0.0 || !scale.is_finite() {
            return (plus, minus);
        }
        // g²/big computed on unit-scale values so tiny loops do not underflow.
        let unit = big.unscale(scale);
        let ratio = g.unscale(scale);
        let small = (ratio * ratio * unit.conj()).scale(scale);
        (big, small)
    }
}
