use num_complex::Complex;
use num_traits::{Float, FromPrimitive};
use std::fmt::Debug;

/// A trait for the real types that loop statistics are accumulated in.
/// Must support basic arithmetic, debug printing, and conversion from counts.
pub trait Scalar: Float + FromPrimitive + Debug + 'static {}

impl<T: Float + FromPrimitive + Debug + 'static> Scalar for T {}

/// One inverse step of the arithmetic-geometric mean.
pub trait InverseAgm {
    /// Returns the unordered pair `(p, q)` whose arithmetic mean is `a` and
    /// whose product is `g * g`.
    ///
    /// The order of the pair carries no meaning; loop doubling decides which
    /// root continues which sample.
    fn inverse_step(&self, a: Complex<f64>, g: Complex<f64>) -> (Complex<f64>, Complex<f64>);
}
