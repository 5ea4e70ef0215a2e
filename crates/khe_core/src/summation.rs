use crate::traits::Scalar;

/// Number of values added left to right at the bottom of the recursion.
const BLOCK: usize = 8;

/// Adds many values with pairwise (cascade) summation.
///
/// Rounding error grows with the logarithm of the length instead of the
/// length, which keeps averages over loops with millions of points within a
/// few ulps.
pub fn pairwise_sum<T: Scalar>(values: &[T]) -> T {
    if values.len() <= BLOCK {
        return values.iter().fold(T::zero(), |acc, &v| acc + v);
    }
    let mid = values.len() / 2;
    pairwise_sum(&values[..mid]) + pairwise_sum(&values[mid..])
}

/// Mean of `values` using [`pairwise_sum`]; `None` for an empty slice.
pub fn pairwise_mean<T: Scalar>(values: &[T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    Some(pairwise_sum(values) / T::from_usize(values.len())?)
}
