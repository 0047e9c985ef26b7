//! Small order statistics shared by the stacking, calibration and noise stages.

use ndarray::ArrayView2;
use num_traits::{Float, NumCast};

/// Median of a slice, reordering it in place.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
/// Returns `None` for an empty slice. Callers must strip non-finite values.
pub fn median_in_place<T: Float>(values: &mut [T]) -> Option<T> {
    let n = values.len();
    if n == 0 {
        return None;
    }
    let cmp = |a: &T, b: &T| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
    if n == 1 {
        Some(values[0])
    } else if n % 2 == 1 {
        let mid = n / 2;
        Some(*values.select_nth_unstable_by(mid, cmp).1)
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, cmp);
        let upper = values[mid];
        values[..mid].select_nth_unstable_by(mid - 1, cmp);
        let two = T::one() + T::one();
        Some((values[mid - 1] + upper) / two)
    }
}

/// Arithmetic mean and population standard deviation.
pub fn mean_std<T: Float>(values: &[T]) -> Option<(T, T)> {
    if values.is_empty() {
        return None;
    }
    let n = <T as NumCast>::from(values.len())?;
    let mean = values.iter().fold(T::zero(), |acc, &v| acc + v) / n;
    let var = values
        .iter()
        .fold(T::zero(), |acc, &v| acc + (v - mean) * (v - mean))
        / n;
    Some((mean, var.sqrt()))
}

/// Median of all finite pixels of an image, accumulated in f64.
pub fn finite_median(data: &ArrayView2<f32>) -> Option<f64> {
    let mut values: Vec<f64> = data
        .iter()
        .filter(|v| v.is_finite())
        .map(|&v| v as f64)
        .collect();
    median_in_place(&mut values)
}

/// Value at `percentile` (0..=100) of the finite pixels, nearest-rank.
pub fn finite_percentile(data: &ArrayView2<f32>, percentile: f32) -> Option<f32> {
    let mut values: Vec<f32> = data.iter().copied().filter(|v| v.is_finite()).collect();
    if values.is_empty() {
        return None;
    }
    let rank = ((percentile.clamp(0.0, 100.0) / 100.0) * (values.len() - 1) as f32).round();
    let idx = (rank as usize).min(values.len() - 1);
    Some(*values.select_nth_unstable_by(idx, |a, b| a.total_cmp(b)).1)
}
