//! Periodicity (voicing confidence) from a bin distribution

use std::ops::Range;

use ndarray::ArrayView1;

use crate::decode::softmax;

/// Added inside the logarithm so empty bins contribute zero
const ENTROPY_FLOOR: f64 = 1e-7;

/// One minus the entropy of `probs`, normalized by `ln(bins)`
///
/// A single certain bin gives 1, a uniform distribution gives 0.
pub fn entropy(probs: &[f64], bins: usize) -> f32 {
    if bins <= 1 {
        return 1.0;
    }
    let neg_entropy: f64 = probs.iter().map(|&p| p * (p + ENTROPY_FLOOR).ln()).sum();
    (1.0 + neg_entropy / (bins as f64).ln()).clamp(0.0, 1.0) as f32
}

/// Largest bin probability
pub fn max(probs: &[f64]) -> f32 {
    probs.iter().copied().fold(0.0, f64::max) as f32
}

/// Probability mass inside `allowed`, from the unmasked scores
pub fn sum(raw: ArrayView1<'_, f32>, allowed: Range<usize>) -> f32 {
    match softmax(raw) {
        Some(probs) => probs[allowed].iter().sum::<f64>().clamp(0.0, 1.0) as f32,
        None => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array1;

    #[test]
    fn test_entropy_extremes() {
        let mut certain = vec![0.0; 1440];
        certain[700] = 1.0;
        assert_relative_eq!(entropy(&certain, 1440), 1.0, epsilon = 1e-6);

        let uniform = vec![1.0 / 1440.0; 1440];
        assert!(entropy(&uniform, 1440) < 1e-3);
    }

    #[test]
    fn test_entropy_normalized_by_full_axis() {
        // Uniform over half the bins keeps a tenth of the confidence
        let mut half = vec![0.0; 1440];
        for p in half.iter_mut().take(720) {
            *p = 1.0 / 720.0;
        }
        let expected = 1.0 - (720f64).ln() / (1440f64).ln();
        assert_relative_eq!(entropy(&half, 1440) as f64, expected, epsilon = 1e-4);
    }

    #[test]
    fn test_max() {
        assert_relative_eq!(max(&[0.1, 0.7, 0.2]), 0.7);
    }

    #[test]
    fn test_sum_counts_allowed_mass() {
        let raw = Array1::zeros(10);
        assert_relative_eq!(sum(raw.view(), 0..10), 1.0, epsilon = 1e-6);
        assert_relative_eq!(sum(raw.view(), 2..7), 0.5, epsilon = 1e-6);
        assert_eq!(sum(raw.view(), 3..3), 0.0);
    }
}
