//! Softmax and cross-entropy helpers over LGM logits.
//!
//! The LGM training objective combines a classification loss over the
//! margin logits with the likelihood regularizer:
//!
//! `L = CE(margin_logits, labels) + lkd_weight * likelihood`
//!
//! [`combined_loss`] assembles exactly that and returns the gradient
//! w.r.t. the margin logits, which feeds straight into
//! [`LgmLoss::backward`](crate::LgmLoss::backward).

use crate::config::EPSILON;
use crate::error::{LgmError, LgmResult};

/// Computes softmax in-place.
///
/// Applies softmax over groups of size `dim_size`:
///
/// `softmax(x_i) = exp(x_i) / Σ_j exp(x_j)`
///
/// # Arguments
///
/// * `x` - Input logits (modified in-place)
/// * `dim_size` - Size of each softmax group
pub fn softmax(x: &mut [f32], dim_size: usize) {
    let batch_size = x.len() / dim_size;

    for b in 0..batch_size {
        let slice = &mut x[b * dim_size..(b + 1) * dim_size];

        // Find max for numerical stability
        let max = slice.iter().copied().fold(f32::NEG_INFINITY, f32::max);

        // Compute exp and sum
        let mut sum = 0.0f32;
        for v in slice.iter_mut() {
            *v = (*v - max).exp();
            sum += *v;
        }

        // Normalize
        for v in slice.iter_mut() {
            *v /= sum + EPSILON;
        }
    }
}

/// Mean softmax cross-entropy over integer class labels.
///
/// # Arguments
///
/// * `logits` - `[batch * num_classes]`, Row-Major
/// * `labels` - `[batch]`, each in `[0, num_classes)`
///
/// # Returns
///
/// Tuple of (loss, gradient):
/// - `loss`: mean `-ln p[label]` over the batch
/// - `gradient`: `[batch * num_classes]`, `(softmax - onehot) / batch`
///
/// Probabilities are clamped to [`EPSILON`] before the log to avoid
/// `ln(0)` when a feature sits far outside every class Gaussian.
pub fn cross_entropy(
    logits: &[f32],
    labels: &[usize],
    num_classes: usize,
) -> LgmResult<(f32, Vec<f32>)> {
    let batch = labels.len();
    if logits.len() != batch * num_classes {
        return Err(LgmError::shape_mismatch(
            &[batch, num_classes],
            &[logits.len()],
        ));
    }
    for (index, &label) in labels.iter().enumerate() {
        if label >= num_classes {
            return Err(LgmError::invalid_label(label, num_classes, index));
        }
    }

    let mut probs = logits.to_vec();
    softmax(&mut probs, num_classes);

    let mut loss = 0.0f32;
    let inv_n = if batch > 0 { 1.0 / batch as f32 } else { 0.0 };

    for (i, &y) in labels.iter().enumerate() {
        let row = &mut probs[i * num_classes..(i + 1) * num_classes];
        loss -= row[y].max(EPSILON).ln();
        // Reuse the probability buffer as the gradient buffer
        row[y] -= 1.0;
        for g in row.iter_mut() {
            *g *= inv_n;
        }
    }

    Ok((loss * inv_n, probs))
}

/// Combined LGM training loss: cross-entropy over the margin logits
/// plus the weighted likelihood regularizer.
///
/// # Arguments
///
/// * `margin_logits` - `[batch * num_classes]` from the forward pass
/// * `labels` - `[batch]`
/// * `likelihood` - regularizer value from the forward pass
/// * `lkd_weight` - weighting coefficient for the regularizer
///
/// # Returns
///
/// Tuple of (total_loss, ce_loss, gradient):
/// - `total_loss = ce_loss + lkd_weight * likelihood`
/// - `gradient`: w.r.t. the margin logits; pass it to `backward`
///   together with the same `lkd_weight`
pub fn combined_loss(
    margin_logits: &[f32],
    labels: &[usize],
    num_classes: usize,
    likelihood: f32,
    lkd_weight: f32,
) -> LgmResult<(f32, f32, Vec<f32>)> {
    let (ce, grad) = cross_entropy(margin_logits, labels, num_classes)?;
    Ok((ce + lkd_weight * likelihood, ce, grad))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax() {
        let mut x = vec![1.0, 2.0, 3.0];
        softmax(&mut x, 3);

        // Sum should be 1.0
        let sum: f32 = x.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);

        // Should be monotonically increasing
        assert!(x[0] < x[1]);
        assert!(x[1] < x[2]);
    }

    #[test]
    fn test_softmax_batched() {
        let mut x = vec![0.0, 0.0, 5.0, 5.0];
        softmax(&mut x, 2);

        assert!((x[0] - 0.5).abs() < 1e-5);
        assert!((x[1] - 0.5).abs() < 1e-5);
        assert!((x[2] - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_cross_entropy_prefers_correct_class() {
        // Confident correct prediction loses less than a confident
        // wrong one.
        let confident_right = vec![5.0f32, 0.0, 0.0];
        let confident_wrong = vec![0.0f32, 5.0, 0.0];
        let labels = vec![0usize];

        let (lo, _) = cross_entropy(&confident_right, &labels, 3).unwrap();
        let (hi, _) = cross_entropy(&confident_wrong, &labels, 3).unwrap();
        assert!(lo < hi);
    }

    #[test]
    fn test_cross_entropy_gradient_sums_to_zero() {
        // Softmax minus onehot sums to zero per row.
        let logits = vec![0.3f32, -1.2, 0.8, 2.0, 0.0, -0.5];
        let labels = vec![2usize, 0];

        let (_, grad) = cross_entropy(&logits, &labels, 3).unwrap();
        for row in grad.chunks(3) {
            let sum: f32 = row.iter().sum();
            assert!(sum.abs() < 1e-5, "row sum {sum}");
        }
    }

    #[test]
    fn test_cross_entropy_validates() {
        let logits = vec![0.0f32; 6];
        assert!(cross_entropy(&logits, &[0, 3], 3).is_err()); // label out of range
        assert!(cross_entropy(&logits, &[0], 3).is_err()); // shape mismatch
    }

    #[test]
    fn test_combined_loss_adds_weighted_regularizer() {
        let logits = vec![1.0f32, 0.0, 0.0];
        let labels = vec![0usize];

        let (total, ce, _) = combined_loss(&logits, &labels, 3, 2.0, 0.25).unwrap();
        assert!((total - (ce + 0.5)).abs() < 1e-6);
    }
}
