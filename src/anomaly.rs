//! Anomaly and likelihood scoring for claimed class labels.
//!
//! Given a trained feature extractor and a trained mixture (either loss
//! variant through the [`GaussianMixture`] seam), these utilities check
//! whether an input batch that *claims* to belong to certain classes is
//! statistically consistent with the learned feature distribution. An
//! input whose features land closer to another class's Gaussian than to
//! the claimed one (e.g. a poisoned sample) scores as anomalous.
//!
//! Both operations are pure: no state, no gradient bookkeeping.
//!
//! # Example
//!
//! ```rust,ignore
//! use lgm::{is_anomalous, likelihood};
//!
//! let flags = is_anomalous(&net, &loss, &claimed, &images)?;
//! let scores = likelihood(&net, &loss, &claimed, &images)?;
//! ```

use crate::error::{LgmError, LgmResult};
use crate::loss::{euclidean_sq_dist, GaussianMixture};

/// External embedding network: maps an input batch to a feature batch.
///
/// The loss crate never owns a network architecture; callers implement
/// this for whatever model produced the training features.
pub trait FeatureExtractor {
    /// Dimensionality of the produced feature vectors.
    fn feat_dim(&self) -> usize;

    /// Extracts features for `batch_size` samples.
    ///
    /// `features` is `[batch_size * feat_dim]`, Row-Major, pre-sized by
    /// the caller. Implementations interpret `input` themselves (image
    /// pixels, token ids, ...).
    fn extract_batch(
        &self,
        input: &[f32],
        batch_size: usize,
        features: &mut [f32],
    ) -> LgmResult<()>;
}

/// Pass-through extractor for callers that already hold feature
/// embeddings.
#[derive(Debug, Clone, Copy)]
pub struct IdentityExtractor {
    /// Feature dimensionality of the pass-through batch.
    pub feat_dim: usize,
}

impl FeatureExtractor for IdentityExtractor {
    fn feat_dim(&self) -> usize {
        self.feat_dim
    }

    fn extract_batch(
        &self,
        input: &[f32],
        batch_size: usize,
        features: &mut [f32],
    ) -> LgmResult<()> {
        if input.len() != batch_size * self.feat_dim {
            return Err(LgmError::shape_mismatch(
                &[batch_size, self.feat_dim],
                &[input.len()],
            ));
        }
        features.copy_from_slice(input);
        Ok(())
    }
}

/// Arg-max predicted class per row of a `[batch * num_classes]` logits
/// buffer. Ties resolve to the first maximal index.
pub fn predict_classes(logits: &[f32], num_classes: usize) -> Vec<usize> {
    logits
        .chunks(num_classes)
        .map(|row| {
            let mut best = 0;
            for (k, &v) in row.iter().enumerate() {
                if v > row[best] {
                    best = k;
                }
            }
            best
        })
        .collect()
}

/// Flags inputs whose predicted class disagrees with the claimed one.
///
/// Runs the extractor, computes unmargined logits under the learned
/// Gaussians, and takes the arg-max predicted class per sample. An
/// input is anomalous iff prediction and claim disagree.
///
/// # Arguments
///
/// * `claimed` - `[batch]` claimed class labels, each in
///   `[0, num_classes)`
/// * `input` - raw input batch, interpreted by the extractor
///
/// # Errors
///
/// [`LgmError::ShapeMismatch`] if extractor and mixture disagree on
/// `feat_dim`; [`LgmError::InvalidLabel`] for out-of-range claims.
pub fn is_anomalous<E, M>(
    extractor: &E,
    mixture: &M,
    claimed: &[usize],
    input: &[f32],
) -> LgmResult<Vec<bool>>
where
    E: FeatureExtractor,
    M: GaussianMixture,
{
    let feats = extract_features(extractor, mixture, claimed, input)?;

    let mut logits = Vec::new();
    mixture.logits_into(&feats, &mut logits)?;
    let predicted = predict_classes(&logits, mixture.num_classes());

    Ok(predicted
        .iter()
        .zip(claimed)
        .map(|(pred, claim)| pred != claim)
        .collect())
}

/// Unnormalized Gaussian likelihood of each input under its claimed
/// class's center: `exp(-0.5 * ||feat - center[claimed]||²)`.
///
/// Identity-covariance proxy, independent of any learned log-variances;
/// 1.0 when the feature sits exactly on the claimed center, decaying
/// toward zero with Euclidean distance. Very distant features underflow
/// to 0.0, which is expected and not recovered.
pub fn likelihood<E, M>(
    extractor: &E,
    mixture: &M,
    claimed: &[usize],
    input: &[f32],
) -> LgmResult<Vec<f32>>
where
    E: FeatureExtractor,
    M: GaussianMixture,
{
    let feats = extract_features(extractor, mixture, claimed, input)?;
    let d = mixture.feat_dim();
    let centers = mixture.centers();

    Ok(claimed
        .iter()
        .enumerate()
        .map(|(i, &y)| {
            let f = &feats[i * d..(i + 1) * d];
            let center = &centers[y * d..(y + 1) * d];
            (-0.5 * euclidean_sq_dist(f, center)).exp()
        })
        .collect())
}

fn extract_features<E, M>(
    extractor: &E,
    mixture: &M,
    claimed: &[usize],
    input: &[f32],
) -> LgmResult<Vec<f32>>
where
    E: FeatureExtractor,
    M: GaussianMixture,
{
    let d = mixture.feat_dim();
    if extractor.feat_dim() != d {
        return Err(LgmError::shape_mismatch(&[d], &[extractor.feat_dim()]));
    }
    for (index, &label) in claimed.iter().enumerate() {
        if label >= mixture.num_classes() {
            return Err(LgmError::invalid_label(
                label,
                mixture.num_classes(),
                index,
            ));
        }
    }

    let batch = claimed.len();
    let mut feats = vec![0.0f32; batch * d];
    extractor.extract_batch(input, batch, &mut feats)?;
    Ok(feats)
}
