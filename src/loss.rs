//! Large-margin Gaussian Mixture loss.
//!
//! # Mathematical Foundation
//!
//! Each class `k` owns a Gaussian over the feature space with mean
//! `center[k]` and diagonal covariance `exp(log_cov[k])`. For a feature
//! batch `feat` (`[batch, feat_dim]`, Row-Major) and labels `y`:
//!
//! - `dist[i,k] = Σ_d (feat[i,d] - center[k,d])² / cov[k,d]`
//!   (squared Mahalanobis distance under diagonal covariance)
//! - `logits[i,k] = -0.5 * (Σ_d log_cov[k,d] + dist[i,k])`
//! - `margin_logits[i,k]` uses `dist` scaled by `1 + alpha` when
//!   `k == y[i]`, so the true class must win by a margin
//! - likelihood regularizer = batch mean of
//!   `0.5·‖feat[i] - center[y[i]]‖² + 0.5·Σ_d log_cov[y[i],d]`
//!
//! The margin weight is a direct per-sample conditional lookup; no
//! dense one-hot matrix is materialized.
//!
//! Two variants are provided:
//!
//! - [`LgmLoss`] - learned per-class diagonal covariance
//! - [`LgmLossIdentity`] - covariance fixed to the identity; simpler
//!   and faster when per-class variance is not needed
//!
//! Both expose a hand-derived [`backward`](LgmLoss::backward) pass, so
//! no autodiff framework is required: the external training loop feeds
//! the gradient of its classification loss w.r.t. `margin_logits`
//! (see [`combined_loss`](crate::softmax::combined_loss)) and receives
//! gradients for features, centers, and log-variances.

use wide::f32x8;

use crate::config::LgmConfig;
use crate::error::{LgmError, LgmResult};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
#[cfg(feature = "serde")]
use std::path::Path;

/// Common read surface of both loss variants.
///
/// The anomaly utilities ([`crate::anomaly`]) consume trained models
/// through this trait, so they work with either covariance variant.
pub trait GaussianMixture {
    /// Number of mixture components (classes).
    fn num_classes(&self) -> usize;

    /// Feature dimensionality.
    fn feat_dim(&self) -> usize;

    /// Flat `[num_classes, feat_dim]` class centers.
    fn centers(&self) -> &[f32];

    /// Computes unmargined per-class logits for a feature batch.
    ///
    /// `feat` is `[batch * feat_dim]`; `logits` is resized to
    /// `[batch * num_classes]`. This is the genuine likelihood
    /// comparison used for classification, with no margin applied.
    fn logits_into(&self, feat: &[f32], logits: &mut Vec<f32>) -> LgmResult<()>;
}

/// Reusable output buffers for a forward pass.
///
/// Create once and pass to [`LgmLoss::forward_into`] repeatedly; the
/// buffers are resized on demand and reused across calls, so steady-state
/// forward passes are allocation-free.
#[derive(Debug, Clone, Default)]
pub struct LgmOutput {
    /// Unmargined logits: `[batch * num_classes]`.
    pub logits: Vec<f32>,

    /// Margin logits: `[batch * num_classes]`. Feed these to the
    /// classification loss during training.
    pub margin_logits: Vec<f32>,

    /// Likelihood regularizer (batch mean).
    pub likelihood: f32,

    /// Scratch row for per-class inverse covariances.
    scratch: Vec<f32>,
}

impl LgmOutput {
    /// Creates empty output buffers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Batch size implied by the current logits buffer.
    pub fn batch_size(&self, num_classes: usize) -> usize {
        self.logits.len() / num_classes
    }

    fn reserve(&mut self, batch: usize, num_classes: usize, feat_dim: usize) {
        self.logits.resize(batch * num_classes, 0.0);
        self.margin_logits.resize(batch * num_classes, 0.0);
        self.scratch.resize(feat_dim, 0.0);
    }
}

/// LGM loss with learned per-class diagonal covariance.
///
/// Owns the class Gaussian parameters for its lifetime. Both tables are
/// plain `f32` vectors so an external optimizer can update them in
/// place between forward/backward calls.
///
/// # Example
///
/// ```rust
/// use lgm::{LgmConfig, LgmLoss, LgmOutput};
///
/// let config = LgmConfig::new(3, 4, 0.5);
/// let loss = LgmLoss::new(config).unwrap();
///
/// let feat = vec![0.1f32; 2 * 4]; // batch of 2
/// let labels = vec![0usize, 2];
///
/// let mut out = LgmOutput::new();
/// loss.forward_into(&feat, &labels, &mut out).unwrap();
/// assert_eq!(out.logits.len(), 2 * 3);
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LgmLoss {
    /// Configuration, fixed at construction.
    pub config: LgmConfig,

    /// Class centers: `[num_classes, feat_dim]`, flat Row-Major.
    pub centers: Vec<f32>,

    /// Per-class log-variances: `[num_classes, feat_dim]`, flat
    /// Row-Major. `cov = exp(log_cov)` keeps variances positive without
    /// constraining the raw parameter.
    pub log_covs: Vec<f32>,
}

impl LgmLoss {
    /// Creates a new loss module with initialized parameters.
    ///
    /// Centers are spread deterministically in roughly unit range
    /// (seeded via `config.init_seed`); log-variances start at zero,
    /// i.e. unit covariance.
    pub fn new(config: LgmConfig) -> LgmResult<Self> {
        config.validate()?;
        let len = config.table_len();
        let centers = init_centers(len, config.init_seed);
        let log_covs = vec![0.0; len];
        Ok(Self {
            config,
            centers,
            log_covs,
        })
    }

    /// Builds a loss module from existing parameter tables.
    ///
    /// # Errors
    ///
    /// - [`LgmError::ShapeMismatch`] if a table is not
    ///   `num_classes * feat_dim` long
    /// - [`LgmError::NumericInstability`] if a table contains NaN or
    ///   infinite entries
    pub fn from_parts(config: LgmConfig, centers: Vec<f32>, log_covs: Vec<f32>) -> LgmResult<Self> {
        config.validate()?;
        let expected = config.table_shape();
        if centers.len() != config.table_len() {
            return Err(LgmError::shape_mismatch(&expected, &[centers.len()]));
        }
        if log_covs.len() != config.table_len() {
            return Err(LgmError::shape_mismatch(&expected, &[log_covs.len()]));
        }
        if !all_finite(&centers) {
            return Err(LgmError::numeric_instability("centers"));
        }
        if !all_finite(&log_covs) {
            return Err(LgmError::numeric_instability("log_covs"));
        }
        Ok(Self {
            config,
            centers,
            log_covs,
        })
    }

    /// Total number of trainable parameters.
    pub fn param_count(&self) -> usize {
        self.centers.len() + self.log_covs.len()
    }

    /// Forward pass into reusable output buffers (zero-allocation in
    /// steady state).
    ///
    /// # Arguments
    /// * `feat` - Feature batch `[batch * feat_dim]`, Row-Major
    /// * `labels` - Class labels `[batch]`, each in `[0, num_classes)`
    /// * `out` - Output buffers, resized on demand
    ///
    /// # Errors
    ///
    /// [`LgmError::ShapeMismatch`] / [`LgmError::InvalidLabel`] before
    /// any arithmetic runs.
    pub fn forward_into(
        &self,
        feat: &[f32],
        labels: &[usize],
        out: &mut LgmOutput,
    ) -> LgmResult<()> {
        let batch = validate_batch(&self.config, feat, labels)?;
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        let alpha = self.config.alpha;
        out.reserve(batch, c, d);

        for k in 0..c {
            let cov_row = &self.log_covs[k * d..(k + 1) * d];
            let mut slog = 0.0f32;
            for (inv, lc) in out.scratch.iter_mut().zip(cov_row) {
                *inv = (-lc).exp();
                slog += lc;
            }
            let center = &self.centers[k * d..(k + 1) * d];

            for i in 0..batch {
                let f = &feat[i * d..(i + 1) * d];
                let dist = weighted_sq_dist(f, center, &out.scratch);
                let w = if labels[i] == k { 1.0 + alpha } else { 1.0 };
                out.logits[i * c + k] = -0.5 * (slog + dist);
                out.margin_logits[i * c + k] = -0.5 * (slog + w * dist);
            }
        }

        out.likelihood = self.likelihood_term(feat, labels, batch);
        Ok(())
    }

    /// Allocating convenience wrapper around [`forward_into`](Self::forward_into).
    pub fn forward(&self, feat: &[f32], labels: &[usize]) -> LgmResult<LgmOutput> {
        let mut out = LgmOutput::new();
        self.forward_into(feat, labels, &mut out)?;
        Ok(out)
    }

    /// Backward pass with closed-form gradients.
    ///
    /// Accumulates into the provided buffers (callers zero them first):
    ///
    /// - `grad_margin_logits` - upstream gradient w.r.t.
    ///   `margin_logits`, `[batch * num_classes]` (e.g. from
    ///   [`combined_loss`](crate::softmax::combined_loss))
    /// - `lkd_weight` - weight of the likelihood regularizer in the
    ///   total loss
    /// - `grad_feat` - optional `[batch * feat_dim]` buffer for the
    ///   feature gradient (pass `None` at the embedding boundary when
    ///   features are inputs rather than intermediate activations)
    /// - `grad_centers`, `grad_log_covs` - `[num_classes * feat_dim]`
    ///
    /// The derivatives are linear in the distance and log-variance
    /// terms; see the module docs for the forward formulas they mirror.
    pub fn backward(
        &self,
        feat: &[f32],
        labels: &[usize],
        grad_margin_logits: &[f32],
        lkd_weight: f32,
        mut grad_feat: Option<&mut [f32]>,
        grad_centers: &mut [f32],
        grad_log_covs: &mut [f32],
    ) -> LgmResult<()> {
        let batch = validate_batch(&self.config, feat, labels)?;
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        if grad_margin_logits.len() != batch * c {
            return Err(LgmError::shape_mismatch(
                &[batch, c],
                &[grad_margin_logits.len()],
            ));
        }
        if grad_centers.len() != c * d {
            return Err(LgmError::shape_mismatch(&[c, d], &[grad_centers.len()]));
        }
        if grad_log_covs.len() != c * d {
            return Err(LgmError::shape_mismatch(&[c, d], &[grad_log_covs.len()]));
        }
        if let Some(gf) = grad_feat.as_deref() {
            if gf.len() != batch * d {
                return Err(LgmError::shape_mismatch(&[batch, d], &[gf.len()]));
            }
        }

        let alpha = self.config.alpha;
        let mut inv_cov = vec![0.0f32; d];

        // Margin-logit term: d(margin_logits[i,k])/d(param).
        for k in 0..c {
            let cov_row = &self.log_covs[k * d..(k + 1) * d];
            for (inv, lc) in inv_cov.iter_mut().zip(cov_row) {
                *inv = (-lc).exp();
            }
            let center = &self.centers[k * d..(k + 1) * d];

            for i in 0..batch {
                let g = grad_margin_logits[i * c + k];
                if g == 0.0 {
                    continue;
                }
                let w = if labels[i] == k { 1.0 + alpha } else { 1.0 };
                let f = &feat[i * d..(i + 1) * d];
                let gc_row = &mut grad_centers[k * d..(k + 1) * d];
                let gl_row = &mut grad_log_covs[k * d..(k + 1) * d];

                for dim in 0..d {
                    let diff = f[dim] - center[dim];
                    let wdiff = diff * inv_cov[dim];
                    gc_row[dim] += g * w * wdiff;
                    gl_row[dim] += g * (-0.5 + 0.5 * w * diff * wdiff);
                    if let Some(gf) = grad_feat.as_deref_mut() {
                        gf[i * d + dim] -= g * w * wdiff;
                    }
                }
            }
        }

        // Likelihood term: plain Euclidean pull toward the own-class
        // center plus the log-variance penalty.
        if batch > 0 && lkd_weight != 0.0 {
            let scale = lkd_weight / batch as f32;
            for i in 0..batch {
                let y = labels[i];
                let f = &feat[i * d..(i + 1) * d];
                let gc_row = &mut grad_centers[y * d..(y + 1) * d];
                let gl_row = &mut grad_log_covs[y * d..(y + 1) * d];
                for dim in 0..d {
                    let cdiff = f[dim] - self.centers[y * d + dim];
                    gc_row[dim] -= scale * cdiff;
                    gl_row[dim] += 0.5 * scale;
                    if let Some(gf) = grad_feat.as_deref_mut() {
                        gf[i * d + dim] += scale * cdiff;
                    }
                }
            }
        }

        Ok(())
    }

    fn likelihood_term(&self, feat: &[f32], labels: &[usize], batch: usize) -> f32 {
        let d = self.config.feat_dim;
        let mut acc = 0.0f32;
        for (i, &y) in labels.iter().enumerate() {
            let f = &feat[i * d..(i + 1) * d];
            let center = &self.centers[y * d..(y + 1) * d];
            let slog: f32 = self.log_covs[y * d..(y + 1) * d].iter().sum();
            acc += 0.5 * euclidean_sq_dist(f, center) + 0.5 * slog;
        }
        if batch > 0 {
            acc / batch as f32
        } else {
            0.0
        }
    }
}

impl GaussianMixture for LgmLoss {
    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn feat_dim(&self) -> usize {
        self.config.feat_dim
    }

    fn centers(&self) -> &[f32] {
        &self.centers
    }

    fn logits_into(&self, feat: &[f32], logits: &mut Vec<f32>) -> LgmResult<()> {
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        let batch = validate_feat_rows(feat, d)?;
        logits.resize(batch * c, 0.0);

        let mut inv_cov = vec![0.0f32; d];
        for k in 0..c {
            let cov_row = &self.log_covs[k * d..(k + 1) * d];
            let mut slog = 0.0f32;
            for (inv, lc) in inv_cov.iter_mut().zip(cov_row) {
                *inv = (-lc).exp();
                slog += lc;
            }
            let center = &self.centers[k * d..(k + 1) * d];
            for i in 0..batch {
                let f = &feat[i * d..(i + 1) * d];
                logits[i * c + k] = -0.5 * (slog + weighted_sq_dist(f, center, &inv_cov));
            }
        }
        Ok(())
    }
}

/// LGM loss with covariance fixed to the identity matrix.
///
/// Same contract as [`LgmLoss`] but without learned log-variances:
/// distances are plain squared Euclidean, logits are `-0.5 * dist`, and
/// the likelihood regularizer drops its log-variance term.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LgmLossIdentity {
    /// Configuration, fixed at construction.
    pub config: LgmConfig,

    /// Class centers: `[num_classes, feat_dim]`, flat Row-Major.
    pub centers: Vec<f32>,
}

impl LgmLossIdentity {
    /// Creates a new identity-covariance loss module.
    pub fn new(config: LgmConfig) -> LgmResult<Self> {
        config.validate()?;
        let centers = init_centers(config.table_len(), config.init_seed);
        Ok(Self { config, centers })
    }

    /// Builds a loss module from an existing center table.
    pub fn from_parts(config: LgmConfig, centers: Vec<f32>) -> LgmResult<Self> {
        config.validate()?;
        if centers.len() != config.table_len() {
            return Err(LgmError::shape_mismatch(
                &config.table_shape(),
                &[centers.len()],
            ));
        }
        if !all_finite(&centers) {
            return Err(LgmError::numeric_instability("centers"));
        }
        Ok(Self { config, centers })
    }

    /// Total number of trainable parameters.
    pub fn param_count(&self) -> usize {
        self.centers.len()
    }

    /// Forward pass into reusable output buffers.
    ///
    /// Same contract as [`LgmLoss::forward_into`]; `out.likelihood`
    /// carries only the Euclidean pull term.
    pub fn forward_into(
        &self,
        feat: &[f32],
        labels: &[usize],
        out: &mut LgmOutput,
    ) -> LgmResult<()> {
        let batch = validate_batch(&self.config, feat, labels)?;
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        let alpha = self.config.alpha;
        out.reserve(batch, c, d);

        let mut lkd = 0.0f32;
        for i in 0..batch {
            let f = &feat[i * d..(i + 1) * d];
            for k in 0..c {
                let center = &self.centers[k * d..(k + 1) * d];
                let dist = euclidean_sq_dist(f, center);
                let w = if labels[i] == k { 1.0 + alpha } else { 1.0 };
                out.logits[i * c + k] = -0.5 * dist;
                out.margin_logits[i * c + k] = -0.5 * (w * dist);
                if labels[i] == k {
                    lkd += 0.5 * dist;
                }
            }
        }

        out.likelihood = if batch > 0 { lkd / batch as f32 } else { 0.0 };
        Ok(())
    }

    /// Allocating convenience wrapper around [`forward_into`](Self::forward_into).
    pub fn forward(&self, feat: &[f32], labels: &[usize]) -> LgmResult<LgmOutput> {
        let mut out = LgmOutput::new();
        self.forward_into(feat, labels, &mut out)?;
        Ok(out)
    }

    /// Backward pass with closed-form gradients.
    ///
    /// Same contract as [`LgmLoss::backward`], minus the log-variance
    /// table.
    pub fn backward(
        &self,
        feat: &[f32],
        labels: &[usize],
        grad_margin_logits: &[f32],
        lkd_weight: f32,
        mut grad_feat: Option<&mut [f32]>,
        grad_centers: &mut [f32],
    ) -> LgmResult<()> {
        let batch = validate_batch(&self.config, feat, labels)?;
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        if grad_margin_logits.len() != batch * c {
            return Err(LgmError::shape_mismatch(
                &[batch, c],
                &[grad_margin_logits.len()],
            ));
        }
        if grad_centers.len() != c * d {
            return Err(LgmError::shape_mismatch(&[c, d], &[grad_centers.len()]));
        }
        if let Some(gf) = grad_feat.as_deref() {
            if gf.len() != batch * d {
                return Err(LgmError::shape_mismatch(&[batch, d], &[gf.len()]));
            }
        }

        let alpha = self.config.alpha;

        for k in 0..c {
            let center = &self.centers[k * d..(k + 1) * d];
            for i in 0..batch {
                let g = grad_margin_logits[i * c + k];
                if g == 0.0 {
                    continue;
                }
                let w = if labels[i] == k { 1.0 + alpha } else { 1.0 };
                let f = &feat[i * d..(i + 1) * d];
                let gc_row = &mut grad_centers[k * d..(k + 1) * d];
                for dim in 0..d {
                    let diff = f[dim] - center[dim];
                    gc_row[dim] += g * w * diff;
                    if let Some(gf) = grad_feat.as_deref_mut() {
                        gf[i * d + dim] -= g * w * diff;
                    }
                }
            }
        }

        if batch > 0 && lkd_weight != 0.0 {
            let scale = lkd_weight / batch as f32;
            for i in 0..batch {
                let y = labels[i];
                let f = &feat[i * d..(i + 1) * d];
                let gc_row = &mut grad_centers[y * d..(y + 1) * d];
                for dim in 0..d {
                    let cdiff = f[dim] - self.centers[y * d + dim];
                    gc_row[dim] -= scale * cdiff;
                    if let Some(gf) = grad_feat.as_deref_mut() {
                        gf[i * d + dim] += scale * cdiff;
                    }
                }
            }
        }

        Ok(())
    }
}

impl GaussianMixture for LgmLossIdentity {
    fn num_classes(&self) -> usize {
        self.config.num_classes
    }

    fn feat_dim(&self) -> usize {
        self.config.feat_dim
    }

    fn centers(&self) -> &[f32] {
        &self.centers
    }

    fn logits_into(&self, feat: &[f32], logits: &mut Vec<f32>) -> LgmResult<()> {
        let c = self.config.num_classes;
        let d = self.config.feat_dim;
        let batch = validate_feat_rows(feat, d)?;
        logits.resize(batch * c, 0.0);

        for i in 0..batch {
            let f = &feat[i * d..(i + 1) * d];
            for k in 0..c {
                let center = &self.centers[k * d..(k + 1) * d];
                logits[i * c + k] = -0.5 * euclidean_sq_dist(f, center);
            }
        }
        Ok(())
    }
}

// =============================================================================
// Checkpointing
// =============================================================================

#[cfg(feature = "serde")]
impl LgmLoss {
    /// Serializes the module to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes a module from bincode bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Saves a versioned checkpoint (magic + version + bincode body).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LgmResult<()> {
        write_checkpoint(self, path)
    }

    /// Loads a versioned checkpoint and validates the restored
    /// parameters.
    ///
    /// # Errors
    ///
    /// [`LgmError::InvalidCheckpoint`] on bad magic or truncation,
    /// [`LgmError::IncompatibleVersion`] on format mismatch,
    /// [`LgmError::NumericInstability`] if restored parameters are
    /// non-finite.
    pub fn load<P: AsRef<Path>>(path: P) -> LgmResult<Self> {
        let bytes = std::fs::read(path)?;
        let model: Self = read_checkpoint(&bytes)?;
        model.config.validate()?;
        if model.centers.len() != model.config.table_len()
            || model.log_covs.len() != model.config.table_len()
        {
            return Err(LgmError::invalid_checkpoint(
                "parameter table shape disagrees with config",
            ));
        }
        if !all_finite(&model.centers) || !all_finite(&model.log_covs) {
            return Err(LgmError::numeric_instability("checkpoint parameters"));
        }
        Ok(model)
    }
}

#[cfg(feature = "serde")]
impl LgmLossIdentity {
    /// Serializes the module to bytes using bincode.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserializes a module from bincode bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    /// Saves a versioned checkpoint (magic + version + bincode body).
    pub fn save<P: AsRef<Path>>(&self, path: P) -> LgmResult<()> {
        write_checkpoint(self, path)
    }

    /// Loads a versioned checkpoint and validates the restored
    /// parameters.
    pub fn load<P: AsRef<Path>>(path: P) -> LgmResult<Self> {
        let bytes = std::fs::read(path)?;
        let model: Self = read_checkpoint(&bytes)?;
        model.config.validate()?;
        if model.centers.len() != model.config.table_len() {
            return Err(LgmError::invalid_checkpoint(
                "parameter table shape disagrees with config",
            ));
        }
        if !all_finite(&model.centers) {
            return Err(LgmError::numeric_instability("checkpoint parameters"));
        }
        Ok(model)
    }
}

#[cfg(feature = "serde")]
fn write_checkpoint<T: Serialize, P: AsRef<Path>>(value: &T, path: P) -> LgmResult<()> {
    let body = bincode::serialize(value)?;
    let mut data = Vec::with_capacity(crate::MAGIC.len() + 4 + body.len());
    data.extend_from_slice(crate::MAGIC);
    data.extend_from_slice(&crate::CHECKPOINT_VERSION.to_le_bytes());
    data.extend_from_slice(&body);
    std::fs::write(path, data)?;
    Ok(())
}

#[cfg(feature = "serde")]
fn read_checkpoint<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> LgmResult<T> {
    let header = crate::MAGIC.len() + 4;
    if bytes.len() < header {
        return Err(LgmError::invalid_checkpoint("truncated header"));
    }
    let (magic, rest) = bytes.split_at(crate::MAGIC.len());
    if magic != crate::MAGIC {
        return Err(LgmError::invalid_checkpoint("bad magic bytes"));
    }
    let version = u32::from_le_bytes([rest[0], rest[1], rest[2], rest[3]]);
    if version != crate::CHECKPOINT_VERSION {
        return Err(LgmError::incompatible_version(
            crate::CHECKPOINT_VERSION,
            version,
        ));
    }
    Ok(bincode::deserialize(&rest[4..])?)
}

// =============================================================================
// Shared helpers
// =============================================================================

/// Validates a feature/label batch pair and returns the batch size.
fn validate_batch(config: &LgmConfig, feat: &[f32], labels: &[usize]) -> LgmResult<usize> {
    let d = config.feat_dim;
    let batch = labels.len();
    if feat.len() != batch * d {
        let got = if feat.len() % d == 0 {
            vec![feat.len() / d, d]
        } else {
            vec![feat.len()]
        };
        return Err(LgmError::ShapeMismatch {
            expected: vec![batch, d],
            got,
        });
    }
    for (index, &label) in labels.iter().enumerate() {
        if label >= config.num_classes {
            return Err(LgmError::invalid_label(label, config.num_classes, index));
        }
    }
    Ok(batch)
}

/// Validates that a bare feature batch is a whole number of rows.
fn validate_feat_rows(feat: &[f32], feat_dim: usize) -> LgmResult<usize> {
    if feat.len() % feat_dim != 0 {
        return Err(LgmError::ShapeMismatch {
            expected: vec![feat.len() / feat_dim, feat_dim],
            got: vec![feat.len()],
        });
    }
    Ok(feat.len() / feat_dim)
}

fn all_finite(values: &[f32]) -> bool {
    values.iter().all(|v| v.is_finite())
}

/// Deterministic center initialization in roughly unit range.
fn init_centers(len: usize, seed: Option<u64>) -> Vec<f32> {
    let seed = seed.unwrap_or(0x517c_c1b7);
    (0..len)
        .map(|i| {
            // Simple deterministic "random" for reproducibility
            let hash =
                ((i as u64).wrapping_add(seed).wrapping_mul(2654435761) % 1000) as f32 / 1000.0
                    - 0.5;
            hash * 2.0
        })
        .collect()
}

/// Squared Mahalanobis distance under a diagonal covariance row
/// (`inv_cov[d] = exp(-log_cov[d])`), 8-wide SIMD with scalar tail.
#[inline]
fn weighted_sq_dist(feat: &[f32], center: &[f32], inv_cov: &[f32]) -> f32 {
    let n = feat.len();
    let chunks = n / 8;
    let mut acc = f32x8::splat(0.0);

    for chunk in 0..chunks {
        let o = chunk * 8;
        let mut fa = [0.0f32; 8];
        let mut ca = [0.0f32; 8];
        let mut ia = [0.0f32; 8];
        fa.copy_from_slice(&feat[o..o + 8]);
        ca.copy_from_slice(&center[o..o + 8]);
        ia.copy_from_slice(&inv_cov[o..o + 8]);

        let diff = f32x8::new(fa) - f32x8::new(ca);
        acc += diff * diff * f32x8::new(ia);
    }

    let arr: [f32; 8] = acc.into();
    let mut sum: f32 = arr.iter().sum();

    for i in (chunks * 8)..n {
        let diff = feat[i] - center[i];
        sum += diff * diff * inv_cov[i];
    }

    sum
}

/// Squared Euclidean distance, 8-wide SIMD with scalar tail.
#[inline]
pub(crate) fn euclidean_sq_dist(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len();
    let chunks = n / 8;
    let mut acc = f32x8::splat(0.0);

    for chunk in 0..chunks {
        let o = chunk * 8;
        let mut aa = [0.0f32; 8];
        let mut ba = [0.0f32; 8];
        aa.copy_from_slice(&a[o..o + 8]);
        ba.copy_from_slice(&b[o..o + 8]);

        let diff = f32x8::new(aa) - f32x8::new(ba);
        acc += diff * diff;
    }

    let arr: [f32; 8] = acc.into();
    let mut sum: f32 = arr.iter().sum();

    for i in (chunks * 8)..n {
        let diff = a[i] - b[i];
        sum += diff * diff;
    }

    sum
}
