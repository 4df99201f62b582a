//! Loss configuration and hyperparameters.
//!
//! This module provides [`LgmConfig`] for configuring the LGM loss:
//! the number of classes, the feature dimensionality produced by the
//! external embedding network, and the margin strength `alpha`.
//!
//! # Example
//!
//! ```rust
//! use lgm::LgmConfig;
//!
//! // MNIST-style setup: 10 classes, 2-D embedding for visualization
//! let config = LgmConfig {
//!     num_classes: 10,
//!     feat_dim: 2,
//!     alpha: 1.0,
//!     ..Default::default()
//! };
//!
//! // Always validate before use
//! config.validate().expect("Invalid configuration");
//! ```
//!
//! # Margin strength
//!
//! `alpha` inflates the squared distance to the true class's mean before
//! the margin logits are formed:
//!
//! | `alpha` | Effect |
//! |---------|--------|
//! | 0.0     | Margin disabled; `margin_logits == logits` |
//! | 0.1-1.0 | Typical training range |
//!
//! Larger values force features further inside their class Gaussian
//! before the classification loss is satisfied.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Floor for probabilities and variances to avoid `log(0)` and division
/// by zero in downstream computations.
pub const EPSILON: f32 = 1e-6;

/// LGM loss configuration.
///
/// Fixed at construction of [`LgmLoss`](crate::LgmLoss) /
/// [`LgmLossIdentity`](crate::LgmLossIdentity); the learned Gaussian
/// parameters are shaped `[num_classes, feat_dim]`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LgmConfig {
    /// Number of classes (mixture components).
    pub num_classes: usize,

    /// Dimensionality of the feature embedding.
    pub feat_dim: usize,

    /// Margin strength: the true class's squared distance is scaled by
    /// `1 + alpha` when forming margin logits. Must be finite and `>= 0`.
    pub alpha: f32,

    /// Optional seed for deterministic center initialization
    /// (None => fixed default stream).
    pub init_seed: Option<u64>,
}

impl Default for LgmConfig {
    fn default() -> Self {
        Self {
            num_classes: 10,
            feat_dim: 2,
            alpha: 1.0,
            init_seed: None,
        }
    }
}

impl LgmConfig {
    /// Creates a configuration with the given dimensions and margin.
    ///
    /// # Example
    ///
    /// ```rust
    /// use lgm::LgmConfig;
    ///
    /// let config = LgmConfig::new(10, 128, 0.3);
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn new(num_classes: usize, feat_dim: usize, alpha: f32) -> Self {
        Self {
            num_classes,
            feat_dim,
            alpha,
            init_seed: None,
        }
    }

    /// Total number of entries in one `[num_classes, feat_dim]`
    /// parameter table.
    #[inline]
    pub fn table_len(&self) -> usize {
        self.num_classes * self.feat_dim
    }

    /// Parameter table shape, for error reporting.
    #[inline]
    pub fn table_shape(&self) -> [usize; 2] {
        [self.num_classes, self.feat_dim]
    }

    /// Validates the configuration and returns any errors.
    ///
    /// Should be called before constructing a loss module; the
    /// constructors do this themselves.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if:
    /// - `num_classes` or `feat_dim` is zero
    /// - `alpha` is negative, NaN, or infinite
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_classes == 0 {
            return Err(ConfigError::InvalidDimension("num_classes must be > 0"));
        }
        if self.feat_dim == 0 {
            return Err(ConfigError::InvalidDimension("feat_dim must be > 0"));
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(ConfigError::InvalidAlpha(self.alpha));
        }
        Ok(())
    }
}

/// Errors returned by [`LgmConfig::validate`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A dimension parameter is invalid (zero).
    #[error("Invalid dimension: {0}")]
    InvalidDimension(&'static str),

    /// Margin strength is negative or non-finite.
    #[error("Margin alpha must be finite and >= 0, got {0}")]
    InvalidAlpha(f32),
}
