//! Unified error types for the LGM crate.
//!
//! This module provides [`LgmError`], covering shape and label
//! validation, numeric-instability reporting at construction and
//! checkpoint boundaries, and checkpoint I/O. It uses the `thiserror`
//! crate for ergonomic error handling.
//!
//! # Example
//!
//! ```rust
//! use lgm::LgmError;
//!
//! fn validate_labels(labels: &[usize], num_classes: usize) -> Result<(), LgmError> {
//!     for (index, &label) in labels.iter().enumerate() {
//!         if label >= num_classes {
//!             return Err(LgmError::InvalidLabel {
//!                 label,
//!                 num_classes,
//!                 index,
//!             });
//!         }
//!     }
//!     Ok(())
//! }
//! ```

use thiserror::Error;

use crate::config::ConfigError;

/// Unified error type for LGM operations.
#[derive(Error, Debug)]
pub enum LgmError {
    /// Shape mismatch between expected and actual tensor shapes.
    ///
    /// Raised when a feature batch disagrees with the label batch or
    /// with the configured `feat_dim`, or when a gradient buffer has
    /// the wrong length.
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected tensor shape.
        expected: Vec<usize>,
        /// Actual tensor shape received.
        got: Vec<usize>,
    },

    /// A class label is outside `[0, num_classes)`.
    ///
    /// Labels are validated eagerly; an out-of-range label never
    /// reaches the indexing code.
    #[error("Invalid label {label} at batch index {index}: must be < {num_classes}")]
    InvalidLabel {
        /// The offending label value.
        label: usize,
        /// Number of classes configured.
        num_classes: usize,
        /// Position of the label within the batch.
        index: usize,
    },

    /// Non-finite values encountered in Gaussian parameters.
    ///
    /// Surfaced when a loss module is built from, or restored with,
    /// parameters containing NaN or infinity. The forward/backward
    /// passes themselves never recover from instability; callers
    /// needing stability clamp log-variance ranges externally.
    #[error("Numeric instability: non-finite values in {context}")]
    NumericInstability {
        /// Where the non-finite values were found.
        context: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// I/O error during checkpoint save/load operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error from the checkpoint codec.
    #[cfg(feature = "serde")]
    #[error("Serialization error: {0}")]
    Serde(#[from] bincode::Error),

    /// Checkpoint data is malformed (bad magic, truncated header).
    #[error("Invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    /// Incompatible checkpoint version.
    ///
    /// The serialized model was created with an incompatible version
    /// of the checkpoint format.
    #[error("Incompatible checkpoint version: expected {expected}, got {got}")]
    IncompatibleVersion {
        /// Expected version.
        expected: u32,
        /// Actual version found.
        got: u32,
    },
}

/// Result type alias for LGM operations.
pub type LgmResult<T> = Result<T, LgmError>;

impl LgmError {
    /// Creates a shape mismatch error.
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        LgmError::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Creates an invalid label error.
    pub fn invalid_label(label: usize, num_classes: usize, index: usize) -> Self {
        LgmError::InvalidLabel {
            label,
            num_classes,
            index,
        }
    }

    /// Creates a numeric instability error.
    pub fn numeric_instability<S: Into<String>>(context: S) -> Self {
        LgmError::NumericInstability {
            context: context.into(),
        }
    }

    /// Creates an invalid checkpoint error.
    pub fn invalid_checkpoint<S: Into<String>>(msg: S) -> Self {
        LgmError::InvalidCheckpoint(msg.into())
    }

    /// Creates an incompatible version error.
    pub fn incompatible_version(expected: u32, got: u32) -> Self {
        LgmError::IncompatibleVersion { expected, got }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_mismatch() {
        let err = LgmError::shape_mismatch(&[4, 2], &[3, 2]);
        let msg = err.to_string();
        assert!(msg.contains("Shape mismatch"));
        assert!(msg.contains("[4, 2]"));
        assert!(msg.contains("[3, 2]"));
    }

    #[test]
    fn test_invalid_label() {
        let err = LgmError::invalid_label(12, 10, 3);
        let msg = err.to_string();
        assert!(msg.contains("12"));
        assert!(msg.contains("10"));
        assert!(msg.contains("index 3"));
    }

    #[test]
    fn test_numeric_instability() {
        let err = LgmError::numeric_instability("log_covs");
        assert!(err.to_string().contains("log_covs"));
    }

    #[test]
    fn test_config_error() {
        let err = LgmError::from(ConfigError::InvalidDimension("feat_dim must be > 0"));
        assert!(err.to_string().contains("Configuration error"));
    }

    #[test]
    fn test_incompatible_version() {
        let err = LgmError::incompatible_version(1, 7);
        let msg = err.to_string();
        assert!(msg.contains("expected 1"));
        assert!(msg.contains("got 7"));
    }
}
