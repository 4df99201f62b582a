//! Tests for anomaly flagging and likelihood scoring against learned
//! class Gaussians.

use lgm::{
    is_anomalous, likelihood, predict_classes, FeatureExtractor, IdentityExtractor, LgmConfig,
    LgmError, LgmLoss, LgmLossIdentity, LgmResult,
};

/// Toy embedding network: scales its input by a constant.
struct ScalingExtractor {
    feat_dim: usize,
    scale: f32,
}

impl FeatureExtractor for ScalingExtractor {
    fn feat_dim(&self) -> usize {
        self.feat_dim
    }

    fn extract_batch(
        &self,
        input: &[f32],
        batch_size: usize,
        features: &mut [f32],
    ) -> LgmResult<()> {
        assert_eq!(input.len(), batch_size * self.feat_dim);
        for (out, x) in features.iter_mut().zip(input) {
            *out = x * self.scale;
        }
        Ok(())
    }
}

fn two_class_model(alpha: f32) -> LgmLoss {
    // Centers at (0,0) and (10,10), unit covariance.
    let config = LgmConfig::new(2, 2, alpha);
    LgmLoss::from_parts(config, vec![0.0, 0.0, 10.0, 10.0], vec![0.0; 4]).unwrap()
}

#[test]
fn test_constructed_two_class_example() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    // Near the class-0 center, claiming class 0: consistent.
    let flags = is_anomalous(&extractor, &model, &[0], &[0.1, 0.1]).unwrap();
    assert_eq!(flags, vec![false]);

    // On the class-1 center, still claiming class 0: anomalous.
    let flags = is_anomalous(&extractor, &model, &[0], &[10.0, 10.0]).unwrap();
    assert_eq!(flags, vec![true]);

    println!("✓ constructed 2-class example behaves per contract");
}

#[test]
fn test_is_anomalous_batch() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    let inputs = vec![
        0.2, -0.1, // close to class 0
        9.5, 10.5, // close to class 1
        9.5, 10.5, // close to class 1, but claims 0
    ];
    let flags = is_anomalous(&extractor, &model, &[0, 1, 0], &inputs).unwrap();
    assert_eq!(flags, vec![false, false, true]);
}

#[test]
fn test_anomaly_unaffected_by_margin() {
    // The unmargined logits drive the prediction, so alpha must not
    // change the verdict.
    let relaxed = two_class_model(0.0);
    let strict = two_class_model(2.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    let inputs = vec![1.0, 1.0, 8.0, 9.0];
    let claims = vec![0usize, 0];

    let a = is_anomalous(&extractor, &relaxed, &claims, &inputs).unwrap();
    let b = is_anomalous(&extractor, &strict, &claims, &inputs).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_likelihood_is_one_at_center() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    let scores = likelihood(&extractor, &model, &[0, 1], &[0.0, 0.0, 10.0, 10.0]).unwrap();
    assert!((scores[0] - 1.0).abs() < 1e-6);
    assert!((scores[1] - 1.0).abs() < 1e-6);
}

#[test]
fn test_likelihood_decreases_with_distance() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    // Walk away from the class-0 center along the x axis.
    let inputs = vec![0.0, 0.0, 0.5, 0.0, 1.0, 0.0, 2.0, 0.0];
    let scores = likelihood(&extractor, &model, &[0, 0, 0, 0], &inputs).unwrap();

    for pair in scores.windows(2) {
        assert!(
            pair[0] > pair[1],
            "likelihood not decreasing: {} -> {}",
            pair[0],
            pair[1]
        );
    }
}

#[test]
fn test_likelihood_ignores_learned_variance() {
    // The likelihood proxy is defined under identity covariance, so
    // learned log-variances must not leak into it.
    let config = LgmConfig::new(2, 2, 0.0);
    let centers = vec![0.0, 0.0, 10.0, 10.0];
    let plain = LgmLoss::from_parts(config.clone(), centers.clone(), vec![0.0; 4]).unwrap();
    let skewed = LgmLoss::from_parts(config, centers, vec![1.5, -0.7, 0.2, 0.9]).unwrap();
    let extractor = IdentityExtractor { feat_dim: 2 };

    let inputs = vec![0.7, -0.3];
    let a = likelihood(&extractor, &plain, &[0], &inputs).unwrap();
    let b = likelihood(&extractor, &skewed, &[0], &inputs).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_likelihood_underflows_to_zero_far_away() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    let scores = likelihood(&extractor, &model, &[0], &[400.0, 400.0]).unwrap();
    assert_eq!(scores[0], 0.0);
}

#[test]
fn test_custom_extractor() {
    // Inputs are double-scale; the extractor halves them back into
    // feature space.
    let model = two_class_model(0.0);
    let extractor = ScalingExtractor {
        feat_dim: 2,
        scale: 0.5,
    };

    let flags = is_anomalous(&extractor, &model, &[1], &[20.0, 20.0]).unwrap();
    assert_eq!(flags, vec![false]);

    let scores = likelihood(&extractor, &model, &[1], &[20.0, 20.0]).unwrap();
    assert!((scores[0] - 1.0).abs() < 1e-6);
}

#[test]
fn test_works_with_identity_variant() {
    let config = LgmConfig::new(2, 2, 0.0);
    let model = LgmLossIdentity::from_parts(config, vec![0.0, 0.0, 10.0, 10.0]).unwrap();
    let extractor = IdentityExtractor { feat_dim: 2 };

    let flags = is_anomalous(&extractor, &model, &[0, 1], &[0.1, 0.1, 0.1, 0.1]).unwrap();
    assert_eq!(flags, vec![false, true]);
}

#[test]
fn test_invalid_claim_rejected() {
    let model = two_class_model(0.0);
    let extractor = IdentityExtractor { feat_dim: 2 };

    let err = is_anomalous(&extractor, &model, &[5], &[0.0, 0.0]).unwrap_err();
    assert!(matches!(err, LgmError::InvalidLabel { label: 5, .. }));
}

#[test]
fn test_predict_classes_on_trained_logits() {
    let model = two_class_model(0.0);
    let mut logits = Vec::new();
    use lgm::GaussianMixture;
    model
        .logits_into(&[0.4, 0.2, 9.0, 11.0], &mut logits)
        .unwrap();
    assert_eq!(predict_classes(&logits, 2), vec![0, 1]);
}
