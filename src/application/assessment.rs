//! Assessment service: Orchestrates plaintext-mode risk scoring.
//!
//! This service coordinates:
//! - Feature validation and normalization
//! - Per-request context creation
//! - Encryption of the normalized features
//! - Weighted aggregation and reveal
//! - The score transform

use std::sync::Arc;

use crate::application::engine::WeightedRiskEngine;
use crate::domain::{FeatureVector, InvalidModel, RiskAssessment, RiskModel, RiskScore};
use crate::ports::{ContextMode, FheContext, FheEngine};
use crate::AssessmentError;

/// Service for running risk assessments.
///
/// # Key Lifetime
///
/// The service holds no key material. Every call creates its own context,
/// which owns all keys and ciphertexts and is dropped before the call returns,
/// on success and error paths alike.
pub struct AssessmentService<E: FheEngine> {
    pub(super) engine: Arc<E>,
    pub(super) model: Arc<RiskModel>,
}

impl<E: FheEngine> Clone for AssessmentService<E> {
    fn clone(&self) -> Self {
        Self {
            engine: Arc::clone(&self.engine),
            model: Arc::clone(&self.model),
        }
    }
}

impl<E: FheEngine> AssessmentService<E> {
    /// Create a new assessment service.
    ///
    /// # Errors
    /// Returns `InvalidModel` if any range, weight or the sigmoid gain is
    /// unusable.
    pub fn new(engine: Arc<E>, model: Arc<RiskModel>) -> Result<Self, InvalidModel> {
        model.validate().map_err(|problems| InvalidModel {
            version: model.version,
            problems,
        })?;
        Ok(Self { engine, model })
    }

    #[must_use]
    pub fn model(&self) -> &RiskModel {
        &self.model
    }

    #[must_use]
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Score raw features through a full local context.
    ///
    /// Performs the full pipeline:
    /// 1. Validate arity and finiteness (before any key material exists)
    /// 2. Normalize
    /// 3. Create a full context and encrypt
    /// 4. Weighted multiply and reveal
    /// 5. Score transform
    ///
    /// # Errors
    /// Returns a validation error for bad input and a crypto error if any FHE
    /// stage fails.
    pub fn assess(&self, features: &[f64]) -> Result<RiskAssessment, AssessmentError> {
        let features = FeatureVector::try_from(features)?;

        tracing::info!("Starting plaintext-mode assessment...");

        // Step 1: Normalize
        let normalized = self.model.normalize(&features);

        // Step 2: Fresh context
        tracing::debug!("Step 2: Creating full encryption context...");
        let ctx = self.engine.create_context(ContextMode::Full)?;

        // Step 3: Encrypt
        tracing::debug!("Step 3: Encrypting normalized features...");
        let encrypted = ctx.encrypt(normalized.as_slice())?;

        // Step 4: Homomorphic weighting
        tracing::debug!("Step 4: Running homomorphic computation...");
        let weighted = WeightedRiskEngine::new(&self.model).weighted_score(&ctx, &encrypted)?;

        // Step 5: Score transform
        let score = RiskScore::from_raw(weighted.raw, self.model.sigmoid_gain);

        tracing::info!(
            "Assessment complete: risk_score={:.4}, model_version={}",
            score.score,
            self.model.version
        );

        Ok(RiskAssessment::new(score, weighted.contributions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clear::ClearEngine;
    use crate::domain::{FeatureError, FeatureRange};
    use crate::ErrorKind;

    fn create_test_service() -> AssessmentService<ClearEngine> {
        AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(RiskModel::standard()))
            .expect("standard model")
    }

    #[test]
    fn test_mid_profile_scenario() {
        let service = create_test_service();
        let a = service
            .assess(&[20.0, 100.0, 5.0, 5.0, 5.0, 20.0])
            .expect("assessment");

        assert!((a.raw_score - -0.102_052_154).abs() < 1e-6, "{}", a.raw_score);
        assert!((a.risk_score - 0.399_341_739).abs() < 1e-6, "{}", a.risk_score);
        assert!((a.components.experience_contribution - -0.125).abs() < 1e-12);
        assert!((a.components.income_contribution - -0.03).abs() < 1e-12);
    }

    #[test]
    fn test_minimum_profile_scores_exactly_half() {
        let service = create_test_service();
        let a = service
            .assess(&[0.0, 0.0, 1.0, 1.0, 1.0, 1.0])
            .expect("assessment");
        assert_eq!(a.raw_score, 0.0);
        assert_eq!(a.risk_score, 0.5);
    }

    #[test]
    fn test_validation_happens_before_any_context() {
        let service = create_test_service();

        let err = service.assess(&[1.0, 2.0, 3.0]).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(matches!(
            err,
            AssessmentError::Validation(FeatureError::WrongArity { expected: 6, got: 3 })
        ));

        let err = service
            .assess(&[1.0, 2.0, 3.0, f64::NAN, 5.0, 6.0])
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::ValidationError);

        assert_eq!(service.engine().contexts_created(), 0);
    }

    #[test]
    fn test_every_request_gets_a_fresh_context() {
        let service = create_test_service();
        for _ in 0..3 {
            service
                .assess(&[10.0, 50.0, 3.0, 3.0, 3.0, 10.0])
                .expect("assessment");
        }
        assert_eq!(service.engine().contexts_created(), 3);
    }

    #[test]
    fn test_score_is_bounded_for_extreme_inputs() {
        let service = create_test_service();
        let extremes = [
            [1000.0, 1e9, 1e9, -1e9, 1e9, -1e9],
            [-1e9, -1e9, -1e9, 1e9, -1e9, 1e9],
            [f64::MAX, f64::MIN, f64::MAX, f64::MIN, f64::MAX, f64::MIN],
        ];
        for features in extremes {
            let a = service.assess(&features).expect("assessment");
            assert!((0.0..=1.0).contains(&a.risk_score));
            assert!(a.raw_score.abs() <= 1.2 + 1e-12);
        }

        let worst = service
            .assess(&[0.0, 0.0, 10.0, 1.0, 10.0, 1.0])
            .expect("assessment");
        assert!((worst.raw_score - 0.45).abs() < 1e-12);
    }

    #[test]
    fn test_monotonic_in_each_feature() {
        let service = create_test_service();
        let model = RiskModel::standard();
        let base = [20.0, 100.0, 5.0, 5.0, 5.0, 20.0];

        for i in 0..6 {
            let range = model.ranges[i];
            let step = (range.max - range.min) / 10.0;
            let mut previous: Option<f64> = None;
            let mut raw = range.min - step;
            while raw <= range.max + step {
                let mut features = base;
                features[i] = raw;
                let score = service.assess(&features).expect("assessment").raw_score;
                if let Some(prev) = previous {
                    if model.weights.0[i] > 0.0 {
                        assert!(score >= prev - 1e-12, "feature {i} decreased risk");
                    } else {
                        assert!(score <= prev + 1e-12, "feature {i} increased risk");
                    }
                }
                previous = Some(score);
                raw += step;
            }
        }
    }

    #[test]
    fn test_alternate_model_is_honoured() {
        let mut model = RiskModel::standard();
        model.sigmoid_gain = 1.0;
        let service = AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(model))
            .expect("valid model");
        let a = service
            .assess(&[20.0, 100.0, 5.0, 5.0, 5.0, 20.0])
            .expect("assessment");
        assert!((a.risk_score - crate::domain::sigmoid(a.raw_score)).abs() < 1e-12);
    }

    #[test]
    fn test_unusable_model_is_rejected_at_construction() {
        let mut model = RiskModel::standard();
        model.ranges[0] = FeatureRange::new(40.0, 0.0);
        model.sigmoid_gain = f64::NAN;

        let err = AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(model))
            .err()
            .expect("must reject");
        assert_eq!(err.version, 1);
        assert_eq!(err.problems.len(), 2);
        assert!(err.to_string().contains("Range 1"), "{err}");
    }
}
