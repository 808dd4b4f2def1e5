//! Self-check: a known vector through the full homomorphic pipeline.

use serde::Serialize;

use super::assessment::AssessmentService;
use crate::application::engine::WeightedRiskEngine;
use crate::domain::{SchemeParameters, FEATURE_COUNT};
use crate::ports::{ContextMode, FheContext, FheEngine};
use crate::AssessmentError;

/// Absolute tolerance between the homomorphic and the direct result.
pub const SELF_CHECK_TOLERANCE: f64 = 1e-3;

/// Fixed test vector, encrypted as is without normalization.
pub const SELF_CHECK_VECTOR: [f64; FEATURE_COUNT] = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];

#[derive(Debug, Clone, Serialize)]
pub struct SelfCheckReport {
    pub status: &'static str,
    pub scheme: SchemeParameters,
    pub test_result: Option<f64>,
    pub expected: f64,
    pub difference: Option<f64>,
    pub test_passed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<E: FheEngine> AssessmentService<E> {
    /// Encrypt [`SELF_CHECK_VECTOR`], weigh it under a full context and
    /// compare against the plain dot product.
    ///
    /// Never fails: errors are reported in the returned report.
    pub fn self_check(&self) -> SelfCheckReport {
        let expected = self.model.weights.dot(&SELF_CHECK_VECTOR);
        let scheme = *self.engine.parameters();

        match self.run_self_check() {
            Ok(computed) => {
                let difference = (computed - expected).abs();
                let passed = difference <= SELF_CHECK_TOLERANCE;
                if passed {
                    tracing::info!("Self-check passed (difference {difference:.2e})");
                } else {
                    tracing::warn!(
                        "Self-check outside tolerance: computed {computed}, expected {expected}"
                    );
                }
                SelfCheckReport {
                    status: "ok",
                    scheme,
                    test_result: Some(computed),
                    expected,
                    difference: Some(difference),
                    test_passed: passed,
                    error: None,
                }
            }
            Err(e) => {
                tracing::error!("Self-check failed: {e}");
                SelfCheckReport {
                    status: "error",
                    scheme,
                    test_result: None,
                    expected,
                    difference: None,
                    test_passed: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    fn run_self_check(&self) -> Result<f64, AssessmentError> {
        let ctx = self.engine.create_context(ContextMode::Full)?;
        let features = ctx.encrypt(&SELF_CHECK_VECTOR)?;
        let weighted = WeightedRiskEngine::new(&self.model).weighted_score(&ctx, &features)?;
        Ok(weighted.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clear::ClearEngine;
    use crate::domain::RiskModel;
    use std::sync::Arc;

    #[test]
    fn test_self_check_passes() {
        let service =
            AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(RiskModel::standard()))
                .expect("standard model");
        let report = service.self_check();

        assert!(report.test_passed);
        assert_eq!(report.status, "ok");
        assert!((report.expected - -0.60).abs() < 1e-12);
        assert!(report.difference.expect("difference") <= SELF_CHECK_TOLERANCE);
        assert_eq!(report.scheme, SchemeParameters::standard());
        assert!(report.error.is_none());
    }

    #[test]
    fn test_report_serializes_without_error_field_on_success() {
        let service =
            AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(RiskModel::standard()))
                .expect("standard model");
        let json = serde_json::to_value(service.self_check()).expect("serialize");

        assert_eq!(json["test_passed"], true);
        assert_eq!(json["scheme"]["fixed_point_bits"], 24);
        assert!(json.get("error").is_none());
    }
}
