//! Scoring model and FHE scheme parameters.
//!
//! Both are plain immutable values handed to the components that need them.
//! Every score depends on these numbers, so any change must bump the
//! corresponding `version`.

use serde::{Deserialize, Serialize};

use super::features::{FeatureRange, FeatureVector, NormalizedVector, FEATURE_COUNT};

/// Signed per-feature risk coefficients.
///
/// Positive weights increase risk, negative weights decrease it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WeightVector(pub [f64; FEATURE_COUNT]);

impl WeightVector {
    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Sum of absolute weights: bounds `|raw_score|` for normalized inputs.
    #[must_use]
    pub fn magnitude(&self) -> f64 {
        self.0.iter().map(|w| w.abs()).sum()
    }

    /// Plain dot product, used as the reference value for self-checks.
    #[must_use]
    pub fn dot(&self, values: &[f64]) -> f64 {
        self.0.iter().zip(values).map(|(w, v)| w * v).sum()
    }
}

/// A risk model that cannot be used for scoring.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("Risk model v{version} is invalid: {}", .problems.join("; "))]
pub struct InvalidModel {
    pub version: u16,
    pub problems: Vec<String>,
}

/// The complete, versioned risk model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    pub version: u16,
    pub ranges: [FeatureRange; FEATURE_COUNT],
    pub weights: WeightVector,
    /// Steepness of the logistic score transform.
    pub sigmoid_gain: f64,
}

impl RiskModel {
    /// Version 1 of the financial-profile model.
    #[must_use]
    pub fn standard() -> Self {
        Self {
            version: 1,
            ranges: [
                FeatureRange::new(0.0, 40.0),  // experience, years
                FeatureRange::new(0.0, 500.0), // income, thousands
                FeatureRange::new(1.0, 10.0),  // risk appetite
                FeatureRange::new(1.0, 10.0),  // knowledge
                FeatureRange::new(1.0, 10.0),  // liquidity need
                FeatureRange::new(1.0, 50.0),  // horizon, years
            ],
            weights: WeightVector([
                -0.25, // more experience, lower risk
                -0.15, // more income, more buffer
                0.30,  // appetite for risk
                -0.20, // more knowledge, lower risk
                0.15,  // liquidity need reduces flexibility
                -0.15, // longer horizon, more time to recover
            ]),
            sigmoid_gain: 4.0,
        }
    }

    /// Check that every range is usable and the weights are finite.
    ///
    /// # Errors
    /// Returns a description of every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        for (i, range) in self.ranges.iter().enumerate() {
            if !range.is_valid() {
                errors.push(format!(
                    "Range {} [{}, {}] must be finite with min < max",
                    i + 1,
                    range.min,
                    range.max
                ));
            }
        }
        if self.weights.0.iter().any(|w| !w.is_finite()) {
            errors.push("Weights must be finite".to_string());
        }
        if !self.sigmoid_gain.is_finite() || self.sigmoid_gain <= 0.0 {
            errors.push(format!(
                "Sigmoid gain {} must be positive",
                self.sigmoid_gain
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Clamp each feature into its range and rescale onto [0, 1].
    #[must_use]
    pub fn normalize(&self, features: &FeatureVector) -> NormalizedVector {
        let raw = features.as_array();
        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = self.ranges[i].normalize(raw[i]);
        }
        NormalizedVector::from_array(out)
    }
}

impl Default for RiskModel {
    fn default() -> Self {
        Self::standard()
    }
}

/// Parameters of the FHE scheme, shared by server and clients.
///
/// Serialized into every key and ciphertext envelope so that material produced
/// under a different parameter set is rejected instead of misinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemeParameters {
    pub version: u16,
    /// Width of the encrypted signed integers.
    pub integer_bits: u32,
    /// Fixed-point scale of fresh ciphertexts, as a power of two.
    pub fixed_point_bits: u32,
    /// Ciphertext-ciphertext multiplications a fresh value may undergo.
    pub max_multiplicative_depth: u32,
}

impl SchemeParameters {
    /// Version 1: tfhe default integer parameters, `FheInt64`, scale 2^24.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            version: 1,
            integer_bits: 64,
            fixed_point_bits: 24,
            max_multiplicative_depth: 1,
        }
    }

    /// Fixed-point scale of fresh ciphertexts.
    #[must_use]
    pub fn global_scale(&self) -> f64 {
        2f64.powi(self.fixed_point_bits as i32)
    }
}

impl Default for SchemeParameters {
    fn default() -> Self {
        Self::standard()
    }
}
