//! Financial-profile features and their normalization into [0, 1].

use serde::{Deserialize, Serialize};

/// Number of features in a risk profile.
pub const FEATURE_COUNT: usize = 6;

/// Feature names, in wire order.
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "experience",
    "income",
    "risk_appetite",
    "knowledge",
    "liquidity_need",
    "time_horizon",
];

/// Rejection of a raw feature vector before any cryptographic work.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FeatureError {
    #[error("Expected {expected} features, got {got}")]
    WrongArity { expected: usize, got: usize },

    #[error("Feature {position} ({name}) is not a finite number")]
    NonFinite { position: usize, name: &'static str },
}

/// Six raw risk-profile inputs.
///
/// Order: years of experience, annual income (thousands), risk appetite (1-10),
/// investment knowledge (1-10), liquidity need (1-10), investment horizon (years).
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    #[must_use]
    pub fn as_array(&self) -> &[f64; FEATURE_COUNT] {
        &self.0
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = FeatureError;

    fn try_from(values: &[f64]) -> Result<Self, Self::Error> {
        let array: [f64; FEATURE_COUNT] =
            values.try_into().map_err(|_| FeatureError::WrongArity {
                expected: FEATURE_COUNT,
                got: values.len(),
            })?;

        if let Some(i) = array.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NonFinite {
                position: i + 1,
                name: FEATURE_NAMES[i],
            });
        }

        Ok(Self(array))
    }
}

/// Clamp/normalize bounds for a single feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureRange {
    pub min: f64,
    pub max: f64,
}

impl FeatureRange {
    #[must_use]
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// A usable range has finite bounds with `min < max`.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.min.is_finite() && self.max.is_finite() && self.min < self.max
    }

    /// Clamp `raw` into the range, then rescale linearly onto [0, 1].
    #[must_use]
    pub fn normalize(&self, raw: f64) -> f64 {
        let clamped = raw.clamp(self.min, self.max);
        (clamped - self.min) / (self.max - self.min)
    }
}

/// Features rescaled onto [0, 1]; the plaintext the client encrypts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NormalizedVector([f64; FEATURE_COUNT]);

impl NormalizedVector {
    pub(crate) fn from_array(values: [f64; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    #[must_use]
    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }
}
