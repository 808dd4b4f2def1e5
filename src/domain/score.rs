//! Score transform and assessment result types.

use serde::{Deserialize, Serialize};

use super::features::FEATURE_COUNT;

/// Logistic function.
#[must_use]
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

/// A raw weighted sum mapped onto a bounded risk score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    /// Bounded risk score in [0, 1]; higher means riskier.
    pub score: f64,
    /// Unbounded weighted sum the score was derived from.
    pub raw: f64,
}

impl RiskScore {
    /// Apply `sigmoid(gain * raw)` and clamp to [0, 1].
    #[must_use]
    pub fn from_raw(raw: f64, gain: f64) -> Self {
        let score = sigmoid(gain * raw).clamp(0.0, 1.0);
        Self { score, raw }
    }
}

/// Signed per-feature contributions to the raw score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Contributions {
    pub experience_contribution: f64,
    pub income_contribution: f64,
    pub risk_appetite_contribution: f64,
    pub knowledge_contribution: f64,
    pub liquidity_contribution: f64,
    pub time_horizon_contribution: f64,
}

impl From<[f64; FEATURE_COUNT]> for Contributions {
    fn from(c: [f64; FEATURE_COUNT]) -> Self {
        Self {
            experience_contribution: c[0],
            income_contribution: c[1],
            risk_appetite_contribution: c[2],
            knowledge_contribution: c[3],
            liquidity_contribution: c[4],
            time_horizon_contribution: c[5],
        }
    }
}

/// Result of a plaintext-mode assessment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskAssessment {
    pub risk_score: f64,
    pub raw_score: f64,
    pub components: Contributions,
}

impl RiskAssessment {
    #[must_use]
    pub fn new(score: RiskScore, contributions: [f64; FEATURE_COUNT]) -> Self {
        Self {
            risk_score: score.score,
            raw_score: score.raw,
            components: contributions.into(),
        }
    }
}
