//! Application layer: Use cases and services.
//!
//! This module orchestrates domain logic with ports to implement
//! the scoring use cases: plaintext-mode assessment, the encrypted
//! exchange, and the self-check.

mod assessment;
mod diagnostics;
mod engine;
mod exchange;

pub use assessment::AssessmentService;
pub use diagnostics::{SelfCheckReport, SELF_CHECK_TOLERANCE, SELF_CHECK_VECTOR};
pub use engine::{WeightedRiskEngine, WeightedScore};
