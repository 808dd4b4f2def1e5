//! Domain layer: Core business types and logic.
//!
//! Pure Rust types with no FHE library dependency: features and their
//! normalization, the versioned risk model, the score transform, key material
//! wrappers and the exchange wire types.

mod crypto;
mod exchange;
mod features;
mod model;
mod score;

pub use crypto::{
    compute_fingerprint, CryptoError, GaloisKeyBytes, KeyMaterial, PublicKeyBytes, RelinKeyBytes,
};
pub use exchange::{EncryptedAssessmentRequest, EncryptedAssessmentResponse};
pub use features::{
    FeatureError, FeatureRange, FeatureVector, NormalizedVector, FEATURE_COUNT, FEATURE_NAMES,
};
pub use model::{InvalidModel, RiskModel, SchemeParameters, WeightVector};
pub use score::{sigmoid, Contributions, RiskAssessment, RiskScore};
