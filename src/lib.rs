//! # cipherscore
//!
//! Privacy-preserving financial risk scoring using Fully Homomorphic Encryption.
//!
//! This crate provides:
//! - Feature normalization and a versioned, signed-weight risk model
//! - Homomorphic weighted aggregation over tfhe-rs ciphertexts
//! - A plaintext-input demo mode and a client-encrypted mode
//! - An HTTP service exposing both
//!
//! ## Architecture
//!
//! The crate follows Hexagonal Architecture:
//! - `domain`: Core types (features, risk model, scores, key material)
//! - `ports`: Trait definitions for the FHE library
//! - `adapters`: Concrete implementations (tfhe-rs, log sanitization)
//! - `application`: Use cases orchestrating domain and ports
//! - `http`: Axum transport

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod http;
pub mod ports;

pub use domain::{RiskAssessment, RiskModel, SchemeParameters};

use serde::Serialize;

/// Result type for assessment operations
pub type Result<T> = std::result::Result<T, AssessmentError>;

/// Main error type for assessments.
#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error(transparent)]
    Validation(#[from] domain::FeatureError),

    #[error("Field `{field}` is not valid base64: {source}")]
    Decode {
        field: &'static str,
        #[source]
        source: base64::DecodeError,
    },

    #[error(transparent)]
    Crypto(#[from] domain::CryptoError),
}

/// Flat classification of [`AssessmentError`], reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ValidationError,
    DecodeError,
    KeyMaterialError,
    DeserializationError,
    ContextSetupError,
    ComputationError,
    SerializationError,
}

impl ErrorKind {
    /// Wire name, identical to the serialized form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ValidationError => "validation_error",
            Self::DecodeError => "decode_error",
            Self::KeyMaterialError => "key_material_error",
            Self::DeserializationError => "deserialization_error",
            Self::ContextSetupError => "context_setup_error",
            Self::ComputationError => "computation_error",
            Self::SerializationError => "serialization_error",
        }
    }
}

impl AssessmentError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        use domain::CryptoError;

        match self {
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Decode { .. } => ErrorKind::DecodeError,
            Self::Crypto(CryptoError::KeyMaterial(_)) => ErrorKind::KeyMaterialError,
            Self::Crypto(CryptoError::Deserialization(_)) => ErrorKind::DeserializationError,
            Self::Crypto(CryptoError::ContextSetup(_)) => ErrorKind::ContextSetupError,
            Self::Crypto(CryptoError::Computation(_) | CryptoError::DepthExhausted { .. }) => {
                ErrorKind::ComputationError
            }
            Self::Crypto(CryptoError::Serialization(_)) => ErrorKind::SerializationError,
        }
    }

    /// Whether the failure was caused by the request rather than the server.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::ValidationError
                | ErrorKind::DecodeError
                | ErrorKind::KeyMaterialError
                | ErrorKind::DeserializationError
        )
    }
}
