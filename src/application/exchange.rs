//! Encrypted exchange: scoring ciphertexts produced by the client.
//!
//! The server only ever holds a public-only context here. The weighted
//! contributions are reduced homomorphically and the encrypted sum goes back
//! to the client; nothing is decrypted server-side.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use zeroize::Zeroizing;

use super::assessment::AssessmentService;
use crate::application::engine::WeightedRiskEngine;
use crate::domain::{
    CryptoError, EncryptedAssessmentRequest, EncryptedAssessmentResponse, KeyMaterial,
    FEATURE_COUNT,
};
use crate::ports::{ContextMode, FheContext, FheEngine};
use crate::AssessmentError;

fn decode_field(field: &'static str, value: &str) -> Result<Zeroizing<Vec<u8>>, AssessmentError> {
    BASE64
        .decode(value.trim())
        .map(Zeroizing::new)
        .map_err(|source| AssessmentError::Decode { field, source })
}

fn decode_optional(
    field: &'static str,
    value: &str,
) -> Result<Option<Zeroizing<Vec<u8>>>, AssessmentError> {
    if value.trim().is_empty() {
        return Ok(None);
    }
    decode_field(field, value).map(Some)
}

impl<E: FheEngine> AssessmentService<E> {
    /// Score a client-encrypted, already normalized feature vector.
    ///
    /// # Errors
    /// - `Decode` for malformed base64 in any field
    /// - `KeyMaterial` for missing, malformed or inconsistent keys
    /// - `Deserialization` for a ciphertext that does not belong to the keys
    /// - `Computation` / `Serialization` for failures while computing
    pub fn assess_encrypted(
        &self,
        request: &EncryptedAssessmentRequest,
    ) -> Result<EncryptedAssessmentResponse, AssessmentError> {
        tracing::info!(
            "Starting encrypted assessment (cipher: {} chars, public key: {} chars)",
            request.cipher.len(),
            request.public_key.len()
        );

        // Step 1: Decode everything before touching the FHE library
        let cipher = decode_field("cipher", &request.cipher)?;
        let public_key = decode_field("public_key", &request.public_key)?;
        let relin_keys = decode_optional("relin_keys", &request.relin_keys)?;
        let galois_keys = decode_optional("galois_keys", &request.galois_keys)?;

        if public_key.is_empty() {
            return Err(CryptoError::KeyMaterial("public key is required".into()).into());
        }
        if cipher.is_empty() {
            return Err(CryptoError::Deserialization("ciphertext is empty".into()).into());
        }

        let material = KeyMaterial::new(
            public_key.to_vec(),
            relin_keys.as_ref().map(|k| k.to_vec()),
            galois_keys.as_ref().map(|k| k.to_vec()),
        );

        // Step 2: Public-only context
        tracing::debug!(
            "Step 2: Loading public key {}...",
            material.public_key.fingerprint
        );
        let ctx = self
            .engine
            .create_context(ContextMode::PublicOnly(&material))?;

        // Step 3: Load the encrypted features
        tracing::debug!("Step 3: Loading encrypted vector...");
        let features = ctx.load_vector(&cipher)?;
        let slots = ctx.slot_count(&features);
        if slots != FEATURE_COUNT {
            return Err(CryptoError::Deserialization(format!(
                "Expected {FEATURE_COUNT} encrypted features, got {slots}"
            ))
            .into());
        }

        // Step 4: Weighted multiply and homomorphic reduction
        tracing::debug!("Step 4: Running homomorphic computation...");
        let total = WeightedRiskEngine::new(&self.model).encrypted_total(&ctx, &features)?;

        // Step 5: Serialize the encrypted raw score
        let bytes = ctx.serialize_vector(&total)?;

        tracing::info!(
            "Encrypted assessment complete (keyset {}, result {} bytes)",
            ctx.keyset_fingerprint(),
            bytes.len()
        );

        Ok(EncryptedAssessmentResponse {
            encrypted_score: BASE64.encode(bytes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::clear::{ClearEngine, REJECTED_PUBLIC_KEY};
    use crate::domain::{compute_fingerprint, FeatureVector, RiskModel};
    use crate::ErrorKind;
    use std::sync::Arc;

    const PUBLIC_KEY: &[u8] = b"client-public-key";

    fn create_test_service() -> AssessmentService<ClearEngine> {
        AssessmentService::new(Arc::new(ClearEngine::new()), Arc::new(RiskModel::standard()))
            .expect("standard model")
    }

    fn request_for(values: &[f64]) -> EncryptedAssessmentRequest {
        let keyset = compute_fingerprint(PUBLIC_KEY);
        EncryptedAssessmentRequest {
            cipher: BASE64.encode(ClearEngine::seal(&keyset, values)),
            public_key: BASE64.encode(PUBLIC_KEY),
            relin_keys: BASE64.encode(b"evaluation-keys"),
            galois_keys: String::new(),
        }
    }

    #[test]
    fn test_round_trip_matches_dot_product() {
        let service = create_test_service();
        let model = RiskModel::standard();
        let features =
            FeatureVector::try_from([20.0, 100.0, 5.0, 5.0, 5.0, 20.0].as_slice()).expect("valid");
        let normalized = model.normalize(&features);

        let response = service
            .assess_encrypted(&request_for(normalized.as_slice()))
            .expect("assessment");
        let bytes = BASE64.decode(&response.encrypted_score).expect("base64");
        let slots = ClearEngine::open(&bytes);

        assert_eq!(slots.len(), 1);
        let expected = model.weights.dot(normalized.as_slice());
        assert!((slots[0] - expected).abs() < 1e-3);
    }

    #[test]
    fn test_malformed_cipher_is_decode_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.cipher = "this is not base64!!".into();

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::DecodeError);
        assert!(err.to_string().contains("cipher"));
        assert_eq!(service.engine().contexts_created(), 0);
    }

    #[test]
    fn test_malformed_optional_key_is_decode_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.galois_keys = "%%%".into();

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert!(matches!(
            err,
            AssessmentError::Decode {
                field: "galois_keys",
                ..
            }
        ));
    }

    #[test]
    fn test_bad_public_key_is_key_material_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.public_key = BASE64.encode(REJECTED_PUBLIC_KEY);

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::KeyMaterialError);

        request.public_key = String::new();
        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::KeyMaterialError);
    }

    #[test]
    fn test_missing_evaluation_keys_is_key_material_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.relin_keys = String::new();

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::KeyMaterialError);
    }

    #[test]
    fn test_foreign_ciphertext_is_deserialization_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.cipher = BASE64.encode(ClearEngine::seal("someone-else", &[0.5; 6]));

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn test_garbage_ciphertext_is_deserialization_error() {
        let service = create_test_service();
        let mut request = request_for(&[0.5; 6]);
        request.cipher = BASE64.encode(b"\x00\x01garbage");

        let err = service.assess_encrypted(&request).expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }

    #[test]
    fn test_public_only_context_cannot_decrypt() {
        let engine = ClearEngine::new();
        let material = KeyMaterial::new(PUBLIC_KEY.to_vec(), Some(b"eval".to_vec()), None);
        let ctx = engine
            .create_context(ContextMode::PublicOnly(&material))
            .expect("context");
        assert!(!ctx.can_decrypt());

        let features = ctx
            .load_vector(&ClearEngine::seal(&compute_fingerprint(PUBLIC_KEY), &[0.5; 6]))
            .expect("load");
        let err = ctx.decrypt(&features).expect_err("must fail");
        assert!(matches!(err, CryptoError::Computation(_)));
    }

    #[test]
    fn test_wrong_slot_count_is_deserialization_error() {
        let service = create_test_service();
        let err = service
            .assess_encrypted(&request_for(&[0.5; 4]))
            .expect_err("must fail");
        assert_eq!(err.kind(), ErrorKind::DeserializationError);
    }
}
