//! Binary envelopes for keys and ciphertexts.
//!
//! Every payload crossing the wire is wrapped with the scheme parameters it was
//! produced under and the fingerprint of the client's public key, so material
//! from another parameter set or another client is rejected on load.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tfhe::FheInt64;

use crate::domain::{compute_fingerprint, CryptoError, SchemeParameters};

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Envelope<T> {
    pub scheme: SchemeParameters,
    pub keyset: String,
    pub payload: T,
}

impl<T: Serialize> Envelope<T> {
    pub(crate) fn to_bytes(&self) -> Result<Vec<u8>, CryptoError> {
        bincode::serialize(self)
            .map_err(|e| CryptoError::Serialization(format!("Failed to encode envelope: {e}")))
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Decode an envelope and check its scheme. `what` names the payload in
    /// error messages; `on_error` picks the error variant for the caller's stage.
    pub(crate) fn from_bytes(
        bytes: &[u8],
        expected: &SchemeParameters,
        what: &str,
        on_error: fn(String) -> CryptoError,
    ) -> Result<Self, CryptoError> {
        let envelope: Self = bincode::deserialize(bytes)
            .map_err(|e| on_error(format!("Malformed {what}: {e}")))?;
        if envelope.scheme != *expected {
            return Err(on_error(format!(
                "{what} uses scheme version {} (fixed-point 2^{}), expected version {} (fixed-point 2^{})",
                envelope.scheme.version,
                envelope.scheme.fixed_point_bits,
                expected.version,
                expected.fixed_point_bits
            )));
        }
        Ok(envelope)
    }
}

/// A vector of fixed-point encrypted slots.
///
/// `scale_bits` is the power of two each plaintext was multiplied by;
/// `depth` counts the ciphertext multiplications already applied.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct EncryptedSlots {
    pub scale_bits: u32,
    pub depth: u32,
    pub slots: Vec<FheInt64>,
}

/// Fingerprint of a key, computed over its canonical bincode encoding.
pub(crate) fn key_fingerprint<K: Serialize>(key: &K) -> Result<String, CryptoError> {
    let bytes = bincode::serialize(key)
        .map_err(|e| CryptoError::Serialization(format!("Failed to encode key: {e}")))?;
    Ok(compute_fingerprint(&bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_rejects_other_scheme() {
        let mut other = SchemeParameters::standard();
        other.version = 2;
        let bytes = Envelope {
            scheme: other,
            keyset: "abc".to_string(),
            payload: 7u32,
        }
        .to_bytes()
        .expect("encode");

        let err = Envelope::<u32>::from_bytes(
            &bytes,
            &SchemeParameters::standard(),
            "test payload",
            CryptoError::KeyMaterial,
        )
        .expect_err("must fail");
        assert!(matches!(err, CryptoError::KeyMaterial(msg) if msg.contains("version 2")));
    }

    #[test]
    fn test_envelope_rejects_garbage() {
        let err = Envelope::<String>::from_bytes(
            &[0xff; 3],
            &SchemeParameters::standard(),
            "ciphertext",
            CryptoError::Deserialization,
        )
        .expect_err("must fail");
        assert!(matches!(err, CryptoError::Deserialization(_)));
    }

    #[test]
    fn test_envelope_keeps_keyset() {
        let params = SchemeParameters::standard();
        let bytes = Envelope {
            scheme: params,
            keyset: "0011223344556677".to_string(),
            payload: vec![1u8, 2, 3],
        }
        .to_bytes()
        .expect("encode");

        let envelope =
            Envelope::<Vec<u8>>::from_bytes(&bytes, &params, "payload", CryptoError::KeyMaterial)
                .expect("decode");
        assert_eq!(envelope.keyset, "0011223344556677");
        assert_eq!(envelope.payload, vec![1, 2, 3]);
    }
}
