//! Plaintext stand-in for the FHE engine, for protocol tests.
//!
//! Mirrors the tfhe adapter's rules (keyset binding, depth limit, no secret key
//! in public-only contexts) with exact `f64` arithmetic and JSON payloads.

use std::sync::atomic::{AtomicUsize, Ordering};

use serde::{Deserialize, Serialize};

use crate::domain::{CryptoError, SchemeParameters};
use crate::ports::{ContextMode, FheContext, FheEngine};

/// Public key bytes that the clear engine refuses to load.
pub(crate) const REJECTED_PUBLIC_KEY: &[u8] = b"not-a-key";

#[derive(Debug, Default)]
pub(crate) struct ClearEngine {
    params: SchemeParameters,
    contexts_created: AtomicUsize,
}

impl ClearEngine {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn contexts_created(&self) -> usize {
        self.contexts_created.load(Ordering::SeqCst)
    }

    /// Serialize `values` the way a client would under `keyset`.
    pub(crate) fn seal(keyset: &str, values: &[f64]) -> Vec<u8> {
        let payload = ClearPayload {
            keyset: keyset.to_string(),
            depth: 0,
            slots: values.to_vec(),
        };
        serde_json::to_vec(&payload).expect("serialize clear payload")
    }

    /// Read back a payload produced by `serialize_vector`.
    pub(crate) fn open(bytes: &[u8]) -> Vec<f64> {
        let payload: ClearPayload = serde_json::from_slice(bytes).expect("clear payload");
        payload.slots
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct ClearPayload {
    keyset: String,
    depth: u32,
    slots: Vec<f64>,
}

#[derive(Debug, Clone)]
pub(crate) struct ClearVector {
    slots: Vec<f64>,
    depth: u32,
}

#[derive(Debug)]
pub(crate) struct ClearContext {
    params: SchemeParameters,
    keyset: String,
    secret: bool,
}

impl FheEngine for ClearEngine {
    type Context = ClearContext;

    fn parameters(&self) -> &SchemeParameters {
        &self.params
    }

    fn create_context(&self, mode: ContextMode<'_>) -> Result<ClearContext, CryptoError> {
        self.contexts_created.fetch_add(1, Ordering::SeqCst);
        match mode {
            ContextMode::Full => Ok(ClearContext {
                params: self.params,
                keyset: "clear-full".into(),
                secret: true,
            }),
            ContextMode::PublicOnly(material) => {
                let pk = material.public_key.as_bytes();
                if pk.is_empty() || pk == REJECTED_PUBLIC_KEY {
                    return Err(CryptoError::KeyMaterial("unreadable public key".into()));
                }
                if material.relin_keys.is_none() {
                    return Err(CryptoError::KeyMaterial(
                        "evaluation keys are required for ciphertext multiplication".into(),
                    ));
                }
                Ok(ClearContext {
                    params: self.params,
                    keyset: material.public_key.fingerprint.clone(),
                    secret: false,
                })
            }
        }
    }
}

impl FheContext for ClearContext {
    type Vector = ClearVector;

    fn can_decrypt(&self) -> bool {
        self.secret
    }

    fn keyset_fingerprint(&self) -> &str {
        &self.keyset
    }

    fn encrypt(&self, values: &[f64]) -> Result<ClearVector, CryptoError> {
        Ok(ClearVector {
            slots: values.to_vec(),
            depth: 0,
        })
    }

    fn load_vector(&self, bytes: &[u8]) -> Result<ClearVector, CryptoError> {
        let payload: ClearPayload = serde_json::from_slice(bytes)
            .map_err(|e| CryptoError::Deserialization(e.to_string()))?;
        if payload.keyset != self.keyset {
            return Err(CryptoError::Deserialization(
                "ciphertext was produced under a different keyset".into(),
            ));
        }
        if payload.depth != 0 {
            return Err(CryptoError::Deserialization(
                "expected a fresh ciphertext".into(),
            ));
        }
        Ok(ClearVector {
            slots: payload.slots,
            depth: 0,
        })
    }

    fn slot_count(&self, vector: &ClearVector) -> usize {
        vector.slots.len()
    }

    fn multiply(&self, lhs: &ClearVector, rhs: &ClearVector) -> Result<ClearVector, CryptoError> {
        let depth = lhs.depth.max(rhs.depth) + 1;
        if depth > self.params.max_multiplicative_depth {
            return Err(CryptoError::DepthExhausted {
                max: self.params.max_multiplicative_depth,
            });
        }
        if lhs.slots.len() != rhs.slots.len() {
            return Err(CryptoError::Computation("slot count mismatch".into()));
        }
        Ok(ClearVector {
            slots: lhs.slots.iter().zip(&rhs.slots).map(|(a, b)| a * b).collect(),
            depth,
        })
    }

    fn sum_slots(&self, vector: &ClearVector) -> Result<ClearVector, CryptoError> {
        Ok(ClearVector {
            slots: vec![vector.slots.iter().sum()],
            depth: vector.depth,
        })
    }

    fn decrypt(&self, vector: &ClearVector) -> Result<Vec<f64>, CryptoError> {
        if !self.secret {
            return Err(CryptoError::Computation(
                "public-only context holds no secret key".into(),
            ));
        }
        Ok(vector.slots.clone())
    }

    fn serialize_vector(&self, vector: &ClearVector) -> Result<Vec<u8>, CryptoError> {
        let payload = ClearPayload {
            keyset: self.keyset.clone(),
            depth: vector.depth,
            slots: vector.slots.clone(),
        };
        serde_json::to_vec(&payload).map_err(|e| CryptoError::Serialization(e.to_string()))
    }
}
