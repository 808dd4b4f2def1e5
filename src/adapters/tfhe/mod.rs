//! TFHE adapter: Implementation of FheEngine using tfhe-rs.
//!
//! This module provides FHE operations using Zama's tfhe-rs library.
//!
//! # Thread Safety
//!
//! **IMPORTANT**: `tfhe::set_server_key()` writes to a *thread-local* (TLS) global.
//!
//! Each homomorphic operation installs the context's server key on the current
//! thread and removes it again through an RAII guard, on success, error and
//! panic alike. Work for one request therefore never runs under another
//! request's key, as long as each operation runs to completion on one thread
//! (the HTTP layer runs contexts on the blocking pool).
//!
//! # FHE Implementation
//!
//! Uses tfhe-rs with:
//! - `FheInt64` for encrypted signed integer arithmetic, one ciphertext per slot
//! - Fixed-point encoding: `q = round(x * 2^fixed_point_bits)`; a product of
//!   two fresh values carries twice the scale
//! - A compressed server key from the client as evaluation key (can't decrypt)
//! - Client key for encryption/decryption (never leaves the client in
//!   encrypted mode)
//!
//! Values entering the scheme must satisfy `|x| <= MAX_ENCODABLE_MAGNITUDE` so
//! that a depth-1 product of six slots stays inside `i64`.

mod client;
mod wire;

use std::panic::{self, AssertUnwindSafe};

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use tfhe::conformance::ParameterSetConformant;
use tfhe::prelude::*;
use tfhe::{
    generate_keys, set_server_key, unset_server_key, ClientKey, CompressedPublicKey,
    CompressedServerKey, ConfigBuilder, FheInt64, FheInt64ConformanceParams, ServerKey,
};

use crate::domain::{CryptoError, KeyMaterial, SchemeParameters};
use crate::ports::{ContextMode, FheContext, FheEngine};

pub use client::TfheClient;
use wire::{key_fingerprint, EncryptedSlots, Envelope};

/// Largest absolute plaintext value accepted for encryption.
pub const MAX_ENCODABLE_MAGNITUDE: f64 = 32.0;

/// Removes the thread-local server key when dropped.
struct ServerKeyGuard;

impl Drop for ServerKeyGuard {
    fn drop(&mut self) {
        unset_server_key();
    }
}

/// Run `f` with `server_key` installed on this thread.
///
/// Panics raised by tfhe-rs (mismatched keys, corrupt ciphertexts) are caught
/// and reported through `on_panic`.
fn with_server_key<T>(
    server_key: &ServerKey,
    on_panic: impl FnOnce() -> CryptoError,
    f: impl FnOnce() -> T,
) -> Result<T, CryptoError> {
    set_server_key(server_key.clone());
    let _server_key_guard = ServerKeyGuard;
    panic::catch_unwind(AssertUnwindSafe(f)).map_err(|_| on_panic())
}

fn encode(params: &SchemeParameters, value: f64) -> Result<i64, CryptoError> {
    if !value.is_finite() || value.abs() > MAX_ENCODABLE_MAGNITUDE {
        return Err(CryptoError::Computation(format!(
            "Value {value} is outside the encodable range ±{MAX_ENCODABLE_MAGNITUDE}"
        )));
    }
    Ok((value * params.global_scale()).round() as i64)
}

fn decode(value: i64, scale_bits: u32) -> f64 {
    value as f64 / 2f64.powi(scale_bits as i32)
}

fn tfhe_config() -> tfhe::Config {
    // Default parameters are secure for most applications.
    ConfigBuilder::default().build()
}

/// Engine backed by tfhe-rs.
#[derive(Debug, Clone, Default)]
pub struct TfheEngine {
    params: SchemeParameters,
}

impl TfheEngine {
    #[must_use]
    pub fn new(params: SchemeParameters) -> Self {
        Self { params }
    }

    fn full_context(&self) -> Result<TfheContext, CryptoError> {
        tracing::debug!("Generating local tfhe-rs keyset...");

        let (client_key, server_key) =
            panic::catch_unwind(|| generate_keys(tfhe_config())).map_err(|_| {
                CryptoError::ContextSetup("tfhe-rs key generation aborted".into())
            })?;

        let mut session = [0u8; 8];
        ChaCha20Rng::from_entropy().fill_bytes(&mut session);
        let keyset = format!(
            "ctx-{}",
            session.iter().map(|b| format!("{b:02x}")).collect::<String>()
        );

        Ok(TfheContext {
            params: self.params,
            keyset,
            client_key: Some(client_key),
            server_key,
        })
    }

    fn public_context(&self, material: &KeyMaterial) -> Result<TfheContext, CryptoError> {
        let public: Envelope<CompressedPublicKey> = Envelope::from_bytes(
            material.public_key.as_bytes(),
            &self.params,
            "public key",
            CryptoError::KeyMaterial,
        )?;

        let actual = key_fingerprint(&public.payload)?;
        if actual != public.keyset {
            return Err(CryptoError::KeyMaterial(format!(
                "public key fingerprint {actual} does not match declared keyset {}",
                public.keyset
            )));
        }

        let relin = material.relin_keys.as_ref().ok_or_else(|| {
            CryptoError::KeyMaterial(
                "evaluation keys are required for ciphertext multiplication".into(),
            )
        })?;
        let evaluation: Envelope<CompressedServerKey> = Envelope::from_bytes(
            relin.as_bytes(),
            &self.params,
            "evaluation keys",
            CryptoError::KeyMaterial,
        )?;
        if evaluation.keyset != public.keyset {
            return Err(CryptoError::KeyMaterial(
                "evaluation keys belong to a different keyset than the public key".into(),
            ));
        }

        if let Some(galois) = &material.galois_keys {
            // Slots are separate ciphertexts; no rotations are ever needed.
            tracing::debug!(
                "Ignoring rotation keys {} ({} bytes)",
                galois.fingerprint,
                galois.as_bytes().len()
            );
        }

        let compressed = evaluation.payload;
        let server_key = panic::catch_unwind(AssertUnwindSafe(|| compressed.decompress()))
            .map_err(|_| CryptoError::KeyMaterial("evaluation keys could not be expanded".into()))?;

        tracing::debug!("Loaded public keyset {}", public.keyset);

        Ok(TfheContext {
            params: self.params,
            keyset: public.keyset,
            client_key: None,
            server_key,
        })
    }
}

impl FheEngine for TfheEngine {
    type Context = TfheContext;

    fn parameters(&self) -> &SchemeParameters {
        &self.params
    }

    fn create_context(&self, mode: ContextMode<'_>) -> Result<TfheContext, CryptoError> {
        match mode {
            ContextMode::Full => self.full_context(),
            ContextMode::PublicOnly(material) => self.public_context(material),
        }
    }
}

/// A fixed-point encrypted vector, one `FheInt64` per slot.
#[derive(Clone)]
pub struct TfheVector {
    slots: Vec<FheInt64>,
    scale_bits: u32,
    depth: u32,
}

impl std::fmt::Debug for TfheVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheVector")
            .field("slots", &self.slots.len())
            .field("scale_bits", &self.scale_bits)
            .field("depth", &self.depth)
            .finish()
    }
}

/// Per-request tfhe-rs context.
///
/// Holds a client key only when created in full mode.
pub struct TfheContext {
    params: SchemeParameters,
    keyset: String,
    client_key: Option<ClientKey>,
    server_key: ServerKey,
}

impl std::fmt::Debug for TfheContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheContext")
            .field("keyset", &self.keyset)
            .field("can_decrypt", &self.client_key.is_some())
            .finish()
    }
}

impl TfheContext {
    fn computation_aborted(op: &str) -> impl FnOnce() -> CryptoError + '_ {
        move || CryptoError::Computation(format!("{op} aborted inside tfhe-rs"))
    }
}

impl FheContext for TfheContext {
    type Vector = TfheVector;

    fn can_decrypt(&self) -> bool {
        self.client_key.is_some()
    }

    fn keyset_fingerprint(&self) -> &str {
        &self.keyset
    }

    fn encrypt(&self, values: &[f64]) -> Result<TfheVector, CryptoError> {
        let quantized = values
            .iter()
            .map(|&v| encode(&self.params, v))
            .collect::<Result<Vec<_>, _>>()?;

        let slots: Vec<FheInt64> = match &self.client_key {
            Some(client_key) => quantized
                .iter()
                .map(|&q| FheInt64::encrypt(q, client_key))
                .collect(),
            // Without the client key, trivial ciphertexts under the client's
            // keyset stand in for public-key encryption of known values.
            None => with_server_key(
                &self.server_key,
                Self::computation_aborted("trivial encryption"),
                || {
                    quantized
                        .iter()
                        .map(|&q| FheInt64::encrypt_trivial(q))
                        .collect()
                },
            )?,
        };

        tracing::trace!("Encrypted {} slots", values.len());
        Ok(TfheVector {
            slots,
            scale_bits: self.params.fixed_point_bits,
            depth: 0,
        })
    }

    fn load_vector(&self, bytes: &[u8]) -> Result<TfheVector, CryptoError> {
        let envelope: Envelope<EncryptedSlots> = Envelope::from_bytes(
            bytes,
            &self.params,
            "ciphertext",
            CryptoError::Deserialization,
        )?;
        if envelope.keyset != self.keyset {
            return Err(CryptoError::Deserialization(format!(
                "ciphertext was produced under keyset {}, expected {}",
                envelope.keyset, self.keyset
            )));
        }

        let payload = envelope.payload;
        if payload.scale_bits != self.params.fixed_point_bits {
            return Err(CryptoError::Deserialization(format!(
                "ciphertext scale 2^{} does not match scheme scale 2^{}",
                payload.scale_bits, self.params.fixed_point_bits
            )));
        }
        if payload.depth != 0 {
            return Err(CryptoError::Deserialization(
                "expected a fresh ciphertext".into(),
            ));
        }

        // Slots encrypted under other tfhe parameters would only fail later,
        // inside the homomorphic operations.
        let conformance = FheInt64ConformanceParams::from(&self.server_key);
        if let Some(i) = payload
            .slots
            .iter()
            .position(|slot| !slot.is_conformant(&conformance))
        {
            return Err(CryptoError::Deserialization(format!(
                "encrypted feature {} does not match the scheme's tfhe parameters",
                i + 1
            )));
        }

        Ok(TfheVector {
            slots: payload.slots,
            scale_bits: payload.scale_bits,
            depth: 0,
        })
    }

    fn slot_count(&self, vector: &TfheVector) -> usize {
        vector.slots.len()
    }

    fn multiply(&self, lhs: &TfheVector, rhs: &TfheVector) -> Result<TfheVector, CryptoError> {
        let depth = lhs.depth.max(rhs.depth) + 1;
        if depth > self.params.max_multiplicative_depth {
            return Err(CryptoError::DepthExhausted {
                max: self.params.max_multiplicative_depth,
            });
        }
        if lhs.slots.len() != rhs.slots.len() {
            return Err(CryptoError::Computation(format!(
                "slot count mismatch: {} vs {}",
                lhs.slots.len(),
                rhs.slots.len()
            )));
        }

        let slots = with_server_key(
            &self.server_key,
            Self::computation_aborted("multiplication"),
            || {
                lhs.slots
                    .iter()
                    .zip(&rhs.slots)
                    .map(|(a, b)| a * b)
                    .collect::<Vec<FheInt64>>()
            },
        )?;

        tracing::debug!("Multiplied {} slots (depth {depth})", slots.len());
        Ok(TfheVector {
            slots,
            scale_bits: lhs.scale_bits + rhs.scale_bits,
            depth,
        })
    }

    fn sum_slots(&self, vector: &TfheVector) -> Result<TfheVector, CryptoError> {
        let (first, rest) = vector
            .slots
            .split_first()
            .ok_or_else(|| CryptoError::Computation("cannot sum an empty vector".into()))?;

        let total = with_server_key(
            &self.server_key,
            Self::computation_aborted("slot summation"),
            || rest.iter().fold(first.clone(), |acc, slot| &acc + slot),
        )?;

        Ok(TfheVector {
            slots: vec![total],
            scale_bits: vector.scale_bits,
            depth: vector.depth,
        })
    }

    fn decrypt(&self, vector: &TfheVector) -> Result<Vec<f64>, CryptoError> {
        let client_key = self.client_key.as_ref().ok_or_else(|| {
            CryptoError::Computation("public-only context holds no secret key".into())
        })?;

        panic::catch_unwind(AssertUnwindSafe(|| {
            vector
                .slots
                .iter()
                .map(|slot| {
                    let q: i64 = slot.decrypt(client_key);
                    decode(q, vector.scale_bits)
                })
                .collect()
        }))
        .map_err(|_| CryptoError::Computation("decryption aborted inside tfhe-rs".into()))
    }

    fn serialize_vector(&self, vector: &TfheVector) -> Result<Vec<u8>, CryptoError> {
        Envelope {
            scheme: self.params,
            keyset: self.keyset.clone(),
            payload: EncryptedSlots {
                scale_bits: vector.scale_bits,
                depth: vector.depth,
                slots: vector.slots.clone(),
            },
        }
        .to_bytes()
    }
}
