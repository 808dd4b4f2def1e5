//! FHE Engine port: Traits for Fully Homomorphic Encryption operations.
//!
//! These traits abstract the FHE library (tfhe-rs) from the scoring protocol.
//! An engine is a factory; every request builds its own context from it and
//! drops the context (with all keys and ciphertexts) when the request ends.

use crate::domain::{CryptoError, KeyMaterial, SchemeParameters};

/// How a context obtains its keys.
#[derive(Debug, Clone, Copy)]
pub enum ContextMode<'a> {
    /// Generate a complete keyset locally, secret key included.
    Full,
    /// Load a client's public and evaluation keys. Never holds a secret key.
    PublicOnly(&'a KeyMaterial),
}

/// Factory for per-request encryption contexts.
pub trait FheEngine: Send + Sync + 'static {
    type Context: FheContext;

    /// Scheme parameters every context of this engine uses.
    fn parameters(&self) -> &SchemeParameters;

    /// Construct a fresh context.
    ///
    /// # Errors
    /// Returns `CryptoError::KeyMaterial` if supplied keys are malformed or
    /// inconsistent with the scheme parameters, and `CryptoError::ContextSetup`
    /// if the library fails to build the context.
    fn create_context(&self, mode: ContextMode<'_>) -> Result<Self::Context, CryptoError>;
}

/// Scheme parameters and key material for one request.
pub trait FheContext {
    /// An encrypted vector of slots.
    type Vector;

    /// Whether this context holds a secret key and can decrypt.
    fn can_decrypt(&self) -> bool;

    /// Fingerprint of the keyset this context computes under.
    fn keyset_fingerprint(&self) -> &str;

    /// Encrypt a vector of reals.
    ///
    /// Public-only contexts produce ciphertexts valid under the client's key.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if a value cannot be encoded.
    fn encrypt(&self, values: &[f64]) -> Result<Self::Vector, CryptoError>;

    /// Load a vector serialized under this context's keyset.
    ///
    /// # Errors
    /// Returns `CryptoError::Deserialization` for bytes that are not a fresh
    /// ciphertext under this context's scheme and keyset.
    fn load_vector(&self, bytes: &[u8]) -> Result<Self::Vector, CryptoError>;

    /// Number of slots in an encrypted vector.
    fn slot_count(&self, vector: &Self::Vector) -> usize;

    /// Slot-wise ciphertext-ciphertext product.
    ///
    /// # Errors
    /// Returns `CryptoError::DepthExhausted` past the scheme's multiplicative
    /// depth and `CryptoError::Computation` if the operation fails.
    fn multiply(&self, lhs: &Self::Vector, rhs: &Self::Vector)
        -> Result<Self::Vector, CryptoError>;

    /// Homomorphic sum of all slots into a single-slot vector.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if the operation fails.
    fn sum_slots(&self, vector: &Self::Vector) -> Result<Self::Vector, CryptoError>;

    /// Decrypt every slot.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if the context holds no secret key or
    /// decryption fails.
    fn decrypt(&self, vector: &Self::Vector) -> Result<Vec<f64>, CryptoError>;

    /// Serialize a vector for transmission.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if encoding fails.
    fn serialize_vector(&self, vector: &Self::Vector) -> Result<Vec<u8>, CryptoError>;
}
