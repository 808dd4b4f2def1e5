//! Cryptographic error and key-material types.
//!
//! # Memory Security
//!
//! Key bytes received from clients are held in types implementing `Zeroize`
//! and `ZeroizeOnDrop`, so the decoded buffers are erased when the request
//! that carried them ends.

use zeroize::{Zeroize, ZeroizeOnDrop};

/// Error type for FHE operations, one variant per protocol stage.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("Could not set up encryption context: {0}")]
    ContextSetup(String),

    #[error("Invalid key material: {0}")]
    KeyMaterial(String),

    #[error("Could not load encrypted data: {0}")]
    Deserialization(String),

    #[error("Homomorphic computation failed: {0}")]
    Computation(String),

    #[error("Multiplicative depth exhausted (max {max})")]
    DepthExhausted { max: u32 },

    #[error("Could not serialize result: {0}")]
    Serialization(String),
}

macro_rules! key_bytes {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Clone, Zeroize, ZeroizeOnDrop)]
        pub struct $name {
            inner: Vec<u8>,

            /// Fingerprint for identification (NOT secret)
            #[zeroize(skip)]
            pub fingerprint: String,
        }

        impl $name {
            pub fn from_bytes(bytes: Vec<u8>) -> Self {
                let fingerprint = compute_fingerprint(&bytes);
                Self {
                    inner: bytes,
                    fingerprint,
                }
            }

            #[must_use]
            pub fn as_bytes(&self) -> &[u8] {
                &self.inner
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    .field("fingerprint", &self.fingerprint)
                    .field("size_bytes", &self.inner.len())
                    .finish()
            }
        }
    };
}

key_bytes!(
    /// Serialized public encryption key supplied by a client.
    PublicKeyBytes
);

key_bytes!(
    /// Serialized evaluation keys enabling ciphertext multiplication.
    ///
    /// Plays the role of relinearization keys on the wire.
    RelinKeyBytes
);

key_bytes!(
    /// Serialized rotation keys.
    GaloisKeyBytes
);

/// Key material a client hands to the server for a public-only context.
///
/// Never contains a secret key.
#[derive(Debug, Clone)]
pub struct KeyMaterial {
    pub public_key: PublicKeyBytes,
    pub relin_keys: Option<RelinKeyBytes>,
    pub galois_keys: Option<GaloisKeyBytes>,
}

impl KeyMaterial {
    pub fn new(
        public_key: Vec<u8>,
        relin_keys: Option<Vec<u8>>,
        galois_keys: Option<Vec<u8>>,
    ) -> Self {
        Self {
            public_key: PublicKeyBytes::from_bytes(public_key),
            relin_keys: relin_keys.map(RelinKeyBytes::from_bytes),
            galois_keys: galois_keys.map(GaloisKeyBytes::from_bytes),
        }
    }
}

/// Compute a fingerprint for key identification using SHA-256.
///
/// First 8 bytes of the digest, hex encoded.
#[must_use]
pub fn compute_fingerprint(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};

    let digest = Sha256::digest(bytes);
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}
