//! Client side of the encrypted exchange.
//!
//! The client owns the secret key. It normalizes and encrypts its own
//! features, ships the public and evaluation keys with them, and decrypts the
//! weighted sum the server returns, applying the score transform locally.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tfhe::prelude::*;
use tfhe::{generate_keys, ClientKey, CompressedPublicKey, CompressedServerKey, FheInt64};
use zeroize::Zeroizing;

use super::wire::{key_fingerprint, EncryptedSlots, Envelope};
use super::{decode, encode, tfhe_config};
use crate::domain::{
    CryptoError, EncryptedAssessmentRequest, EncryptedAssessmentResponse, FeatureVector,
    RiskModel, RiskScore, SchemeParameters,
};
use crate::AssessmentError;

/// A client keyset for the encrypted exchange.
pub struct TfheClient {
    params: SchemeParameters,
    keyset: String,
    client_key: ClientKey,
    public_key: CompressedPublicKey,
}

impl std::fmt::Debug for TfheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TfheClient")
            .field("keyset", &self.keyset)
            .field("client_key", &"[REDACTED]")
            .finish()
    }
}

impl TfheClient {
    /// Generate a fresh client keyset.
    ///
    /// # Errors
    /// Returns `CryptoError::ContextSetup` if tfhe-rs fails to generate keys.
    pub fn generate(params: SchemeParameters) -> Result<Self, CryptoError> {
        tracing::info!("Generating client keyset...");

        let (client_key, public_key) = std::panic::catch_unwind(|| {
            let (client_key, _) = generate_keys(tfhe_config());
            let public_key = CompressedPublicKey::new(&client_key);
            (client_key, public_key)
        })
        .map_err(|_| CryptoError::ContextSetup("tfhe-rs key generation aborted".into()))?;

        let keyset = key_fingerprint(&public_key)?;
        tracing::info!("Generated client keyset {keyset}");

        Ok(Self {
            params,
            keyset,
            client_key,
            public_key,
        })
    }

    /// Restore a keyset exported by [`Self::export_secret_key`].
    ///
    /// # Errors
    /// Returns `CryptoError::KeyMaterial` for malformed bytes, another scheme,
    /// or a public key that does not match the recorded keyset.
    pub fn restore(params: SchemeParameters, secret: &[u8]) -> Result<Self, CryptoError> {
        let envelope: Envelope<(ClientKey, CompressedPublicKey)> =
            Envelope::from_bytes(secret, &params, "secret key", CryptoError::KeyMaterial)?;
        let (client_key, public_key) = envelope.payload;

        if key_fingerprint(&public_key)? != envelope.keyset {
            return Err(CryptoError::KeyMaterial(
                "secret key file does not match its recorded keyset".into(),
            ));
        }

        Ok(Self {
            params,
            keyset: envelope.keyset,
            client_key,
            public_key,
        })
    }

    #[must_use]
    pub fn keyset(&self) -> &str {
        &self.keyset
    }

    /// Serialize the secret keyset. The buffer is wiped when dropped.
    ///
    /// # Errors
    /// Returns `CryptoError::Serialization` if encoding fails.
    pub fn export_secret_key(&self) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        Envelope {
            scheme: self.params,
            keyset: self.keyset.clone(),
            payload: (&self.client_key, &self.public_key),
        }
        .to_bytes()
        .map(Zeroizing::new)
    }

    fn public_key_envelope(&self) -> Result<Vec<u8>, CryptoError> {
        Envelope {
            scheme: self.params,
            keyset: self.keyset.clone(),
            payload: &self.public_key,
        }
        .to_bytes()
    }

    fn evaluation_key_envelope(&self) -> Result<Vec<u8>, CryptoError> {
        tracing::debug!("Generating evaluation keys...");
        let server_key = CompressedServerKey::new(&self.client_key);
        Envelope {
            scheme: self.params,
            keyset: self.keyset.clone(),
            payload: server_key,
        }
        .to_bytes()
    }

    /// Encrypt already normalized values as a fresh ciphertext envelope.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` for values outside the encodable range.
    pub fn encrypt_normalized(&self, values: &[f64]) -> Result<Vec<u8>, CryptoError> {
        let slots = values
            .iter()
            .map(|&v| encode(&self.params, v).map(|q| FheInt64::encrypt(q, &self.client_key)))
            .collect::<Result<Vec<_>, _>>()?;

        Envelope {
            scheme: self.params,
            keyset: self.keyset.clone(),
            payload: EncryptedSlots {
                scale_bits: self.params.fixed_point_bits,
                depth: 0,
                slots,
            },
        }
        .to_bytes()
    }

    /// Validate, normalize and encrypt raw features into a request body.
    ///
    /// # Errors
    /// Returns a validation error for bad features and a crypto error if
    /// encryption or key export fails.
    pub fn encrypt_request(
        &self,
        model: &RiskModel,
        features: &[f64],
    ) -> Result<EncryptedAssessmentRequest, AssessmentError> {
        let features = FeatureVector::try_from(features)?;
        let normalized = model.normalize(&features);

        let cipher = self.encrypt_normalized(normalized.as_slice())?;
        let public_key = self.public_key_envelope()?;
        let relin_keys = self.evaluation_key_envelope()?;

        Ok(EncryptedAssessmentRequest {
            cipher: BASE64.encode(cipher),
            public_key: BASE64.encode(public_key),
            relin_keys: BASE64.encode(relin_keys),
            galois_keys: String::new(),
        })
    }

    /// Decrypt the encrypted weighted sum returned by the server.
    ///
    /// # Errors
    /// Returns `Decode` for malformed base64 and a crypto error for a payload
    /// not produced under this keyset.
    pub fn decrypt_raw_score(
        &self,
        response: &EncryptedAssessmentResponse,
    ) -> Result<f64, AssessmentError> {
        let bytes = BASE64
            .decode(response.encrypted_score.trim())
            .map_err(|source| AssessmentError::Decode {
                field: "encrypted_score",
                source,
            })?;

        let envelope: Envelope<EncryptedSlots> = Envelope::from_bytes(
            &bytes,
            &self.params,
            "encrypted score",
            CryptoError::Deserialization,
        )?;
        if envelope.keyset != self.keyset {
            return Err(CryptoError::Deserialization(format!(
                "encrypted score belongs to keyset {}, not {}",
                envelope.keyset, self.keyset
            ))
            .into());
        }

        let payload = envelope.payload;
        let [slot] = payload.slots.as_slice() else {
            return Err(CryptoError::Deserialization(format!(
                "expected a single-slot result, got {} slots",
                payload.slots.len()
            ))
            .into());
        };

        let q: i64 = slot.decrypt(&self.client_key);
        Ok(decode(q, payload.scale_bits))
    }

    /// Decrypt and apply the model's score transform.
    ///
    /// # Errors
    /// See [`Self::decrypt_raw_score`].
    pub fn decrypt_score(
        &self,
        model: &RiskModel,
        response: &EncryptedAssessmentResponse,
    ) -> Result<RiskScore, AssessmentError> {
        let raw = self.decrypt_raw_score(response)?;
        Ok(RiskScore::from_raw(raw, model.sigmoid_gain))
    }
}
