//! Wire types of the client-encrypted exchange.
//!
//! Binary fields are standard-alphabet base64. An empty string is treated the
//! same as an absent optional field.

use serde::{Deserialize, Serialize};

/// Encrypted-mode request: normalized features encrypted by the client, plus
/// the public material needed to compute on them.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct EncryptedAssessmentRequest {
    pub cipher: String,
    pub public_key: String,
    #[serde(default)]
    pub relin_keys: String,
    #[serde(default)]
    pub galois_keys: String,
}

impl std::fmt::Debug for EncryptedAssessmentRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedAssessmentRequest")
            .field("cipher_len", &self.cipher.len())
            .field("public_key_len", &self.public_key.len())
            .field("relin_keys_len", &self.relin_keys.len())
            .field("galois_keys_len", &self.galois_keys.len())
            .finish()
    }
}

/// Encrypted-mode response: the raw weighted sum, still encrypted under the
/// client's key. The client applies the score transform after decrypting.
#[derive(Clone, Serialize, Deserialize)]
pub struct EncryptedAssessmentResponse {
    pub encrypted_score: String,
}

impl std::fmt::Debug for EncryptedAssessmentResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedAssessmentResponse")
            .field("encrypted_score_len", &self.encrypted_score.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_keys_default_to_empty() {
        let req: EncryptedAssessmentRequest =
            serde_json::from_str(r#"{"cipher":"AAAA","public_key":"BBBB"}"#).expect("parse");
        assert!(req.relin_keys.is_empty());
        assert!(req.galois_keys.is_empty());
    }

    #[test]
    fn test_debug_prints_lengths_only() {
        let req = EncryptedAssessmentRequest {
            cipher: "c2VjcmV0".into(),
            public_key: "cHVibGlj".into(),
            ..Default::default()
        };
        let out = format!("{req:?}");
        assert!(!out.contains("c2VjcmV0"));
        assert!(out.contains("cipher_len: 8"));
    }
}
