//! Weighted risk engine: the homomorphic part of the scoring protocol.

use crate::domain::{CryptoError, RiskModel, FEATURE_COUNT};
use crate::ports::FheContext;

/// Per-feature contributions and their sum, in the clear.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightedScore {
    pub raw: f64,
    pub contributions: [f64; FEATURE_COUNT],
}

/// Multiplies encrypted features by the model's weights.
///
/// Weights are encrypted under the caller's context on every call; they are
/// never cached as ciphertext.
#[derive(Debug, Clone, Copy)]
pub struct WeightedRiskEngine<'a> {
    model: &'a RiskModel,
}

impl<'a> WeightedRiskEngine<'a> {
    #[must_use]
    pub fn new(model: &'a RiskModel) -> Self {
        Self { model }
    }

    /// Encrypt the weights and perform the single element-wise multiply.
    ///
    /// # Errors
    /// Propagates encryption and multiplication failures.
    pub fn weigh<C: FheContext>(
        &self,
        ctx: &C,
        features: &C::Vector,
    ) -> Result<C::Vector, CryptoError> {
        let slots = ctx.slot_count(features);
        if slots != FEATURE_COUNT {
            return Err(CryptoError::Computation(format!(
                "Expected {FEATURE_COUNT} encrypted features, got {slots}"
            )));
        }

        let weights = ctx.encrypt(self.model.weights.as_slice())?;
        tracing::debug!("Encrypted weight vector under keyset {}", ctx.keyset_fingerprint());

        ctx.multiply(features, &weights)
    }

    /// Decrypt weighted contributions and sum them.
    ///
    /// Only possible under a context holding the secret key.
    ///
    /// # Errors
    /// Returns `CryptoError::Computation` if decryption fails or yields an
    /// unexpected slot count or non-finite values.
    pub fn reveal<C: FheContext>(
        &self,
        ctx: &C,
        weighted: &C::Vector,
    ) -> Result<WeightedScore, CryptoError> {
        let decrypted = ctx.decrypt(weighted)?;
        let contributions: [f64; FEATURE_COUNT] =
            decrypted.as_slice().try_into().map_err(|_| {
                CryptoError::Computation(format!(
                    "Decrypted {} contributions, expected {FEATURE_COUNT}",
                    decrypted.len()
                ))
            })?;

        if contributions.iter().any(|c| !c.is_finite()) {
            return Err(CryptoError::Computation(
                "Decryption produced non-finite contributions".into(),
            ));
        }

        Ok(WeightedScore {
            raw: contributions.iter().sum(),
            contributions,
        })
    }

    /// Weigh and reveal in one step.
    ///
    /// # Errors
    /// See [`Self::weigh`] and [`Self::reveal`].
    pub fn weighted_score<C: FheContext>(
        &self,
        ctx: &C,
        features: &C::Vector,
    ) -> Result<WeightedScore, CryptoError> {
        let weighted = self.weigh(ctx, features)?;
        self.reveal(ctx, &weighted)
    }

    /// Weigh, then reduce the contributions to one encrypted slot without
    /// decrypting anything.
    ///
    /// # Errors
    /// See [`Self::weigh`].
    pub fn encrypted_total<C: FheContext>(
        &self,
        ctx: &C,
        features: &C::Vector,
    ) -> Result<C::Vector, CryptoError> {
        let weighted = self.weigh(ctx, features)?;
        ctx.sum_slots(&weighted)
    }
}
