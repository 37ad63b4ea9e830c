//! # Ephemeral Signing Key
//!
//! A single-use BIP-340 keypair. The key locks the commitment output through
//! a key-path-only taproot output and signs exactly one message, the
//! follow-on sighash. Signing consumes the key, and the secret is erased when
//! the value is dropped, so the signature is the only artifact that survives
//! a commit operation.

use crate::error::{CovenantError, CovenantResult};
use bitcoin::{
    key::{TapTweak, TweakedPublicKey},
    secp256k1::{
        rand::{rngs::OsRng, RngCore},
        schnorr, Keypair, Message, Secp256k1, SecretKey, XOnlyPublicKey,
    },
};
use std::fmt;

/// Single-use signing key for one covenant commitment.
///
/// Deliberately neither `Clone` nor `Copy`: [`EphemeralKey::sign`] takes the
/// key by value, so a second signature with the same key does not compile.
pub struct EphemeralKey {
    keypair: Keypair,
}

impl EphemeralKey {
    /// Draw a fresh key from the operating system entropy source.
    ///
    /// Entropy failure is reported as a cryptography error and never retried;
    /// calling `issue` again yields an unrelated key.
    pub fn issue() -> CovenantResult<Self> {
        let mut entropy = [0u8; 32];
        OsRng
            .try_fill_bytes(&mut entropy)
            .map_err(|e| CovenantError::crypto(format!("Entropy source failed: {}", e)))?;

        let secret_key = SecretKey::from_slice(&entropy);
        entropy.fill(0);

        let secret_key = secret_key
            .map_err(|e| CovenantError::crypto(format!("Invalid ephemeral secret: {}", e)))?;
        Ok(Self::wrap(secret_key))
    }

    /// Wrap fixed secret material for deterministic fixtures.
    #[cfg(test)]
    pub(crate) fn from_secret_key(secret_key: SecretKey) -> Self {
        Self::wrap(secret_key)
    }

    fn wrap(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        Self {
            keypair: Keypair::from_secret_key(&secp, &secret_key),
        }
    }

    /// Untweaked x-only public key (BIP-341 internal key)
    pub fn internal_key(&self) -> XOnlyPublicKey {
        self.keypair.x_only_public_key().0
    }

    /// Output key committed in the P2TR script, tweaked with an empty script tree
    pub fn output_key(&self) -> TweakedPublicKey {
        let secp = Secp256k1::verification_only();
        self.internal_key().tap_tweak(&secp, None).0
    }

    /// Sign a 32-byte digest with the tweaked secret and consume the key.
    pub fn sign(self, digest: &Message) -> schnorr::Signature {
        let secp = Secp256k1::new();
        let mut tweaked = self.keypair.tap_tweak(&secp, None).to_inner();
        let signature = secp.sign_schnorr(digest, &tweaked);
        tweaked.non_secure_erase();
        signature
    }
}

impl Drop for EphemeralKey {
    fn drop(&mut self) {
        self.keypair.non_secure_erase();
    }
}

impl fmt::Debug for EphemeralKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EphemeralKey")
            .field("internal_key", &self.internal_key())
            .finish_non_exhaustive()
    }
}
