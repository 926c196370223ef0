//! Directional cipher contexts.
//!
//! A completed handshake yields two of these per side: one for traffic to
//! the peer, one for traffic from the peer. Each context pairs a symmetric
//! key with a monotonically increasing nonce counter; a counter value is
//! never reused under the same key, and only a *successful* operation
//! advances the counter.

use thiserror::Error;
use tether_vault::{SymmetricKey, Vault, VaultError};

/// Counter value reserved as the exhaustion sentinel; an operation at this
/// value fails instead of wrapping.
pub const NONCE_MAX: u64 = u64::MAX;

/// Cipher context errors.
#[derive(Debug, Error)]
pub enum CipherError {
    /// The nonce counter reached its maximum; the context is spent.
    #[error("nonce counter exhausted")]
    NonceExhausted,

    /// The record's authentication tag did not verify. Terminal: never
    /// retried, since it may indicate an active attacker.
    #[error("record failed authentication")]
    Authentication,

    /// The vault failed underneath the cipher.
    #[error("vault operation failed: {0}")]
    Vault(VaultError),
}

/// A single-direction symmetric key with its nonce counter.
///
/// The key is wiped when the context drops.
#[derive(Debug)]
pub struct CipherContext {
    vault: Vault,
    key: SymmetricKey,
    nonce: u64,
}

impl CipherContext {
    pub(crate) fn new(vault: Vault, key: SymmetricKey) -> Self {
        Self {
            vault,
            key,
            nonce: 0,
        }
    }

    /// The counter value the next operation will use. After N successful
    /// operations this is exactly N.
    pub fn nonce(&self) -> u64 {
        self.nonce
    }

    /// Encrypts one record under the current counter, then advances it.
    pub fn encrypt(&mut self, aad: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if self.nonce == NONCE_MAX {
            return Err(CipherError::NonceExhausted);
        }
        let ciphertext = self
            .vault
            .aead_encrypt(&self.key, self.nonce, aad, plaintext)
            .map_err(CipherError::Vault)?;
        self.nonce += 1;
        Ok(ciphertext)
    }

    /// Decrypts one record under the current counter, advancing it only on
    /// success.
    pub fn decrypt(&mut self, aad: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CipherError> {
        if self.nonce == NONCE_MAX {
            return Err(CipherError::NonceExhausted);
        }
        let plaintext = self
            .vault
            .aead_decrypt(&self.key, self.nonce, aad, ciphertext)
            .map_err(|e| match e {
                VaultError::AuthenticationFailure => CipherError::Authentication,
                other => CipherError::Vault(other),
            })?;
        self.nonce += 1;
        Ok(plaintext)
    }

    #[cfg(test)]
    pub(crate) fn force_nonce(&mut self, nonce: u64) {
        self.nonce = nonce;
    }
}
