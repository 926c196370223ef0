//! Cryptographic capability provider for Tether.
//!
//! Protocols above this crate depend on a small set of cryptographic
//! building blocks: hashing, key derivation, random bytes, key agreement,
//! and authenticated encryption. Depending on the environment those blocks
//! may execute in software or inside a cryptographically capable hardware
//! element, so the protocol code is kept loosely coupled from any one
//! implementation: everything goes through the [`Vault`] handle, and the
//! handle dispatches to whichever [`VaultBackend`] it was built with.
//!
//! [`SoftwareVault`] is the pure-software backend, used wherever a building
//! block is not available in hardware. A hardware backend is plugged in
//! out-of-tree via [`Vault::from_backend`].
//!
//! # Teardown
//!
//! There is no explicit deinit call. Dropping the last handle drops the
//! backend, and every secret-bearing type wipes its material on drop; move
//! semantics make use-after-teardown unrepresentable.
//!
//! # Example
//!
//! ```
//! use tether_vault::Vault;
//!
//! let vault = Vault::software();
//! let digest = vault.sha256(b"hello world").unwrap();
//! assert_eq!(digest.len(), 32);
//! ```

#![forbid(unsafe_code)]

mod error;
mod keys;
mod software;

pub use error::VaultError;
pub use keys::{
    KeyPair, PublicKey, SecretKey, SharedSecret, SymmetricKey, AEAD_TAG_LENGTH, KEY_LENGTH,
    SHA256_DIGEST_LENGTH,
};
pub use software::SoftwareVault;

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// The capability interface every vault backend implements.
///
/// Backends must be shareable across concurrent handshakes and channels:
/// any mutable backend state (a hardware session, for instance) is the
/// backend's own responsibility to synchronize.
pub trait VaultBackend: Send + Sync + fmt::Debug {
    /// Fills `dest` with cryptographically secure random bytes.
    fn random(&self, dest: &mut [u8]) -> Result<(), VaultError>;

    /// Computes the SHA-256 digest of `input`. Pure and deterministic.
    fn sha256(&self, input: &[u8]) -> Result<[u8; SHA256_DIGEST_LENGTH], VaultError>;

    /// HKDF-SHA-256 (RFC 5869): extract with `salt` over `ikm`, then expand
    /// with `info` to fill `okm`.
    fn hkdf_sha256(
        &self,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), VaultError>;

    /// Generates a fresh X25519 keypair. The private half never leaves the
    /// vault boundary.
    fn generate_keypair(&self) -> Result<KeyPair, VaultError>;

    /// X25519 key agreement between a local private key and a remote public
    /// key.
    ///
    /// # Errors
    /// [`VaultError::AgreementFailure`] if the peer key yields a degenerate
    /// shared secret.
    fn key_agreement(
        &self,
        local_secret: &SecretKey,
        remote_public: &PublicKey,
    ) -> Result<SharedSecret, VaultError>;

    /// AEAD-encrypts `plaintext`, returning `ciphertext ‖ tag`.
    ///
    /// `nonce` is a counter supplied by the caller; the backend is
    /// responsible for formatting it into the cipher's nonce space. A
    /// counter value must never be reused under the same key.
    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, VaultError>;

    /// AEAD-decrypts `ciphertext ‖ tag`.
    ///
    /// # Errors
    /// [`VaultError::AuthenticationFailure`] when the tag does not verify.
    /// The check is constant-time; the error carries no indication of where
    /// the mismatch occurred.
    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, VaultError>;
}

/// Backend selection for [`Vault::new`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendSelector {
    /// The pure-software backend.
    #[default]
    Software,
    /// A named hardware secure element, registered out-of-tree.
    SecureElement { driver: String },
}

/// Vault construction parameters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    pub backend: BackendSelector,
}

/// Handle to a vault backend.
///
/// Cheap to clone; every clone routes through the same backend for the
/// handle's lifetime. Safe to share across concurrent handshakes and
/// channels.
#[derive(Clone, Debug)]
pub struct Vault {
    backend: Arc<dyn VaultBackend>,
}

impl Vault {
    /// Builds a vault from a configuration.
    ///
    /// # Errors
    /// [`VaultError::UnsupportedBackend`] when the selector names a backend
    /// with no in-tree implementation. Hardware backends are attached with
    /// [`Vault::from_backend`] instead.
    pub fn new(config: &VaultConfig) -> Result<Self, VaultError> {
        match &config.backend {
            BackendSelector::Software => Ok(Self::software()),
            BackendSelector::SecureElement { driver } => {
                Err(VaultError::UnsupportedBackend(driver.clone()))
            }
        }
    }

    /// Builds a vault over the software backend.
    pub fn software() -> Self {
        Self::from_backend(Arc::new(SoftwareVault::new()))
    }

    /// Builds a vault over an externally supplied backend.
    pub fn from_backend(backend: Arc<dyn VaultBackend>) -> Self {
        debug!(backend = ?backend, "vault initialized");
        Self { backend }
    }

    pub fn random(&self, dest: &mut [u8]) -> Result<(), VaultError> {
        self.backend.random(dest)
    }

    pub fn sha256(&self, input: &[u8]) -> Result<[u8; SHA256_DIGEST_LENGTH], VaultError> {
        self.backend.sha256(input)
    }

    pub fn hkdf_sha256(
        &self,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), VaultError> {
        self.backend.hkdf_sha256(salt, ikm, info, okm)
    }

    pub fn generate_keypair(&self) -> Result<KeyPair, VaultError> {
        self.backend.generate_keypair()
    }

    pub fn key_agreement(
        &self,
        local_secret: &SecretKey,
        remote_public: &PublicKey,
    ) -> Result<SharedSecret, VaultError> {
        self.backend.key_agreement(local_secret, remote_public)
    }

    pub fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        self.backend.aead_encrypt(key, nonce, aad, plaintext)
    }

    pub fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        self.backend.aead_decrypt(key, nonce, aad, ciphertext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn software_backend_from_config() {
        let vault = Vault::new(&VaultConfig::default()).unwrap();
        vault.sha256(b"ok").unwrap();
    }

    #[test]
    fn unknown_secure_element_rejected() {
        let config = VaultConfig {
            backend: BackendSelector::SecureElement {
                driver: "atecc608a".into(),
            },
        };
        let err = Vault::new(&config).unwrap_err();
        assert!(matches!(err, VaultError::UnsupportedBackend(d) if d == "atecc608a"));
    }

    #[test]
    fn clones_share_one_backend() {
        let vault = Vault::software();
        let clone = vault.clone();

        let a = vault.sha256(b"same input").unwrap();
        let b = clone.sha256(b"same input").unwrap();
        assert_eq!(a, b);
    }
}
