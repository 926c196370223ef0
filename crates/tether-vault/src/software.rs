//! Pure-software vault backend.
//!
//! Implements every capability with audited RustCrypto/dalek crates:
//! SHA-256 and HKDF from `sha2`/`hkdf`, X25519 from `x25519-dalek`,
//! ChaCha20-Poly1305 from `chacha20poly1305`, and the OS CSPRNG from
//! `rand`. The backend itself is stateless; all key material lives in the
//! caller-owned key types, which zeroize on drop.

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use hkdf::Hkdf;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::error::VaultError;
use crate::keys::{
    KeyPair, PublicKey, SecretKey, SharedSecret, SymmetricKey, AEAD_TAG_LENGTH, KEY_LENGTH,
    SHA256_DIGEST_LENGTH,
};
use crate::VaultBackend;

/// Largest HKDF output (RFC 5869: 255 hash blocks).
const HKDF_MAX_OUTPUT: usize = 255 * SHA256_DIGEST_LENGTH;

/// The software implementation of the vault capability interface.
#[derive(Debug, Default)]
pub struct SoftwareVault;

impl SoftwareVault {
    pub fn new() -> Self {
        Self
    }
}

/// Formats a counter into the cipher's 96-bit nonce space: four zero bytes
/// followed by the counter in little-endian.
fn format_nonce(counter: u64) -> Nonce {
    let mut bytes = [0u8; 12];
    bytes[4..].copy_from_slice(&counter.to_le_bytes());
    Nonce::from(bytes)
}

impl VaultBackend for SoftwareVault {
    fn random(&self, dest: &mut [u8]) -> Result<(), VaultError> {
        OsRng.try_fill_bytes(dest).map_err(|_| VaultError::RngFailure)
    }

    fn sha256(&self, input: &[u8]) -> Result<[u8; SHA256_DIGEST_LENGTH], VaultError> {
        let mut hasher = Sha256::new();
        hasher.update(input);
        Ok(hasher.finalize().into())
    }

    fn hkdf_sha256(
        &self,
        salt: &[u8],
        ikm: &[u8],
        info: &[u8],
        okm: &mut [u8],
    ) -> Result<(), VaultError> {
        if okm.is_empty() || okm.len() > HKDF_MAX_OUTPUT {
            return Err(VaultError::InvalidParameter("hkdf output length"));
        }
        Hkdf::<Sha256>::new(Some(salt), ikm)
            .expand(info, okm)
            .map_err(|_| VaultError::InvalidParameter("hkdf output length"))
    }

    fn generate_keypair(&self) -> Result<KeyPair, VaultError> {
        let mut seed = [0u8; KEY_LENGTH];
        self.random(&mut seed)?;

        let secret = x25519_dalek::StaticSecret::from(seed);
        seed.zeroize();
        let public = x25519_dalek::PublicKey::from(&secret);

        Ok(KeyPair::new(
            SecretKey::from_bytes(secret.to_bytes()),
            PublicKey::from_bytes(*public.as_bytes()),
        ))
    }

    fn key_agreement(
        &self,
        local_secret: &SecretKey,
        remote_public: &PublicKey,
    ) -> Result<SharedSecret, VaultError> {
        let secret = x25519_dalek::StaticSecret::from(*local_secret.bytes());
        let public = x25519_dalek::PublicKey::from(*remote_public.as_bytes());

        let shared = secret.diffie_hellman(&public);
        if !shared.was_contributory() {
            return Err(VaultError::AgreementFailure);
        }
        Ok(SharedSecret::from_bytes(*shared.as_bytes()))
    }

    fn aead_encrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        plaintext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .encrypt(
                &format_nonce(nonce),
                Payload {
                    msg: plaintext,
                    aad,
                },
            )
            .map_err(|_| VaultError::InvalidParameter("plaintext length"))
    }

    fn aead_decrypt(
        &self,
        key: &SymmetricKey,
        nonce: u64,
        aad: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, VaultError> {
        if ciphertext.len() < AEAD_TAG_LENGTH {
            return Err(VaultError::InvalidParameter("ciphertext shorter than tag"));
        }

        let cipher = ChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
        cipher
            .decrypt(
                &format_nonce(nonce),
                Payload {
                    msg: ciphertext,
                    aad,
                },
            )
            .map_err(|_| VaultError::AuthenticationFailure)
    }
}
