//! Key material types.
//!
//! Secret-bearing types never expose their bytes through the public API and
//! are zeroized on drop. A `SecretKey` in particular is opaque outside this
//! crate: a hardware backend may stand an internal key reference in for the
//! actual material, and nothing above the vault boundary can tell the
//! difference.

use std::fmt;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use zeroize::Zeroizing;

/// Length of every asymmetric and symmetric key, in bytes.
pub const KEY_LENGTH: usize = 32;

/// SHA-256 digest length, in bytes.
pub const SHA256_DIGEST_LENGTH: usize = 32;

/// AEAD authentication tag length, in bytes.
pub const AEAD_TAG_LENGTH: usize = 16;

/// A public key.
///
/// Public keys are plain data: freely copyable and comparable.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct PublicKey([u8; KEY_LENGTH]);

impl PublicKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }

    /// Stable printable identity for this key: the base64url encoding of
    /// its bytes (32 bytes → 43 characters, no padding).
    pub fn fingerprint(&self) -> String {
        URL_SAFE_NO_PAD.encode(self.0)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.fingerprint())
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fingerprint())
    }
}

/// An asymmetric private key held inside the vault boundary.
///
/// The bytes are not reachable outside this crate.
#[derive(Clone)]
pub struct SecretKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SecretKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub(crate) fn bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// An asymmetric keypair produced by [`crate::Vault::generate_keypair`].
#[derive(Clone, Debug)]
pub struct KeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl KeyPair {
    pub(crate) fn new(secret: SecretKey, public: PublicKey) -> Self {
        Self { secret, public }
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

/// The output of a key agreement, fed to key derivation.
#[derive(Clone)]
pub struct SharedSecret(Zeroizing<[u8; KEY_LENGTH]>);

impl SharedSecret {
    pub(crate) fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(..)")
    }
}

/// A symmetric AEAD key.
#[derive(Clone)]
pub struct SymmetricKey(Zeroizing<[u8; KEY_LENGTH]>);

impl SymmetricKey {
    pub fn from_bytes(bytes: [u8; KEY_LENGTH]) -> Self {
        Self(Zeroizing::new(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.0
    }
}

impl fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SymmetricKey(..)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_is_43_chars() {
        let key = PublicKey::from_bytes([7u8; KEY_LENGTH]);
        assert_eq!(key.fingerprint().len(), 43);
    }

    #[test]
    fn secrets_do_not_leak_via_debug() {
        let secret = SecretKey::from_bytes([0xAB; KEY_LENGTH]);
        assert_eq!(format!("{secret:?}"), "SecretKey(..)");

        let key = SymmetricKey::from_bytes([0xCD; KEY_LENGTH]);
        assert_eq!(format!("{key:?}"), "SymmetricKey(..)");
    }
}
