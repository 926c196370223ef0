//! Vault error type.

use thiserror::Error;

/// Errors reported by vault operations.
///
/// Authentication failures are terminal for the operation that produced
/// them: callers must never retry a failed decryption with the same inputs,
/// since a mismatched tag may indicate an active attacker.
#[derive(Debug, Error)]
pub enum VaultError {
    /// An argument was rejected before any cryptographic work happened.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The backend's entropy source is unavailable.
    #[error("entropy source unavailable")]
    RngFailure,

    /// Key agreement with the peer's public key produced a degenerate
    /// shared secret (for example the identity element).
    #[error("key agreement produced a degenerate shared secret")]
    AgreementFailure,

    /// An AEAD tag did not verify.
    #[error("authentication tag verification failed")]
    AuthenticationFailure,

    /// The configured backend has no registered implementation.
    #[error("no backend available for `{0}`")]
    UnsupportedBackend(String),
}
