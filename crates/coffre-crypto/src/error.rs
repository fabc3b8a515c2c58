use thiserror::Error;

use crate::BLOB_OVERHEAD;

pub type CryptoResult<T> = Result<T, CryptoError>;

/// Failure modes of key derivation and the blob codec.
///
/// Messages never contain key material, passwords or plaintext.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Caller bug: wrong salt/nonce length, empty password, zero iterations.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The OS CSPRNG could not produce bytes. Safe to retry.
    #[error("secure random source unavailable: {0}")]
    RandomnessUnavailable(String),

    /// The cipher rejected well-formed input.
    #[error("encryption failed")]
    EncryptionFailure,

    /// Tag verification failed. Covers both a wrong password and a
    /// corrupted blob; the two are never told apart.
    #[error("decryption failed: wrong password or corrupted file")]
    AuthenticationFailure,

    /// Input is shorter than the fixed blob framing.
    #[error("malformed blob: {len} bytes (minimum {BLOB_OVERHEAD})")]
    MalformedBlob { len: usize },
}

impl CryptoError {
    /// Whether repeating the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CryptoError::RandomnessUnavailable(_))
    }
}
