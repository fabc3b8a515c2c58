use thiserror::Error;

use coffre_core::types::RecordId;
use coffre_core::CoffreError;
use coffre_crypto::CryptoError;

pub type VaultResult<T> = Result<T, VaultError>;

#[derive(Debug, Error)]
pub enum VaultError {
    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    #[error("metadata error: {0:#}")]
    Metadata(anyhow::Error),

    #[error(transparent)]
    Core(#[from] CoffreError),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no such file: {0}")]
    NotFound(RecordId),

    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl VaultError {
    /// True when decryption failed because the password is wrong or the blob
    /// was corrupted. The two causes are never distinguished.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, VaultError::Crypto(CryptoError::AuthenticationFailure))
    }
}
