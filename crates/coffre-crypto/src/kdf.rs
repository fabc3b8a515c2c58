//! Key derivation: PBKDF2-HMAC-SHA256 password → per-blob key

use hmac::Hmac;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use zeroize::Zeroize;

use crate::error::{CryptoError, CryptoResult};
use crate::{KEY_SIZE, PBKDF2_ITERATIONS, SALT_SIZE};

/// A 256-bit AES key derived for a single encrypt or decrypt call.
///
/// Zeroized on drop to prevent secrets lingering in memory. Not
/// `Clone`: each call derives, uses and drops its own key.
pub struct DerivedKey {
    bytes: [u8; KEY_SIZE],
}

impl DerivedKey {
    pub(crate) fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl Drop for DerivedKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// PBKDF2 parameters.
///
/// The iteration count is not recorded in the blob, so blobs can only be
/// opened with the parameters they were sealed with. Everything persisted
/// uses [`KdfParams::default`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    /// HMAC-SHA256 rounds (default: 100_000)
    pub iterations: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: PBKDF2_ITERATIONS,
        }
    }
}

/// Derive the blob key from a password and a 16-byte salt with the default
/// work factor.
pub fn derive_key(password: &SecretString, salt: &[u8]) -> CryptoResult<DerivedKey> {
    derive_key_with_params(password, salt, &KdfParams::default())
}

/// Derive a 256-bit key with explicit parameters.
///
/// Fails with `InvalidArgument` when the salt is not exactly 16 bytes, the
/// password is empty, or `iterations` is zero.
pub fn derive_key_with_params(
    password: &SecretString,
    salt: &[u8],
    params: &KdfParams,
) -> CryptoResult<DerivedKey> {
    if salt.len() != SALT_SIZE {
        return Err(CryptoError::InvalidArgument(format!(
            "salt must be {SALT_SIZE} bytes, got {}",
            salt.len()
        )));
    }
    if params.iterations == 0 {
        return Err(CryptoError::InvalidArgument(
            "PBKDF2 iterations must be at least 1".into(),
        ));
    }
    let secret = password.expose_secret();
    if secret.is_empty() {
        return Err(CryptoError::InvalidArgument("password must not be empty".into()));
    }

    let mut key = [0u8; KEY_SIZE];
    if let Err(e) = pbkdf2::pbkdf2::<Hmac<Sha256>>(secret.as_bytes(), salt, params.iterations, &mut key)
    {
        key.zeroize();
        return Err(CryptoError::InvalidArgument(format!("PBKDF2 failed: {e}")));
    }

    Ok(DerivedKey::from_bytes(key))
}
