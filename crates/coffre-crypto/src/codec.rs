//! AES-256-GCM file codec
//!
//! Encrypted blob format (binary):
//! ```text
//! [16 bytes: salt][12 bytes: nonce][N bytes: ciphertext][16 bytes: GCM tag]
//! ```
//!
//! The salt feeds PBKDF2, so every blob is sealed under its own key even when
//! the password is reused. No associated data is bound.

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use secrecy::SecretString;
use tracing::{debug, error};

use crate::error::{CryptoError, CryptoResult};
use crate::kdf::{derive_key_with_params, KdfParams};
use crate::{BLOB_OVERHEAD, NONCE_SIZE, SALT_SIZE, TAG_SIZE};

/// Borrowed view over the three regions of an encrypted blob.
#[derive(Debug, Clone, Copy)]
pub struct BlobParts<'a> {
    pub salt: &'a [u8],
    pub nonce: &'a [u8],
    /// Ciphertext followed by the 16-byte tag
    pub sealed: &'a [u8],
}

impl<'a> BlobParts<'a> {
    /// Split a blob into salt, nonce and sealed payload.
    ///
    /// Only checks the length; nothing is authenticated here.
    pub fn parse(blob: &'a [u8]) -> CryptoResult<Self> {
        if blob.len() < BLOB_OVERHEAD {
            return Err(CryptoError::MalformedBlob { len: blob.len() });
        }
        let (salt, rest) = blob.split_at(SALT_SIZE);
        let (nonce, sealed) = rest.split_at(NONCE_SIZE);
        Ok(Self { salt, nonce, sealed })
    }

    /// Size of the plaintext this blob decrypts to.
    pub fn plaintext_len(&self) -> usize {
        self.sealed.len() - TAG_SIZE
    }
}

/// Password-based blob encryptor/decryptor.
///
/// Holds no key material, only KDF parameters, so one instance can be shared
/// freely across threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileCodec {
    params: KdfParams,
}

impl FileCodec {
    /// Codec with the persisted-format parameters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Codec with custom KDF parameters. Blobs it produces can only be opened
    /// by a codec with the same parameters.
    pub fn with_params(params: KdfParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KdfParams {
        &self.params
    }

    /// Encrypt `plaintext` under a key derived from `password` and a fresh salt.
    ///
    /// Returns `salt || nonce || ciphertext || tag`, always
    /// `plaintext.len() + 44` bytes.
    pub fn encrypt(&self, plaintext: &[u8], password: &SecretString) -> CryptoResult<Vec<u8>> {
        let mut salt = [0u8; SALT_SIZE];
        fill_random(&mut salt)?;
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        fill_random(&mut nonce_bytes)?;

        let key = derive_key_with_params(password, &salt, &self.params)?;
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from_slice(&nonce_bytes);

        let sealed = cipher.encrypt(nonce, plaintext).map_err(|_| {
            error!(plaintext_len = plaintext.len(), "AES-GCM seal rejected input");
            CryptoError::EncryptionFailure
        })?;

        let mut blob = Vec::with_capacity(SALT_SIZE + NONCE_SIZE + sealed.len());
        blob.extend_from_slice(&salt);
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&sealed);

        debug!(
            plaintext_len = plaintext.len(),
            blob_len = blob.len(),
            "sealed blob"
        );
        Ok(blob)
    }

    /// Decrypt a blob produced by [`FileCodec::encrypt`].
    ///
    /// Blobs shorter than 44 bytes fail with `MalformedBlob` before the KDF
    /// runs. Any tag mismatch fails with `AuthenticationFailure`.
    pub fn decrypt(&self, blob: &[u8], password: &SecretString) -> CryptoResult<Vec<u8>> {
        let parts = BlobParts::parse(blob)?;

        let key = derive_key_with_params(password, parts.salt, &self.params)?;
        let cipher = Aes256Gcm::new(key.as_bytes().into());
        let nonce = Nonce::from_slice(parts.nonce);

        let plaintext = cipher.decrypt(nonce, parts.sealed).map_err(|_| {
            debug!(blob_len = blob.len(), "blob authentication failed");
            CryptoError::AuthenticationFailure
        })?;

        debug!(
            blob_len = blob.len(),
            plaintext_len = plaintext.len(),
            "opened blob"
        );
        Ok(plaintext)
    }
}

fn fill_random(buf: &mut [u8]) -> CryptoResult<()> {
    OsRng.try_fill_bytes(buf).map_err(|e| {
        error!("OS random source failed: {e}");
        CryptoError::RandomnessUnavailable(e.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> FileCodec {
        FileCodec::with_params(KdfParams { iterations: 1_000 })
    }

    fn pw(s: &str) -> SecretString {
        SecretString::from(s)
    }

    #[test]
    fn test_cipher_key_schedule_wiped_on_drop() {
        fn wiped_on_drop<T: zeroize::ZeroizeOnDrop>() {}
        wiped_on_drop::<aes::Aes256>();
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let plaintext = b"hello, encrypted world!";

        let blob = codec().encrypt(plaintext, &pw("hunter2")).unwrap();
        let decrypted = codec().decrypt(&blob, &pw("hunter2")).unwrap();

        assert_eq!(&decrypted, plaintext);
    }

    #[test]
    fn test_encrypt_decrypt_empty() {
        let blob = codec().encrypt(b"", &pw("hunter2")).unwrap();
        assert_eq!(blob.len(), BLOB_OVERHEAD);

        let decrypted = codec().decrypt(&blob, &pw("hunter2")).unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_empty_file_scenario_default_params() {
        let codec = FileCodec::new();
        let blob = codec.encrypt(b"", &pw("correct-horse")).unwrap();
        assert_eq!(blob.len(), 44);

        let decrypted = codec.decrypt(&blob, &pw("correct-horse")).unwrap();
        assert!(decrypted.is_empty());

        let wrong = codec.decrypt(&blob, &pw("wrong-password"));
        assert_eq!(wrong, Err(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn test_encrypted_size() {
        let plaintext = vec![7u8; 1000];
        let blob = codec().encrypt(&plaintext, &pw("pw")).unwrap();

        // salt (16) + nonce (12) + plaintext (1000) + tag (16)
        assert_eq!(blob.len(), 16 + 12 + 1000 + 16);
    }

    #[test]
    fn test_fresh_salt_and_nonce_each_time() {
        let blob1 = codec().encrypt(b"same message", &pw("pw")).unwrap();
        let blob2 = codec().encrypt(b"same message", &pw("pw")).unwrap();

        assert_ne!(blob1, blob2);
        let p1 = BlobParts::parse(&blob1).unwrap();
        let p2 = BlobParts::parse(&blob2).unwrap();
        assert_ne!(p1.salt, p2.salt, "salt must be fresh per blob");
        assert_ne!(p1.nonce, p2.nonce, "nonce must be fresh per blob");
    }

    #[test]
    fn test_decrypt_wrong_password() {
        let blob = codec().encrypt(b"secret data", &pw("password-a")).unwrap();
        let result = codec().decrypt(&blob, &pw("password-b"));

        assert_eq!(result, Err(CryptoError::AuthenticationFailure));
    }

    #[test]
    fn test_decrypt_wrong_params() {
        let blob = codec().encrypt(b"secret data", &pw("pw")).unwrap();
        let other = FileCodec::with_params(KdfParams { iterations: 1_001 });

        assert_eq!(
            other.decrypt(&blob, &pw("pw")),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_every_single_bit_flip_is_detected() {
        let blob = codec().encrypt(b"abcd", &pw("pw")).unwrap();

        for byte in 0..blob.len() {
            for bit in 0..8 {
                let mut tampered = blob.clone();
                tampered[byte] ^= 1 << bit;
                assert_eq!(
                    codec().decrypt(&tampered, &pw("pw")),
                    Err(CryptoError::AuthenticationFailure),
                    "flip at byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn test_truncated_tag_fails_authentication() {
        let blob = codec().encrypt(b"some plaintext", &pw("pw")).unwrap();
        let truncated = &blob[..blob.len() - 1];

        assert_eq!(
            codec().decrypt(truncated, &pw("pw")),
            Err(CryptoError::AuthenticationFailure)
        );
    }

    #[test]
    fn test_short_blob_is_malformed() {
        for len in 0..BLOB_OVERHEAD {
            let blob = vec![0u8; len];
            assert_eq!(
                codec().decrypt(&blob, &pw("pw")),
                Err(CryptoError::MalformedBlob { len })
            );
        }
    }

    #[test]
    fn test_short_blob_checked_before_password() {
        // Empty password would be InvalidArgument, but framing is checked first.
        assert_eq!(
            codec().decrypt(&[0u8; 10], &pw("")),
            Err(CryptoError::MalformedBlob { len: 10 })
        );
    }

    #[test]
    fn test_empty_password_rejected() {
        assert!(matches!(
            codec().encrypt(b"data", &pw("")),
            Err(CryptoError::InvalidArgument(_))
        ));
        let blob = codec().encrypt(b"data", &pw("pw")).unwrap();
        assert!(matches!(
            codec().decrypt(&blob, &pw("")),
            Err(CryptoError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_blob_parts() {
        let blob = codec().encrypt(b"twelve bytes", &pw("pw")).unwrap();
        let parts = BlobParts::parse(&blob).unwrap();

        assert_eq!(parts.salt, &blob[..16]);
        assert_eq!(parts.nonce, &blob[16..28]);
        assert_eq!(parts.sealed, &blob[28..]);
        assert_eq!(parts.plaintext_len(), 12);
    }

    #[test]
    fn test_codec_is_shareable_across_threads() {
        let codec = codec();
        let handles: Vec<_> = (0..4u8)
            .map(|i| {
                std::thread::spawn(move || {
                    let data = vec![i; 100];
                    let blob = codec.encrypt(&data, &SecretString::from("pw")).unwrap();
                    codec.decrypt(&blob, &SecretString::from("pw")).unwrap() == data
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }
    }
}
