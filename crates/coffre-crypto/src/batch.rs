//! Parallel encryption of independent buffers
//!
//! Each item gets its own salt, nonce and derived key, so items share nothing
//! but the password and can be processed on any rayon worker in any order.
//! Results are returned in input order; one failure does not abort the rest.

use rayon::prelude::*;
use secrecy::SecretString;

use crate::codec::FileCodec;
use crate::error::CryptoResult;

/// Encrypt every buffer in `items` on the current rayon pool.
pub fn encrypt_batch<T>(
    codec: &FileCodec,
    items: &[T],
    password: &SecretString,
) -> Vec<CryptoResult<Vec<u8>>>
where
    T: AsRef<[u8]> + Sync,
{
    items
        .par_iter()
        .map(|item| codec.encrypt(item.as_ref(), password))
        .collect()
}

/// Decrypt every blob in `blobs` on the current rayon pool.
pub fn decrypt_batch<T>(
    codec: &FileCodec,
    blobs: &[T],
    password: &SecretString,
) -> Vec<CryptoResult<Vec<u8>>>
where
    T: AsRef<[u8]> + Sync,
{
    blobs
        .par_iter()
        .map(|blob| codec.decrypt(blob.as_ref(), password))
        .collect()
}
