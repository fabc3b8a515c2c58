//! coffre-crypto: client-side file encryption for coffre
//!
//! A file is encrypted into a single self-contained blob before it leaves the
//! machine. The only secret needed to open it again is the password.
//!
//! Blob format (binary, stable):
//! ```text
//! offset  length    field
//! 0       16        salt        (random, per blob)
//! 16      12        nonce       (random, per blob)
//! 28      N + 16    AES-256-GCM ciphertext || tag
//! ```
//!
//! Key = PBKDF2-HMAC-SHA256(password, salt, 100_000 iterations, 32 bytes).
//! No associated data. An empty file encrypts to exactly 44 bytes.

pub mod batch;
pub mod codec;
pub mod error;
pub mod kdf;
pub mod names;

pub use batch::{decrypt_batch, encrypt_batch};
pub use codec::{BlobParts, FileCodec};
pub use error::{CryptoError, CryptoResult};
pub use kdf::{derive_key, derive_key_with_params, DerivedKey, KdfParams};
pub use names::{append_suffix, has_suffix, strip_suffix, ENCRYPTED_SUFFIX};

/// Size of a derived AES-256 key in bytes
pub const KEY_SIZE: usize = 32;

/// Size of the per-blob KDF salt
pub const SALT_SIZE: usize = 16;

/// Size of an AES-GCM nonce (96-bit)
pub const NONCE_SIZE: usize = 12;

/// Size of a GCM authentication tag
pub const TAG_SIZE: usize = 16;

/// Fixed framing overhead of every blob: salt + nonce + tag
pub const BLOB_OVERHEAD: usize = SALT_SIZE + NONCE_SIZE + TAG_SIZE;

/// PBKDF2 work factor baked into the blob format
pub const PBKDF2_ITERATIONS: u32 = 100_000;
