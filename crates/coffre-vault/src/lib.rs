//! coffre-vault: the layer between callers and the codec + stores
//!
//!   - `upload`: policy check → encrypt → blob put → metadata record
//!   - `download`: metadata lookup → blob get → decrypt → display name
//!   - `list` / `delete`: owner-scoped record listing and removal
//!
//! PBKDF2 runs on the blocking pool; storage I/O stays on the async runtime.

pub mod engine;
pub mod error;

pub use engine::{DownloadResult, UploadRequest, UploadResult, Vault, DEFAULT_MIME_TYPE};
pub use error::{VaultError, VaultResult};
