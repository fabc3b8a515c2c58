//! Vault engine: upload, download, list and delete encrypted files
//!
//! Each upload produces exactly one blob at
//! `{prefix}/{owner}/{unix_millis}_{name}.encrypted` and one metadata record.
//! If the record cannot be written the blob is removed again, so the blob
//! store never holds a file the index does not know about.

use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info, warn};

use coffre_core::config::CoffreConfig;
use coffre_core::types::{FileRecord, NewRecord, RecordId};
use coffre_core::PasswordPolicy;
use coffre_crypto::{append_suffix, encrypt_batch, strip_suffix, BlobParts, FileCodec};
use coffre_storage::{BlobHandle, BlobStore, MetadataStore};

use crate::error::{VaultError, VaultResult};

/// MIME type recorded when the caller does not supply one
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// A file to be encrypted and stored
#[derive(Debug, Clone)]
pub struct UploadRequest {
    /// Display filename, e.g. `report.pdf`
    pub file_name: String,
    pub mime_type: Option<String>,
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: None,
            data,
        }
    }

    pub fn with_mime_type(mut self, mime_type: impl Into<String>) -> Self {
        self.mime_type = Some(mime_type.into());
        self
    }
}

/// Result of uploading a single file
#[derive(Debug, Clone)]
pub struct UploadResult {
    pub id: RecordId,
    pub file_name: String,
    pub storage_path: String,
    /// Plaintext size
    pub size: u64,
    /// Stored blob size (plaintext + 44)
    pub blob_len: u64,
}

/// Result of downloading a single file
#[derive(Debug, Clone)]
pub struct DownloadResult {
    pub id: RecordId,
    /// Display name with the `.encrypted` suffix stripped
    pub file_name: String,
    pub mime_type: String,
    pub data: Vec<u8>,
}

pub struct Vault {
    blobs: BlobStore,
    codec: FileCodec,
    policy: PasswordPolicy,
    owner: String,
    prefix: String,
    pool: Option<Arc<rayon::ThreadPool>>,
}

impl Vault {
    pub fn new(blobs: BlobStore, owner: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            blobs,
            codec: FileCodec::new(),
            policy: PasswordPolicy::default(),
            owner: owner.into(),
            prefix: prefix.into().trim_matches('/').to_string(),
            pool: None,
        }
    }

    /// Vault for the configured owner, prefix, policy and worker count.
    pub fn from_config(config: &CoffreConfig, blobs: BlobStore) -> VaultResult<Self> {
        config.validate()?;
        Self::new(blobs, &config.vault.owner, &config.vault.prefix)
            .with_policy(PasswordPolicy::from(&config.policy))
            .with_workers(config.vault.workers)
    }

    /// Replace the codec (tests and benchmarks use cheaper KDF parameters).
    pub fn with_codec(mut self, codec: FileCodec) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_policy(mut self, policy: PasswordPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Dedicated rayon pool for batch encryption. 0 = rayon's global pool.
    pub fn with_workers(mut self, workers: usize) -> VaultResult<Self> {
        self.pool = if workers == 0 {
            None
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("coffre-crypt-{i}"))
                .build()
                .map_err(|e| VaultError::InvalidRequest(format!("building worker pool: {e}")))?;
            Some(Arc::new(pool))
        };
        Ok(self)
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn blobs(&self) -> &BlobStore {
        &self.blobs
    }

    /// Encrypt and store one file, then record it in `index`.
    pub async fn upload<M: MetadataStore>(
        &self,
        index: &mut M,
        request: UploadRequest,
        password: &SecretString,
    ) -> VaultResult<UploadResult> {
        self.policy.check(password)?;
        validate_name(&request.file_name)?;

        let codec = self.codec;
        let secret = owned_secret(password);
        let UploadRequest {
            file_name,
            mime_type,
            data,
        } = request;
        let size = data.len() as u64;

        let blob = tokio::task::spawn_blocking(move || codec.encrypt(&data, &secret)).await??;

        self.store(index, file_name, mime_type, size, blob).await
    }

    /// Encrypt many files in parallel, then store them one by one.
    ///
    /// Returns one result per request, in request order. A failed item does
    /// not stop the others; a policy violation fails the whole batch up front.
    pub async fn upload_batch<M: MetadataStore>(
        &self,
        index: &mut M,
        requests: Vec<UploadRequest>,
        password: &SecretString,
    ) -> VaultResult<Vec<VaultResult<UploadResult>>> {
        self.policy.check(password)?;

        let codec = self.codec;
        let secret = owned_secret(password);
        let pool = self.pool.clone();
        let (metas, payloads): (Vec<_>, Vec<_>) = requests
            .into_iter()
            .map(|r| ((r.file_name, r.mime_type, r.data.len() as u64), r.data))
            .unzip();

        let sealed = tokio::task::spawn_blocking(move || match pool {
            Some(pool) => pool.install(|| encrypt_batch(&codec, &payloads, &secret)),
            None => encrypt_batch(&codec, &payloads, &secret),
        })
        .await?;

        let mut results = Vec::with_capacity(metas.len());
        for ((file_name, mime_type, size), blob) in metas.into_iter().zip(sealed) {
            let result = match validate_name(&file_name) {
                Err(e) => Err(e),
                Ok(()) => match blob {
                    Ok(blob) => self.store(index, file_name, mime_type, size, blob).await,
                    Err(e) => Err(VaultError::Crypto(e)),
                },
            };
            if let Err(e) = &result {
                warn!("batch item failed: {e}");
            }
            results.push(result);
        }
        Ok(results)
    }

    async fn store<M: MetadataStore>(
        &self,
        index: &mut M,
        file_name: String,
        mime_type: Option<String>,
        size: u64,
        blob: Vec<u8>,
    ) -> VaultResult<UploadResult> {
        let stored_name = append_suffix(&sanitize_name(&file_name));
        let storage_path = self.free_path(&stored_name).await?;
        let blob_len = blob.len() as u64;

        let handle = self
            .blobs
            .put(&storage_path, blob)
            .await
            .map_err(VaultError::Storage)?;

        let record = NewRecord {
            owner_id: self.owner.clone(),
            file_name: file_name.clone(),
            stored_name,
            storage_path: storage_path.clone(),
            size,
            mime_type: mime_type.unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string()),
            uploaded_at: unix_now().as_secs(),
        };

        let id = match persist(index, record) {
            Ok(id) => id,
            Err(e) => {
                if let Err(cleanup) = self.blobs.delete(&handle).await {
                    warn!(path = %handle, "could not remove orphaned blob: {cleanup:#}");
                }
                return Err(VaultError::Metadata(e));
            }
        };

        info!(id = %id, path = %storage_path, size, blob_len, "uploaded");
        Ok(UploadResult {
            id,
            file_name,
            storage_path,
            size,
            blob_len,
        })
    }

    /// Fetch and decrypt a stored file.
    ///
    /// A wrong password and a corrupted blob both surface as
    /// `CryptoError::AuthenticationFailure`.
    pub async fn download<M: MetadataStore>(
        &self,
        index: &M,
        id: &RecordId,
        password: &SecretString,
    ) -> VaultResult<DownloadResult> {
        let record = self.owned_record(index, id)?;
        let handle = BlobHandle::new(record.meta.storage_path.as_str());

        let blob = self.blobs.get(&handle).await.map_err(VaultError::Storage)?;
        if let Ok(parts) = BlobParts::parse(&blob) {
            if parts.plaintext_len() as u64 != record.meta.size {
                warn!(
                    id = %id,
                    recorded = record.meta.size,
                    stored = parts.plaintext_len(),
                    "stored blob size disagrees with metadata"
                );
            }
        }

        let codec = self.codec;
        let secret = owned_secret(password);
        let data = tokio::task::spawn_blocking(move || codec.decrypt(&blob, &secret)).await??;

        info!(id = %id, size = data.len(), "downloaded");
        Ok(DownloadResult {
            id: record.id,
            file_name: strip_suffix(&record.meta.stored_name).to_string(),
            mime_type: record.meta.mime_type,
            data,
        })
    }

    /// Records owned by this vault's owner, newest first.
    pub fn list<M: MetadataStore>(&self, index: &M) -> Vec<FileRecord> {
        index
            .query()
            .into_iter()
            .filter(|r| r.meta.owner_id == self.owner)
            .collect()
    }

    /// Delete the blob, then its record.
    pub async fn delete<M: MetadataStore>(&self, index: &mut M, id: &RecordId) -> VaultResult<()> {
        let record = self.owned_record(index, id)?;
        let handle = BlobHandle::new(record.meta.storage_path.as_str());

        self.blobs.delete(&handle).await.map_err(VaultError::Storage)?;
        index.delete(id).map_err(VaultError::Metadata)?;
        index.flush().map_err(VaultError::Metadata)?;

        info!(id = %id, path = %handle, "deleted");
        Ok(())
    }

    fn owned_record<M: MetadataStore>(&self, index: &M, id: &RecordId) -> VaultResult<FileRecord> {
        index
            .get(id)
            .filter(|r| r.meta.owner_id == self.owner)
            .cloned()
            .ok_or_else(|| VaultError::NotFound(id.clone()))
    }

    /// `{prefix}/{owner}/{millis}_{stored_name}`, bumping the timestamp until
    /// the path is unused so two uploads never overwrite each other.
    async fn free_path(&self, stored_name: &str) -> VaultResult<String> {
        let mut millis = unix_now().as_millis();
        loop {
            let path = format!("{}/{}/{}_{}", self.prefix, self.owner, millis, stored_name);
            let taken = self
                .blobs
                .exists(&BlobHandle::new(path.as_str()))
                .await
                .map_err(VaultError::Storage)?;
            if !taken {
                return Ok(path);
            }
            debug!(path = %path, "storage path taken, bumping timestamp");
            millis += 1;
        }
    }
}

/// Insert and flush; a record that cannot be flushed is dropped again.
fn persist<M: MetadataStore>(index: &mut M, record: NewRecord) -> anyhow::Result<RecordId> {
    let id = index.put(record)?;
    if let Err(e) = index.flush() {
        if let Err(rollback) = index.delete(&id) {
            warn!(id = %id, "could not drop unflushed record: {rollback:#}");
        }
        return Err(e);
    }
    Ok(id)
}

fn validate_name(file_name: &str) -> VaultResult<()> {
    if file_name.trim().is_empty() {
        return Err(VaultError::InvalidRequest("file name must not be empty".into()));
    }
    Ok(())
}

/// Path separators would let a display name escape the owner directory.
fn sanitize_name(file_name: &str) -> String {
    file_name.replace(['/', '\\'], "_")
}

fn owned_secret(password: &SecretString) -> SecretString {
    SecretString::from(password.expose_secret().to_owned())
}

fn unix_now() -> std::time::Duration {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_name() {
        assert_eq!(sanitize_name("report.pdf"), "report.pdf");
        assert_eq!(sanitize_name("../../etc/passwd"), ".._.._etc_passwd");
        assert_eq!(sanitize_name("a\\b"), "a_b");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("x").is_ok());
        assert!(matches!(validate_name(""), Err(VaultError::InvalidRequest(_))));
        assert!(matches!(validate_name("   "), Err(VaultError::InvalidRequest(_))));
    }

    #[test]
    fn test_owned_secret_copies_value() {
        let original = SecretString::from("pw");
        assert_eq!(owned_secret(&original).expose_secret(), "pw");
    }
}
