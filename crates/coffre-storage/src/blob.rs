//! Blob store: a byte-array container addressed by opaque path
//!
//! Progress, resumable uploads and retries belong to the OpenDAL layers
//! configured on the operator, never to callers of this type.

use anyhow::{Context, Result};
use opendal::Operator;
use std::fmt;
use tracing::debug;

/// Handle returned by [`BlobStore::put`]; the blob's path in the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobHandle(String);

impl BlobHandle {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    pub fn path(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone)]
pub struct BlobStore {
    op: Operator,
}

impl BlobStore {
    pub fn new(op: Operator) -> Self {
        Self { op }
    }

    pub fn operator(&self) -> &Operator {
        &self.op
    }

    /// Store `bytes` at `path`, replacing any existing blob there.
    pub async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<BlobHandle> {
        let len = bytes.len();
        self.op
            .write(path, bytes)
            .await
            .with_context(|| format!("writing blob: {path}"))?;
        debug!(path, len, "blob stored");
        Ok(BlobHandle::new(path))
    }

    /// Fetch the blob bytes exactly as they were stored.
    pub async fn get(&self, handle: &BlobHandle) -> Result<Vec<u8>> {
        let buf = self
            .op
            .read(handle.path())
            .await
            .with_context(|| format!("reading blob: {handle}"))?;
        Ok(buf.to_vec())
    }

    pub async fn delete(&self, handle: &BlobHandle) -> Result<()> {
        self.op
            .delete(handle.path())
            .await
            .with_context(|| format!("deleting blob: {handle}"))?;
        debug!(path = handle.path(), "blob deleted");
        Ok(())
    }

    pub async fn exists(&self, handle: &BlobHandle) -> Result<bool> {
        self.op
            .exists(handle.path())
            .await
            .with_context(|| format!("checking blob: {handle}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_store() -> BlobStore {
        BlobStore::new(
            Operator::new(opendal::services::Memory::default())
                .expect("memory operator")
                .finish(),
        )
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = memory_store();
        let data = vec![0u8, 1, 2, 255, 254];

        let handle = store.put("users/a/1_x.bin.encrypted", data.clone()).await.unwrap();
        assert_eq!(handle.path(), "users/a/1_x.bin.encrypted");
        assert_eq!(store.get(&handle).await.unwrap(), data);
    }

    #[tokio::test]
    async fn test_put_empty_blob() {
        let store = memory_store();
        let handle = store.put("empty", Vec::new()).await.unwrap();
        assert!(store.get(&handle).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete() {
        let store = memory_store();
        let handle = store.put("gone", vec![1, 2, 3]).await.unwrap();
        assert!(store.exists(&handle).await.unwrap());

        store.delete(&handle).await.unwrap();
        assert!(!store.exists(&handle).await.unwrap());
        assert!(store.get(&handle).await.is_err());
    }

    #[tokio::test]
    async fn test_get_missing_fails() {
        let store = memory_store();
        assert!(store.get(&BlobHandle::new("nope")).await.is_err());
    }
}
