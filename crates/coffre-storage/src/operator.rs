//! OpenDAL Operator factory for coffre blob backends

use anyhow::{Context, Result};
use opendal::Operator;

use coffre_core::config::{expand_tilde, StorageBackend, StorageConfig};

/// Access keys for the S3 backend
#[derive(Clone)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"[REDACTED]")
            .finish()
    }
}

impl S3Credentials {
    /// Read AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY, falling back to the
    /// COFFRE_-prefixed names.
    pub fn from_env() -> Result<Self> {
        let access_key_id = std::env::var("AWS_ACCESS_KEY_ID")
            .or_else(|_| std::env::var("COFFRE_ACCESS_KEY_ID"))
            .context(
                "S3 credentials not set\n\
                 Set AWS_ACCESS_KEY_ID and AWS_SECRET_ACCESS_KEY environment variables.",
            )?;
        let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY")
            .or_else(|_| std::env::var("COFFRE_SECRET_ACCESS_KEY"))
            .context("AWS_SECRET_ACCESS_KEY environment variable not set")?;
        Ok(Self {
            access_key_id,
            secret_access_key,
        })
    }
}

/// Build an OpenDAL Operator for the configured backend.
///
/// `credentials` is only consulted for the S3 backend, where it is required.
/// If `enforce_tls` is true and the S3 endpoint uses HTTP, this returns an
/// error; otherwise a warning is logged.
pub fn build_operator(cfg: &StorageConfig, credentials: Option<&S3Credentials>) -> Result<Operator> {
    let op = match cfg.backend {
        StorageBackend::S3 => {
            let creds = credentials.context("S3 backend requires credentials")?;
            check_endpoint_tls(cfg)?;
            // path-style addressing is the default, which MinIO and SeaweedFS need
            let builder = opendal::services::S3::default()
                .endpoint(&cfg.endpoint)
                .region(&cfg.region)
                .bucket(&cfg.bucket)
                .access_key_id(&creds.access_key_id)
                .secret_access_key(&creds.secret_access_key);
            Operator::new(builder)
                .context("creating OpenDAL S3 operator")?
                .layer(opendal::layers::LoggingLayer::default())
                .layer(
                    opendal::layers::RetryLayer::new()
                        .with_max_times(5)
                        .with_jitter(),
                )
                .finish()
        }
        StorageBackend::Fs => {
            let root = expand_tilde(&cfg.root);
            let builder = opendal::services::Fs::default().root(&root.to_string_lossy());
            Operator::new(builder)
                .with_context(|| format!("creating OpenDAL fs operator at {}", root.display()))?
                .layer(opendal::layers::LoggingLayer::default())
                .finish()
        }
        StorageBackend::Memory => Operator::new(opendal::services::Memory::default())
            .context("creating OpenDAL memory operator")?
            .finish(),
    };

    tracing::debug!(backend = ?cfg.backend, "storage operator ready");
    Ok(op)
}

fn check_endpoint_tls(cfg: &StorageConfig) -> Result<()> {
    if cfg.endpoint.starts_with("http://") {
        if cfg.enforce_tls {
            anyhow::bail!(
                "S3 endpoint uses plaintext HTTP ({}), but enforce_tls is enabled. \
                 Use an HTTPS endpoint or set storage.enforce_tls = false for local development.",
                cfg.endpoint
            );
        }
        tracing::warn!(
            endpoint = %cfg.endpoint,
            "S3 endpoint uses plaintext HTTP; blobs are encrypted but credentials are not"
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> S3Credentials {
        S3Credentials {
            access_key_id: "test-key".into(),
            secret_access_key: "test-secret".into(),
        }
    }

    fn s3(endpoint: &str, enforce_tls: bool) -> StorageConfig {
        StorageConfig {
            backend: StorageBackend::S3,
            endpoint: endpoint.into(),
            enforce_tls,
            ..Default::default()
        }
    }

    #[test]
    fn test_build_s3_http_warning() {
        let result = build_operator(&s3("http://localhost:9000", false), Some(&creds()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_s3_http_enforce_tls() {
        let result = build_operator(&s3("http://insecure:9000", true), Some(&creds()));
        assert!(result.is_err(), "HTTP + enforce_tls must fail");
        assert!(result.unwrap_err().to_string().contains("enforce_tls"));
    }

    #[test]
    fn test_build_s3_https() {
        let result = build_operator(&s3("https://s3.example.com", true), Some(&creds()));
        assert!(result.is_ok());
    }

    #[test]
    fn test_build_s3_requires_credentials() {
        let result = build_operator(&s3("https://s3.example.com", false), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_build_memory() {
        let cfg = StorageConfig {
            backend: StorageBackend::Memory,
            ..Default::default()
        };
        assert!(build_operator(&cfg, None).is_ok());
    }

    #[test]
    fn test_build_fs() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = StorageConfig {
            backend: StorageBackend::Fs,
            root: dir.path().to_path_buf(),
            ..Default::default()
        };
        assert!(build_operator(&cfg, None).is_ok());
    }

    #[test]
    fn test_credentials_debug_redacts_secret() {
        let rendered = format!("{:?}", creds());
        assert!(rendered.contains("test-key"));
        assert!(!rendered.contains("test-secret"));
    }
}
