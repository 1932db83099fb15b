//! Render output storage.
//!
//! Workers upload one image per job (`<job id>.png`) to an S3-compatible bucket.
//! Resetting a job deletes that image so the next render starts clean. This crate
//! wraps `object_store` so the same code drives:
//! - S3-compatible storage (Wasabi, MinIO, AWS) in production
//! - On-disk storage for local dev
//! - In-memory storage for tests

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use object_store::ObjectStore;
use object_store::ObjectStoreExt;
use object_store::path::Path;
use queue_core::JobId;

/// Endpoint used when the S3 backend is selected without `RENDER_ENDPOINT`.
pub const DEFAULT_S3_ENDPOINT: &str = "https://s3.eu-west-2.wasabisys.com";
const DEFAULT_REGION: &str = "eu-west-2";
const DEFAULT_FS_ROOT: &str = "./data/renders";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::S3 => "s3",
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: String,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

#[derive(Debug, Clone)]
pub enum RenderBackend {
    S3(S3Config),
    Filesystem { root: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct RenderStoreConfig {
    pub backend: RenderBackend,
    /// Folder inside the bucket holding the renders, e.g. `simtest4`.
    pub prefix: Option<String>,
}

impl RenderStoreConfig {
    pub fn memory() -> Self {
        Self {
            backend: RenderBackend::Memory,
            prefix: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: RenderBackend::Filesystem { root: root.into() },
            prefix: None,
        }
    }

    pub fn s3(cfg: S3Config) -> Self {
        Self {
            backend: RenderBackend::S3(cfg),
            prefix: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = non_empty(prefix.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// - `RENDER_STORE_BACKEND`: `s3`, `filesystem` or `memory` (default: filesystem)
    /// - `RENDER_FS_ROOT` (default: `./data/renders`)
    /// - `RENDER_BUCKET` (required for s3)
    /// - `RENDER_REGION` (default: `eu-west-2`)
    /// - `RENDER_ENDPOINT` (default: the Wasabi eu-west-2 endpoint)
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` (optional)
    /// - `RENDER_PREFIX` (optional key prefix)
    pub fn from_env() -> Result<Self, StorageError> {
        let prefix = env_non_empty("RENDER_PREFIX");

        let cfg = match env_non_empty("RENDER_STORE_BACKEND").as_deref() {
            Some("s3") => Self::s3(read_s3_config()?),
            Some("memory") | Some("mem") => Self::memory(),
            Some("filesystem") | Some("fs") | None => Self::filesystem(
                env_non_empty("RENDER_FS_ROOT").unwrap_or_else(|| DEFAULT_FS_ROOT.to_string()),
            ),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported RENDER_STORE_BACKEND={other} (expected s3|filesystem|memory)"
                )));
            }
        };

        Ok(Self { prefix, ..cfg })
    }
}

/// What happened when a render was removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    /// No render existed for the job.
    Missing,
}

#[derive(Clone)]
pub struct RenderStore {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
}

impl std::fmt::Debug for RenderStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderStore")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .finish()
    }
}

impl RenderStore {
    pub async fn new(cfg: RenderStoreConfig) -> Result<Self, StorageError> {
        let (kind, store) = match cfg.backend {
            RenderBackend::S3(s3) => (StorageKind::S3, Arc::new(build_s3(s3)?) as _),
            RenderBackend::Filesystem { root } => {
                ensure_dir(&root)?;
                let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                (StorageKind::Filesystem, Arc::new(fs) as _)
            }
            RenderBackend::Memory => {
                let mem = object_store::memory::InMemory::new();
                (StorageKind::Memory, Arc::new(mem) as _)
            }
        };

        tracing::info!("Render storage backend: {}", kind.as_str());

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(non_empty),
        })
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// Full object key of a job's render, including the prefix.
    pub fn render_key(&self, job_id: JobId) -> String {
        let file_name = job_id.render_file_name();
        match self.prefix.as_deref().map(|p| p.trim_matches('/')) {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}/{file_name}"),
            _ => file_name,
        }
    }

    fn render_path(&self, job_id: JobId) -> Path {
        Path::from(self.render_key(job_id))
    }

    /// Upload a job's render.
    pub async fn put_render(&self, job_id: JobId, bytes: Bytes) -> Result<(), StorageError> {
        let path = self.render_path(job_id);
        self.store
            .put(&path, object_store::PutPayload::from(bytes))
            .await?;
        Ok(())
    }

    pub async fn render_exists(&self, job_id: JobId) -> Result<bool, StorageError> {
        match self.store.head(&self.render_path(job_id)).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    /// Delete a job's render if one exists.
    ///
    /// S3 deletes succeed for absent keys, so existence is checked first to
    /// report [`DeleteOutcome::Missing`] faithfully.
    pub async fn delete_render(&self, job_id: JobId) -> Result<DeleteOutcome, StorageError> {
        if !self.render_exists(job_id).await? {
            return Ok(DeleteOutcome::Missing);
        }
        self.store.delete(&self.render_path(job_id)).await?;
        Ok(DeleteOutcome::Deleted)
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(non_empty)
}

fn read_s3_config() -> Result<S3Config, StorageError> {
    let bucket = env_non_empty("RENDER_BUCKET").ok_or_else(|| {
        StorageError::InvalidConfig("RENDER_BUCKET is required for s3 backend".into())
    })?;

    Ok(S3Config {
        bucket,
        region: env_non_empty("RENDER_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
        endpoint: env_non_empty("RENDER_ENDPOINT")
            .unwrap_or_else(|| DEFAULT_S3_ENDPOINT.to_string()),
        access_key_id: env_non_empty("AWS_ACCESS_KEY_ID"),
        secret_access_key: env_non_empty("AWS_SECRET_ACCESS_KEY"),
    })
}

fn build_s3(cfg: S3Config) -> Result<object_store::aws::AmazonS3, StorageError> {
    let allow_http = cfg.endpoint.trim_start().starts_with("http://");

    let mut builder = object_store::aws::AmazonS3Builder::new()
        .with_bucket_name(cfg.bucket)
        .with_region(cfg.region)
        .with_endpoint(cfg.endpoint)
        .with_allow_http(allow_http);

    if let Some(access_key_id) = cfg.access_key_id {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = cfg.secret_access_key {
        builder = builder.with_secret_access_key(secret_access_key);
    }

    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::disallowed_methods)]

    use super::*;

    #[tokio::test]
    async fn render_keys_use_job_id_and_prefix() -> Result<(), StorageError> {
        let plain = RenderStore::new(RenderStoreConfig::memory()).await?;
        assert_eq!(plain.render_key(JobId(42)), "42.png");

        let prefixed =
            RenderStore::new(RenderStoreConfig::memory().with_prefix("/simtest4/")).await?;
        assert_eq!(prefixed.render_key(JobId(42)), "simtest4/42.png");
        Ok(())
    }

    #[tokio::test]
    async fn delete_reports_missing_then_deleted() -> Result<(), StorageError> {
        let store = RenderStore::new(RenderStoreConfig::memory()).await?;
        assert_eq!(store.delete_render(JobId(1)).await?, DeleteOutcome::Missing);

        store.put_render(JobId(1), Bytes::from("png")).await?;
        assert!(store.render_exists(JobId(1)).await?);
        assert_eq!(store.delete_render(JobId(1)).await?, DeleteOutcome::Deleted);
        assert!(!store.render_exists(JobId(1)).await?);
        Ok(())
    }

    #[tokio::test]
    async fn filesystem_backend_deletes_files() -> Result<(), StorageError> {
        let dir = tempfile::tempdir()?;
        let store =
            RenderStore::new(RenderStoreConfig::filesystem(dir.path()).with_prefix("renders"))
                .await?;

        store.put_render(JobId(7), Bytes::from("png")).await?;
        assert!(dir.path().join("renders").join("7.png").exists());

        assert_eq!(store.delete_render(JobId(7)).await?, DeleteOutcome::Deleted);
        assert!(!dir.path().join("renders").join("7.png").exists());
        assert_eq!(store.delete_render(JobId(8)).await?, DeleteOutcome::Missing);
        Ok(())
    }
}
