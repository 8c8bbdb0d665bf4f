// src/file_gateway.rs
//
// FileSystemGateway: StorageGateway over a local directory tree.
//
// Layout:
// - `file:///srv/store` is the root
// - bucket `b` is the directory `/srv/store/b`
// - object `dir/k.bin` in bucket `b` is the file `/srv/store/b/dir/k.bin`

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::trace;

use crate::gateway::{check_declared_size, ObjectReader, StorageGateway};

#[derive(Debug, Clone)]
pub struct FileSystemGateway {
    root: PathBuf,
}

impl FileSystemGateway {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Build from a `file://` URI.
    pub fn from_uri(uri: &str) -> Result<Self> {
        let Some(path) = uri.strip_prefix("file://") else {
            bail!("FileSystemGateway expects file:// URI, got: {}", uri);
        };
        if path.is_empty() {
            bail!("FileSystemGateway URI has no root path: {}", uri);
        }
        Ok(Self::new(path))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // Names must stay inside their bucket directory.
    fn relative(kind: &str, name: &str) -> Result<PathBuf> {
        let path = Path::new(name);
        if name.is_empty()
            || !path.components().all(|c| matches!(c, Component::Normal(_)))
        {
            bail!("invalid {} name '{}'", kind, name);
        }
        Ok(path.to_path_buf())
    }

    fn bucket_path(&self, bucket: &str) -> Result<PathBuf> {
        let rel = Self::relative("bucket", bucket)?;
        if rel.components().count() != 1 {
            bail!("invalid bucket name '{}'", bucket);
        }
        Ok(self.root.join(rel))
    }

    fn object_path(&self, bucket: &str, name: &str) -> Result<PathBuf> {
        Ok(self.bucket_path(bucket)?.join(Self::relative("object", name)?))
    }

    async fn require_bucket(&self, bucket: &str) -> Result<PathBuf> {
        let path = self.bucket_path(bucket)?;
        if !self.bucket_exists(bucket).await? {
            bail!("bucket '{}' does not exist", bucket);
        }
        Ok(path)
    }
}

#[async_trait]
impl StorageGateway for FileSystemGateway {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        let path = self.bucket_path(bucket)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_dir() => Ok(true),
            Ok(_) => bail!("Path is not a directory: {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e).with_context(|| format!("stat {}", path.display())),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let path = self.bucket_path(bucket)?;
        if self.bucket_exists(bucket).await? {
            bail!("bucket '{}' already exists", bucket);
        }
        fs::create_dir_all(&path)
            .await
            .with_context(|| format!("create directory {}", path.display()))?;
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let path = self.require_bucket(bucket).await?;
        // Only removes empty directories
        fs::remove_dir(&path)
            .await
            .with_context(|| format!("remove directory {}", path.display()))?;
        Ok(())
    }

    async fn open_object(&self, bucket: &str, name: &str) -> Result<ObjectReader> {
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, name)?;
        trace!("Opening {}", path.display());
        let file = fs::File::open(&path)
            .await
            .with_context(|| format!("File not found: {}", path.display()))?;
        Ok(Box::pin(file))
    }

    async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<()> {
        check_declared_size(name, &body, size)?;
        self.require_bucket(bucket).await?;
        let path = self.object_path(bucket, name)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &body)
            .await
            .with_context(|| format!("write {}", path.display()))?;
        Ok(())
    }
}
