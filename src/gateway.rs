// src/gateway.rs
//
// Narrow storage interface the bulk orchestrator talks through.
// Backends: s3:// (S3Gateway), file:// (FileSystemGateway), in-process (MemoryGateway)

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A readable object body.
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Bucket and object operations required by the transfer core.
///
/// Every call returns a terminal success or a terminal error; callers never
/// retry. `create_bucket` is not assumed idempotent.
#[async_trait]
pub trait StorageGateway: Send + Sync {
    /// Whether `bucket` exists. An `Err` means the check itself failed.
    async fn bucket_exists(&self, bucket: &str) -> Result<bool>;

    async fn create_bucket(&self, bucket: &str) -> Result<()>;

    async fn delete_bucket(&self, bucket: &str) -> Result<()>;

    /// Open an object for reading.
    async fn open_object(&self, bucket: &str, name: &str) -> Result<ObjectReader>;

    /// Store `body` as `bucket/name`. `size` is the declared length.
    async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<()>;
}

/// Reject a body whose length disagrees with its declared size.
pub(crate) fn check_declared_size(name: &str, body: &Bytes, size: u64) -> Result<()> {
    if body.len() as u64 != size {
        bail!(
            "object '{}': declared size {} does not match body length {}",
            name,
            size,
            body.len()
        );
    }
    Ok(())
}

/// A minimal scheme enum so we can route backend URIs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    S3,
    File,
    Unknown,
}

/// Best-effort scheme inference from a backend URI.
pub fn infer_scheme(uri: &str) -> Scheme {
    if uri.starts_with("s3://") || uri.starts_with("http://") || uri.starts_with("https://") { Scheme::S3 }
    else if uri.starts_with("file://") { Scheme::File }
    else { Scheme::Unknown }
}
