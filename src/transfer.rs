// src/transfer.rs
//
// Single-object transfers run by each bulk worker.
// Download: gateway stream -> fresh in-memory buffer.
// Upload:   byte source -> in-memory buffer -> gateway put with declared size.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;

use crate::gateway::{ObjectReader, StorageGateway};

/// Something an upload can read its payload from.
#[async_trait]
pub trait ByteSource: Send + Sync {
    async fn open(&self) -> Result<ObjectReader>;
}

/// A local file, opened when the upload runs.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ByteSource for FileSource {
    async fn open(&self) -> Result<ObjectReader> {
        let file = tokio::fs::File::open(&self.path)
            .await
            .with_context(|| format!("open {}", self.path.display()))?;
        Ok(Box::pin(file))
    }
}

/// An in-memory payload.
#[derive(Debug, Clone)]
pub struct BytesSource(Bytes);

impl BytesSource {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }
}

#[async_trait]
impl ByteSource for BytesSource {
    async fn open(&self) -> Result<ObjectReader> {
        Ok(Box::pin(Cursor::new(self.0.clone())))
    }
}

/// One file to upload: object name, payload source and declared size.
pub struct UploadItem {
    pub name: String,
    pub source: Box<dyn ByteSource>,
    pub size: u64,
}

impl UploadItem {
    pub fn new(name: impl Into<String>, source: impl ByteSource + 'static, size: u64) -> Self {
        Self {
            name: name.into(),
            source: Box::new(source),
            size,
        }
    }

    /// In-memory item whose declared size is the buffer length.
    pub fn from_bytes(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        let size = data.len() as u64;
        Self::new(name, BytesSource(data), size)
    }

    /// Local file item: object name is the file name, size from metadata.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("no usable file name in {}", path.display()))?
            .to_string();
        let meta = tokio::fs::metadata(path)
            .await
            .with_context(|| format!("stat {}", path.display()))?;
        Ok(Self::new(name, FileSource::new(path), meta.len()))
    }
}

impl std::fmt::Debug for UploadItem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadItem")
            .field("name", &self.name)
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

// Declared sizes are caller-supplied; don't trust them for more than this up front.
const MAX_PREALLOC: u64 = 64 * 1024 * 1024;

async fn read_all(mut reader: ObjectReader, size_hint: u64) -> std::io::Result<Bytes> {
    let mut buf = Vec::with_capacity(size_hint.min(MAX_PREALLOC) as usize);
    reader.read_to_end(&mut buf).await?;
    Ok(Bytes::from(buf))
}

/// Fetch `bucket/name` fully into memory.
pub async fn download_object(gateway: &dyn StorageGateway, bucket: &str, name: &str) -> Result<Bytes> {
    let reader = gateway.open_object(bucket, name).await?;
    read_all(reader, 0)
        .await
        .with_context(|| format!("reading body of '{bucket}/{name}'"))
}

/// Buffer `item`'s source and store it as `bucket/item.name`.
pub async fn upload_object(gateway: &dyn StorageGateway, bucket: &str, item: &UploadItem) -> Result<()> {
    let reader = item
        .source
        .open()
        .await
        .with_context(|| format!("opening source for '{}'", item.name))?;
    let body = read_all(reader, item.size)
        .await
        .with_context(|| format!("reading source for '{}'", item.name))?;
    gateway.put_object(bucket, &item.name, body, item.size).await
}
