// src/memory_gateway.rs
//
// In-process StorageGateway: buckets and objects held in a locked map.
// Useful for embedding and for exercising the bulk paths without a server.

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::sync::{Mutex, MutexGuard};

use crate::gateway::{check_declared_size, ObjectReader, StorageGateway};

type Buckets = HashMap<String, BTreeMap<String, Bytes>>;

#[derive(Debug, Default)]
pub struct MemoryGateway {
    buckets: Mutex<Buckets>,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    fn buckets(&self) -> MutexGuard<'_, Buckets> {
        self.buckets.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Create `bucket` (if needed) and store `data` under `name`, bypassing size checks.
    pub fn insert_object(&self, bucket: &str, name: &str, data: impl Into<Bytes>) {
        self.buckets()
            .entry(bucket.to_string())
            .or_default()
            .insert(name.to_string(), data.into());
    }

    pub fn object(&self, bucket: &str, name: &str) -> Option<Bytes> {
        self.buckets().get(bucket).and_then(|b| b.get(name).cloned())
    }

    /// Object names in `bucket`, sorted; empty if the bucket is absent.
    pub fn object_names(&self, bucket: &str) -> Vec<String> {
        self.buckets()
            .get(bucket)
            .map(|b| b.keys().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StorageGateway for MemoryGateway {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        Ok(self.buckets().contains_key(bucket))
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets();
        if buckets.contains_key(bucket) {
            bail!("bucket '{}' already exists", bucket);
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        let mut buckets = self.buckets();
        match buckets.get(bucket) {
            None => bail!("bucket '{}' does not exist", bucket),
            Some(objects) if !objects.is_empty() => {
                bail!("bucket '{}' is not empty ({} objects)", bucket, objects.len())
            }
            Some(_) => {
                buckets.remove(bucket);
                Ok(())
            }
        }
    }

    async fn open_object(&self, bucket: &str, name: &str) -> Result<ObjectReader> {
        let buckets = self.buckets();
        let Some(objects) = buckets.get(bucket) else {
            bail!("bucket '{}' does not exist", bucket);
        };
        match objects.get(name) {
            Some(data) => Ok(Box::pin(Cursor::new(data.clone()))),
            None => bail!("object '{}/{}' does not exist", bucket, name),
        }
    }

    async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<()> {
        check_declared_size(name, &body, size)?;
        let mut buckets = self.buckets();
        let Some(objects) = buckets.get_mut(bucket) else {
            bail!("bucket '{}' does not exist", bucket);
        };
        objects.insert(name.to_string(), body);
        Ok(())
    }
}
