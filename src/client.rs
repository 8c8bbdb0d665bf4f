// src/client.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! Bulk transfer orchestration.
//!
//! Every bulk call walks the same states:
//! `BucketCheck -> (fail | ready) -> fan-out -> join -> (all ok | some failed)`.
//! One tokio task runs per item. Each task writes exactly one entry into the
//! shared result or error accumulator, and the accumulators are only read
//! after every task has been joined. A failing item never cancels its
//! siblings and is never retried.

use anyhow::{anyhow, Context};
use bytes::Bytes;
use futures::FutureExt;
use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tracing::{debug, info, warn};

use crate::accumulator::{BulkError, BulkResult};
use crate::config::{ClientOptions, StorageClientConfig};
use crate::constants::{BULK_DOWNLOAD_ERROR_MSG, BULK_UPLOAD_ERROR_MSG};
use crate::error::TransferError;
use crate::gateway::{ObjectReader, StorageGateway};
use crate::s3_gateway::S3Gateway;
use crate::transfer::{self, UploadItem};

/// Entry point for bulk and single-object transfers against one store.
#[derive(Clone)]
pub struct StorageClient {
    gateway: Arc<dyn StorageGateway>,
    options: ClientOptions,
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run one item's transfer inside its worker: wait for an in-flight slot if a
/// limit is set, and turn a panic into an ordinary per-item error.
async fn run_item<T, F>(limiter: Option<Arc<Semaphore>>, fut: F) -> anyhow::Result<T>
where
    F: Future<Output = anyhow::Result<T>>,
{
    let _permit = match limiter {
        Some(sem) => Some(sem.acquire_owned().await.context("transfer limiter closed")?),
        None => None,
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(res) => res,
        Err(payload) => Err(anyhow!("transfer worker panicked: {}", panic_message(&*payload))),
    }
}

// A worker that dies outside run_item (cancelled, or panicking after its
// transfer) still gets its one outcome: a failure under its item name.
async fn join_all(workers: &mut JoinSet<()>, names: &HashMap<task::Id, String>, errors: &BulkError) {
    while let Some(joined) = workers.join_next().await {
        let Err(e) = joined else { continue };
        match names.get(&e.id()) {
            Some(name) => {
                warn!("transfer worker for '{}' did not complete: {}", name, e);
                errors.add_failure(name.clone(), anyhow!("transfer worker did not complete: {}", e));
            }
            None => warn!("transfer worker did not complete: {}", e),
        }
    }
}

// After join_all no worker holds a clone, so try_unwrap succeeds; fall back to
// draining through the lock rather than failing.
fn into_owned_results(acc: Arc<BulkResult>) -> BulkResult {
    Arc::try_unwrap(acc).unwrap_or_else(|shared| shared.take())
}

fn into_owned_errors(acc: Arc<BulkError>) -> BulkError {
    Arc::try_unwrap(acc).unwrap_or_else(|shared| shared.take())
}

impl StorageClient {
    /// Connect to the S3-compatible endpoint described by `config`.
    pub async fn connect(config: StorageClientConfig) -> Result<Self, TransferError> {
        config.validate()?;
        let gateway = S3Gateway::connect(&config)
            .await
            .map_err(TransferError::Gateway)?;
        info!("Storage client connected to {}", config.endpoint_url());
        Ok(Self::with_gateway(Arc::new(gateway)))
    }

    /// Use any compliant store.
    pub fn with_gateway(gateway: Arc<dyn StorageGateway>) -> Self {
        Self {
            gateway,
            options: ClientOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Result<Self, TransferError> {
        options.validate()?;
        self.options = options;
        Ok(self)
    }

    pub fn gateway(&self) -> &Arc<dyn StorageGateway> {
        &self.gateway
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    fn limiter(&self) -> Option<Arc<Semaphore>> {
        self.options
            .max_in_flight
            .map(|n| Arc::new(Semaphore::new(n)))
    }

    async fn check_bucket(&self, bucket: &str) -> Result<bool, TransferError> {
        debug!("BucketCheck: {}", bucket);
        self.gateway
            .bucket_exists(bucket)
            .await
            .map_err(|source| TransferError::BucketCheck {
                bucket: bucket.to_string(),
                source,
            })
    }

    // -------------------------------------------------------------------------
    // Bulk operations
    // -------------------------------------------------------------------------

    /// Download every named object from `bucket` concurrently.
    ///
    /// Returns all objects or none: if any item fails, the aggregate error is
    /// returned and objects that did download are discarded. A missing bucket
    /// or a failed existence check aborts before any object is requested.
    pub async fn bulk_download<I, S>(&self, bucket: &str, names: I) -> Result<BulkResult, TransferError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        let started = Instant::now();

        if !self.check_bucket(bucket).await? {
            debug!("BucketCheck failed: '{}' not found", bucket);
            return Err(TransferError::BucketNotFound(bucket.to_string()));
        }

        debug!("FanOut: {} downloads from '{}'", names.len(), bucket);
        let results = Arc::new(BulkResult::new());
        let errors = Arc::new(BulkError::new(BULK_DOWNLOAD_ERROR_MSG));
        let limiter = self.limiter();
        let mut workers = JoinSet::new();
        let mut task_names = HashMap::with_capacity(names.len());

        for name in names.iter().cloned() {
            let task_name = name.clone();
            let gateway = Arc::clone(&self.gateway);
            let bucket = bucket.to_string();
            let results = Arc::clone(&results);
            let errors = Arc::clone(&errors);
            let limiter = limiter.clone();

            let handle = workers.spawn(async move {
                let outcome =
                    run_item(limiter, transfer::download_object(gateway.as_ref(), &bucket, &name)).await;
                match outcome {
                    Ok(data) => results.add_success(name, data),
                    Err(e) => {
                        warn!("GET {}/{} failed: {:#}", bucket, name, e);
                        errors.add_failure(name, e);
                    }
                }
            });
            task_names.insert(handle.id(), task_name);
        }

        debug!("Joining {} download workers", names.len());
        join_all(&mut workers, &task_names, &errors).await;

        let errors = into_owned_errors(errors);
        if !errors.is_empty() {
            info!(
                "Bulk download from '{}': {} of {} objects failed in {:.2?}",
                bucket,
                errors.len(),
                names.len(),
                started.elapsed()
            );
            return Err(TransferError::Bulk(errors));
        }

        let results = into_owned_results(results);
        info!(
            "Bulk download from '{}': {} objects, {} bytes in {:.2?}",
            bucket,
            results.len(),
            results.total_bytes(),
            started.elapsed()
        );
        Ok(results)
    }

    /// Upload every item into `bucket` concurrently, creating the bucket first
    /// if it does not exist.
    ///
    /// Items that upload successfully stay in the store even when siblings
    /// fail; the returned aggregate lists only the failed names.
    pub async fn bulk_upload(&self, bucket: &str, items: Vec<UploadItem>) -> Result<(), TransferError> {
        let started = Instant::now();
        let total = items.len();

        if !self.check_bucket(bucket).await? {
            debug!("BucketCheck: creating missing bucket '{}'", bucket);
            self.gateway
                .create_bucket(bucket)
                .await
                .map_err(|source| TransferError::CreateBucket {
                    bucket: bucket.to_string(),
                    source,
                })?;
        }

        debug!("FanOut: {} uploads to '{}'", total, bucket);
        let errors = Arc::new(BulkError::new(BULK_UPLOAD_ERROR_MSG));
        let limiter = self.limiter();
        let mut workers = JoinSet::new();
        let mut task_names = HashMap::with_capacity(total);

        for item in items {
            let task_name = item.name.clone();
            let gateway = Arc::clone(&self.gateway);
            let bucket = bucket.to_string();
            let errors = Arc::clone(&errors);
            let limiter = limiter.clone();

            let handle = workers.spawn(async move {
                let outcome =
                    run_item(limiter, transfer::upload_object(gateway.as_ref(), &bucket, &item)).await;
                if let Err(e) = outcome {
                    warn!("PUT {}/{} failed: {:#}", bucket, item.name, e);
                    errors.add_failure(item.name, e);
                }
            });
            task_names.insert(handle.id(), task_name);
        }

        debug!("Joining {} upload workers", total);
        join_all(&mut workers, &task_names, &errors).await;

        let errors = into_owned_errors(errors);
        info!(
            "Bulk upload to '{}': {} of {} objects stored in {:.2?}",
            bucket,
            total - errors.len(),
            total,
            started.elapsed()
        );
        if errors.is_empty() {
            Ok(())
        } else {
            Err(TransferError::Bulk(errors))
        }
    }

    // -------------------------------------------------------------------------
    // Pass-through operations
    // -------------------------------------------------------------------------

    pub async fn bucket_exists(&self, bucket: &str) -> Result<bool, TransferError> {
        self.gateway.bucket_exists(bucket).await.map_err(TransferError::Gateway)
    }

    pub async fn create_bucket(&self, bucket: &str) -> Result<(), TransferError> {
        self.gateway.create_bucket(bucket).await.map_err(TransferError::Gateway)
    }

    pub async fn delete_bucket(&self, bucket: &str) -> Result<(), TransferError> {
        self.gateway.delete_bucket(bucket).await.map_err(TransferError::Gateway)
    }

    /// Open a single object as a stream.
    pub async fn get_object(&self, bucket: &str, name: &str) -> Result<ObjectReader, TransferError> {
        self.gateway.open_object(bucket, name).await.map_err(TransferError::Gateway)
    }

    /// Fetch a single object into memory.
    pub async fn get_object_bytes(&self, bucket: &str, name: &str) -> Result<Bytes, TransferError> {
        transfer::download_object(self.gateway.as_ref(), bucket, name)
            .await
            .map_err(TransferError::Gateway)
    }

    pub async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<(), TransferError> {
        self.gateway
            .put_object(bucket, name, body, size)
            .await
            .map_err(TransferError::Gateway)
    }
}

impl std::fmt::Debug for StorageClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClient")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
