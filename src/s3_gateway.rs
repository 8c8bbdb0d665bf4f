// src/s3_gateway.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
//! StorageGateway backed by the async AWS Rust SDK.
//!
//! Built once from a [`StorageClientConfig`]: static credentials, explicit
//! endpoint, path-style addressing for S3-compatible services (MinIO, Ceph, ...).

use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::timeout::TimeoutConfig;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::config::StorageClientConfig;
use crate::constants::{DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_REGION};
use crate::gateway::{check_declared_size, ObjectReader, StorageGateway};

/// S3 adapter over a single SDK client.
#[derive(Clone, Debug)]
pub struct S3Gateway {
    client: Client,
    region: String,
}

impl S3Gateway {
    /// Build the SDK client described by `cfg`. Fails on an invalid endpoint.
    pub async fn connect(cfg: &StorageClientConfig) -> Result<Self> {
        cfg.validate()?;

        let endpoint = cfg.endpoint_url();
        let region = cfg.region().to_string();
        debug!("Connecting S3 gateway: endpoint={}, region={}", endpoint, region);

        let credentials = Credentials::new(
            cfg.access_key_id.clone(),
            cfg.secret_access_key.clone(),
            cfg.session_token.clone(),
            None,
            "s3bulk-static",
        );

        let timeout_config = TimeoutConfig::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .operation_timeout(cfg.operation_timeout())
            .build();

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(endpoint)
            .timeout_config(timeout_config)
            .load()
            .await;

        // Virtual-hosted style (bucket.endpoint) doesn't work with custom endpoints.
        let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: Client::from_conf(s3_config),
            region,
        })
    }

    /// Wrap an already configured SDK client.
    pub fn from_client(client: Client) -> Self {
        let region = client
            .config()
            .region()
            .map(|r| r.to_string())
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        Self { client, region }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl StorageGateway for S3Gateway {
    async fn bucket_exists(&self, bucket: &str) -> Result<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) if e.as_service_error().is_some_and(|se| se.is_not_found()) => Ok(false),
            Err(e) => Err(anyhow::Error::new(e).context(format!("head_bucket '{bucket}' failed"))),
        }
    }

    async fn create_bucket(&self, bucket: &str) -> Result<()> {
        let mut req = self.client.create_bucket().bucket(bucket);
        // us-east-1 is the only region that rejects an explicit location constraint
        if self.region != DEFAULT_REGION {
            req = req.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                    .build(),
            );
        }
        req.send()
            .await
            .with_context(|| format!("create_bucket '{bucket}' failed"))?;
        debug!("Created bucket {}", bucket);
        Ok(())
    }

    async fn delete_bucket(&self, bucket: &str) -> Result<()> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .with_context(|| format!("delete_bucket '{bucket}' failed"))?;
        debug!("Deleted bucket {}", bucket);
        Ok(())
    }

    async fn open_object(&self, bucket: &str, name: &str) -> Result<ObjectReader> {
        let resp = self
            .client
            .get_object()
            .bucket(bucket)
            .key(name)
            .send()
            .await
            .with_context(|| format!("get_object '{bucket}/{name}' failed"))?;
        Ok(Box::pin(resp.body.into_async_read()))
    }

    async fn put_object(&self, bucket: &str, name: &str, body: Bytes, size: u64) -> Result<()> {
        check_declared_size(name, &body, size)?;
        self.client
            .put_object()
            .bucket(bucket)
            .key(name)
            .content_length(size as i64)
            .body(ByteStream::from(body))
            .send()
            .await
            .with_context(|| format!("put_object '{bucket}/{name}' failed"))?;
        Ok(())
    }
}
