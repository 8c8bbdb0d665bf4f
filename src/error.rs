// src/error.rs
//
// Call-level error type for bulk and pass-through operations.

use thiserror::Error;
use anyhow::Error as AnyError;

use crate::accumulator::BulkError;

/// Error returned by [`crate::StorageClient`] operations.
///
/// Precondition failures (`BucketCheck`, `BucketNotFound`, `CreateBucket`)
/// abort a bulk call before any per-item work starts and are never folded
/// into the aggregate. Per-item failures only surface through `Bulk`.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to check bucket '{bucket}': {source:#}")]
    BucketCheck {
        bucket: String,
        #[source]
        source: AnyError,
    },

    #[error("bucket '{0}' does not exist")]
    BucketNotFound(String),

    #[error("failed to create bucket '{bucket}': {source:#}")]
    CreateBucket {
        bucket: String,
        #[source]
        source: AnyError,
    },

    #[error(transparent)]
    Bulk(#[from] BulkError),

    #[error(transparent)]
    Gateway(AnyError),
}

impl TransferError {
    /// The aggregate, if this is a per-item failure report.
    pub fn as_bulk(&self) -> Option<&BulkError> {
        match self {
            TransferError::Bulk(e) => Some(e),
            _ => None,
        }
    }
}
