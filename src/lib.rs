// src/lib.rs
//
// Copyright, 2025.  Signal65 / Futurum Group.
//
// Crate root: module list and public re-exports.

pub mod constants;
pub mod config;
pub mod error;
pub mod accumulator;
pub mod gateway;
pub mod transfer;
pub mod client;

// Storage backends
pub mod s3_gateway;
pub mod file_gateway;
pub mod memory_gateway;

pub use accumulator::{BulkError, BulkResult};
pub use client::StorageClient;
pub use config::{ClientOptions, StorageClientConfig};
pub use error::TransferError;
pub use gateway::{infer_scheme, ObjectReader, Scheme, StorageGateway};
pub use transfer::{ByteSource, BytesSource, FileSource, UploadItem};

pub use file_gateway::FileSystemGateway;
pub use memory_gateway::MemoryGateway;
pub use s3_gateway::S3Gateway;
