// src/constants.rs
//
// Centralized constants for s3bulk to avoid hardcoded values throughout the codebase

/// Region used when neither the config nor the environment names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// SDK connect timeout (seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// SDK per-operation timeout (seconds), overridable via `ENV_OPERATION_TIMEOUT_SECS`
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 120;

/// Prefix of the aggregate error returned by a failed bulk download
pub const BULK_DOWNLOAD_ERROR_MSG: &str = "failed to get following files:";

/// Prefix of the aggregate error returned by a failed bulk upload
pub const BULK_UPLOAD_ERROR_MSG: &str = "failed to upload files:";

// ============================================================================
// Environment variables
// ============================================================================

pub const ENV_ENDPOINT: &str = "S3BULK_ENDPOINT";
pub const ENV_AWS_ENDPOINT_URL: &str = "AWS_ENDPOINT_URL";
pub const ENV_ACCESS_KEY_ID: &str = "AWS_ACCESS_KEY_ID";
pub const ENV_SECRET_ACCESS_KEY: &str = "AWS_SECRET_ACCESS_KEY";
pub const ENV_SESSION_TOKEN: &str = "AWS_SESSION_TOKEN";
pub const ENV_REGION: &str = "AWS_REGION";
pub const ENV_SECURE: &str = "S3BULK_SECURE";
pub const ENV_MAX_IN_FLIGHT: &str = "S3BULK_MAX_IN_FLIGHT";
pub const ENV_OPERATION_TIMEOUT_SECS: &str = "S3BULK_OPERATION_TIMEOUT_SECS";
