// src/config.rs
//
// Connection settings for the S3 gateway plus per-client bulk options.
// Values come from an explicit struct or from the environment (.env honoured).

use std::env;
use std::time::Duration;

use crate::constants::{
    DEFAULT_OPERATION_TIMEOUT_SECS, DEFAULT_REGION, ENV_ACCESS_KEY_ID, ENV_AWS_ENDPOINT_URL,
    ENV_ENDPOINT, ENV_MAX_IN_FLIGHT, ENV_OPERATION_TIMEOUT_SECS, ENV_REGION,
    ENV_SECRET_ACCESS_KEY, ENV_SECURE, ENV_SESSION_TOKEN,
};
use crate::error::TransferError;

/// Everything needed to reach an S3-compatible endpoint.
#[derive(Clone, Default)]
pub struct StorageClientConfig {
    /// `host[:port]`, optionally prefixed with `http://` or `https://`.
    pub endpoint: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Use TLS. Ignored when the endpoint carries its own scheme.
    pub secure: bool,
    pub session_token: Option<String>,
    pub region: Option<String>,
    pub operation_timeout: Option<Duration>,
}

impl std::fmt::Debug for StorageClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageClientConfig")
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("secure", &self.secure)
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("region", &self.region)
            .field("operation_timeout", &self.operation_timeout)
            .finish()
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" | "enable" => Some(true),
        "false" | "0" | "no" | "off" | "disable" => Some(false),
        _ => None,
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl StorageClientConfig {
    /// Build from `S3BULK_*` / `AWS_*` variables, after loading `.env` if present.
    pub fn from_env() -> Result<Self, TransferError> {
        Self::from_env_with_endpoint(None)
    }

    /// As [`Self::from_env`], but `endpoint` (when given) wins over the environment.
    pub fn from_env_with_endpoint(endpoint: Option<&str>) -> Result<Self, TransferError> {
        dotenvy::dotenv().ok();

        let (access_key_id, secret_access_key) =
            match (non_empty_var(ENV_ACCESS_KEY_ID), non_empty_var(ENV_SECRET_ACCESS_KEY)) {
                (Some(a), Some(s)) => (a, s),
                _ => {
                    return Err(TransferError::Config(format!(
                        "Missing required environment variables: {} and/or {}",
                        ENV_ACCESS_KEY_ID, ENV_SECRET_ACCESS_KEY
                    )))
                }
            };

        let endpoint = endpoint
            .map(str::to_string)
            .or_else(|| non_empty_var(ENV_ENDPOINT))
            .or_else(|| non_empty_var(ENV_AWS_ENDPOINT_URL))
            .ok_or_else(|| {
                TransferError::Config(format!("Missing endpoint: set {} or {}", ENV_ENDPOINT, ENV_AWS_ENDPOINT_URL))
            })?;

        let secure = match non_empty_var(ENV_SECURE) {
            Some(v) => parse_bool(&v)
                .ok_or_else(|| TransferError::Config(format!("{ENV_SECURE}: not a boolean: {v}")))?,
            None => !endpoint.starts_with("http://"),
        };

        let operation_timeout = match non_empty_var(ENV_OPERATION_TIMEOUT_SECS) {
            Some(v) => Some(Duration::from_secs(v.trim().parse().map_err(|_| {
                TransferError::Config(format!("{ENV_OPERATION_TIMEOUT_SECS}: not a number: {v}"))
            })?)),
            None => None,
        };

        let cfg = Self {
            endpoint,
            access_key_id,
            secret_access_key,
            secure,
            session_token: non_empty_var(ENV_SESSION_TOKEN),
            region: non_empty_var(ENV_REGION),
            operation_timeout,
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject endpoints the SDK could not connect to.
    pub fn validate(&self) -> Result<(), TransferError> {
        let endpoint = self.endpoint.trim();
        if endpoint.is_empty() {
            return Err(TransferError::Config("endpoint is empty".into()));
        }

        let authority = match endpoint.split_once("://") {
            Some(("http", rest)) | Some(("https", rest)) => rest,
            Some((scheme, _)) => {
                return Err(TransferError::Config(format!("unsupported endpoint scheme '{scheme}'")))
            }
            None => endpoint,
        };
        let authority = authority.trim_end_matches('/');

        if authority.is_empty() || authority.contains(char::is_whitespace) || authority.contains('/') {
            return Err(TransferError::Config(format!("invalid endpoint '{}'", self.endpoint)));
        }
        if let Some((host, port)) = authority.rsplit_once(':') {
            if host.is_empty() || port.parse::<u16>().is_err() {
                return Err(TransferError::Config(format!("invalid endpoint '{}'", self.endpoint)));
            }
        }
        if self.access_key_id.is_empty() || self.secret_access_key.is_empty() {
            return Err(TransferError::Config("access key and secret key are required".into()));
        }
        Ok(())
    }

    /// Endpoint as a URL, with scheme derived from `secure` when absent.
    pub fn endpoint_url(&self) -> String {
        let endpoint = self.endpoint.trim().trim_end_matches('/');
        if endpoint.contains("://") {
            endpoint.to_string()
        } else if self.secure {
            format!("https://{endpoint}")
        } else {
            format!("http://{endpoint}")
        }
    }

    pub fn region(&self) -> &str {
        self.region.as_deref().unwrap_or(DEFAULT_REGION)
    }

    pub fn operation_timeout(&self) -> Duration {
        self.operation_timeout
            .unwrap_or(Duration::from_secs(DEFAULT_OPERATION_TIMEOUT_SECS))
    }
}

/// Knobs for bulk calls made through one client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientOptions {
    /// Upper bound on concurrently running transfers per bulk call.
    /// `None` runs every item at once.
    pub max_in_flight: Option<usize>,
}

impl ClientOptions {
    pub fn from_env() -> Result<Self, TransferError> {
        let max_in_flight = match non_empty_var(ENV_MAX_IN_FLIGHT) {
            Some(v) => Some(v.trim().parse::<usize>().map_err(|_| {
                TransferError::Config(format!("{ENV_MAX_IN_FLIGHT}: not a number: {v}"))
            })?),
            None => None,
        };
        let opts = Self { max_in_flight };
        opts.validate()?;
        Ok(opts)
    }

    pub fn validate(&self) -> Result<(), TransferError> {
        if self.max_in_flight == Some(0) {
            return Err(TransferError::Config("max_in_flight must be at least 1".into()));
        }
        Ok(())
    }
}
