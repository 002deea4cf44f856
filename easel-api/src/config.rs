use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("auth.jwt_secret must be at least 32 bytes")]
    WeakSecret,

    #[error("auth.pbkdf2_iterations must be at least 1000")]
    LowIterationCount,

    #[error("auth.min_password_len must be at least 8")]
    LowPasswordLength,

    #[error("limits.max_payload_bytes cannot be 0")]
    ZeroPayloadLimit,

    #[error("limits.rate_limit values cannot be 0")]
    ZeroRateLimit,

    #[error("thumbnails.max_total_bytes cannot be 0")]
    ZeroThumbnailBudget,
}

/// Server configuration, the `server:` section of the config file.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Config {
    /// Listener for the public API
    pub listener: Listener,
    /// SQLite database location
    pub database: DatabaseConfig,
    /// Blob store root directory
    pub blobs: BlobsConfig,
    /// Secrets and credential parameters
    pub auth: AuthConfig,
    /// Request body and rate limits
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Thumbnail storage budget
    #[serde(default)]
    pub thumbnails: ThumbnailsConfig,
}

impl Config {
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.auth.jwt_secret.len() < 32 {
            return Err(ValidationError::WeakSecret);
        }
        if self.auth.pbkdf2_iterations < 1000 {
            return Err(ValidationError::LowIterationCount);
        }
        if self.auth.min_password_len < 8 {
            return Err(ValidationError::LowPasswordLength);
        }
        if self.limits.max_payload_bytes == 0 {
            return Err(ValidationError::ZeroPayloadLimit);
        }
        if self.limits.rate_limit.window_secs == 0 || self.limits.rate_limit.max_requests == 0 {
            return Err(ValidationError::ZeroRateLimit);
        }
        if self.thumbnails.max_total_bytes == 0 {
            return Err(ValidationError::ZeroThumbnailBudget);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct BlobsConfig {
    pub path: PathBuf,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// HMAC secret for JWT signing. Rotating it invalidates all sessions.
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    #[serde(default = "default_min_password_len")]
    pub min_password_len: usize,
    #[serde(default = "default_pbkdf2_iterations")]
    pub pbkdf2_iterations: u32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Cap on request bodies, which bounds drawing payloads.
    pub max_payload_bytes: usize,
    pub rate_limit: RateLimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        LimitsConfig {
            max_payload_bytes: 2 * 1024 * 1024,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// Fixed-window limit applied to the credential endpoints, keyed by client.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitConfig {
    pub window_secs: u64,
    pub max_requests: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        RateLimitConfig {
            window_secs: 60,
            max_requests: 10,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ThumbnailsConfig {
    /// Total bytes of stored thumbnails before least-recently-used entries
    /// are evicted.
    pub max_total_bytes: u64,
}

impl Default for ThumbnailsConfig {
    fn default() -> Self {
        ThumbnailsConfig {
            max_total_bytes: 64 * 1024 * 1024,
        }
    }
}

fn default_token_ttl() -> u64 {
    86_400
}

fn default_min_password_len() -> usize {
    8
}

fn default_pbkdf2_iterations() -> u32 {
    310_000
}
