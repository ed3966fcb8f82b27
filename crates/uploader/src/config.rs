//! Upload configuration and its up-front validation.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use chunkup_transfer::MIB;
use reqwest::Url;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};

use crate::error::UploadError;

/// Default chunk size in MiB.
pub const DEFAULT_CHUNK_SIZE_MIB: f64 = 10.0;

/// Default retry budget per chunk.
pub const DEFAULT_RETRIES: u32 = 5;

/// Default delay before retrying a chunk, in seconds.
pub const DEFAULT_RETRY_DELAY_SECS: f64 = 5.0;

/// Default per-chunk request timeout, in milliseconds (1 hour).
pub const DEFAULT_CHUNK_TIMEOUT_MS: u64 = 60 * 60 * 1000;

/// Settings for one upload run.
///
/// Units follow the wire-level conventions: `chunk_size` in MiB,
/// `delay_before_retry` in seconds, `chunk_timeout` in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadConfig {
    /// URL every chunk is POSTed to.
    pub endpoint: String,
    /// Local file to upload.
    pub file: PathBuf,
    /// Extra headers sent with every chunk.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Form fields sent with the last chunk only.
    #[serde(default)]
    pub post_params: BTreeMap<String, String>,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: f64,
    #[serde(default = "default_retries")]
    pub retries: u32,
    #[serde(default = "default_retry_delay")]
    pub delay_before_retry: f64,
    /// Enables per-chunk diagnostic logging.
    #[serde(default)]
    pub verbose: bool,
    #[serde(default = "default_chunk_timeout")]
    pub chunk_timeout: u64,
}

fn default_chunk_size() -> f64 {
    DEFAULT_CHUNK_SIZE_MIB
}

fn default_retries() -> u32 {
    DEFAULT_RETRIES
}

fn default_retry_delay() -> f64 {
    DEFAULT_RETRY_DELAY_SECS
}

fn default_chunk_timeout() -> u64 {
    DEFAULT_CHUNK_TIMEOUT_MS
}

impl UploadConfig {
    /// Creates a config with default tuning for `endpoint` and `file`.
    pub fn new(endpoint: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            endpoint: endpoint.into(),
            file: file.into(),
            headers: BTreeMap::new(),
            post_params: BTreeMap::new(),
            chunk_size: DEFAULT_CHUNK_SIZE_MIB,
            retries: DEFAULT_RETRIES,
            delay_before_retry: DEFAULT_RETRY_DELAY_SECS,
            verbose: false,
            chunk_timeout: DEFAULT_CHUNK_TIMEOUT_MS,
        }
    }

    /// Chunk size in bytes (at least 1).
    pub fn chunk_size_bytes(&self) -> u64 {
        ((self.chunk_size * MIB as f64).round() as u64).max(1)
    }

    /// Delay between a transient failure and the retry.
    ///
    /// Only meaningful on a validated config; values too large for a
    /// `Duration` saturate.
    pub fn retry_delay(&self) -> Duration {
        Duration::try_from_secs_f64(self.delay_before_retry.max(0.0)).unwrap_or(Duration::MAX)
    }

    /// Upper bound on a single chunk request.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.chunk_timeout)
    }

    /// Checks every field before any I/O happens.
    ///
    /// Rejects:
    /// - An empty or non-HTTP(S) endpoint
    /// - An empty or non-UTF-8 file path
    /// - Header names or values that cannot go on the wire
    /// - Empty post-parameter names
    /// - Non-positive chunk size, retry count, retry delay or timeout
    pub fn validate(&self) -> Result<(), UploadError> {
        validate_endpoint(&self.endpoint)?;

        match self.file.to_str() {
            None => {
                return Err(UploadError::Config(format!(
                    "file path is not valid UTF-8: {}",
                    self.file.display()
                )));
            }
            Some("") => return Err(UploadError::Config("file path is empty".into())),
            Some(_) => {}
        }

        for (name, value) in &self.headers {
            HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| UploadError::Config(format!("invalid header name: {name:?}")))?;
            HeaderValue::from_str(value).map_err(|_| {
                UploadError::Config(format!("invalid value for header {name:?}"))
            })?;
        }

        if self.post_params.keys().any(|k| k.is_empty()) {
            return Err(UploadError::Config("post parameter name is empty".into()));
        }

        if !(self.chunk_size.is_finite() && self.chunk_size > 0.0) {
            return Err(UploadError::Config(format!(
                "chunk size must be a positive number of MiB, got {}",
                self.chunk_size
            )));
        }
        if self.retries == 0 {
            return Err(UploadError::Config("retries must be positive".into()));
        }
        if !(self.delay_before_retry.is_finite() && self.delay_before_retry > 0.0) {
            return Err(UploadError::Config(format!(
                "retry delay must be a positive number of seconds, got {}",
                self.delay_before_retry
            )));
        }
        if Duration::try_from_secs_f64(self.delay_before_retry).is_err() {
            return Err(UploadError::Config(format!(
                "retry delay is too large: {} seconds",
                self.delay_before_retry
            )));
        }
        if self.chunk_timeout == 0 {
            return Err(UploadError::Config("chunk timeout must be positive".into()));
        }

        Ok(())
    }
}

fn validate_endpoint(endpoint: &str) -> Result<(), UploadError> {
    if endpoint.trim().is_empty() {
        return Err(UploadError::Config("endpoint is empty".into()));
    }

    let url = Url::parse(endpoint)
        .map_err(|e| UploadError::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(UploadError::Config(format!(
            "unsupported endpoint scheme: {other}"
        ))),
    }
}
