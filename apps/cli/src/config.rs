//! Command-line arguments and TOML configuration.
//!
//! A config file holds the same fields as [`UploadConfig`]; anything given
//! on the command line wins over the file.
//!
//! ```toml
//! endpoint = "https://example.com/upload"
//! file = "/data/backup.tar"
//! chunk_size = 8
//! retries = 3
//!
//! [headers]
//! authorization = "Bearer ..."
//!
//! [post_params]
//! folder = "backups"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chunkup_uploader::UploadConfig;
use clap::Parser;
use serde::{Deserialize, Serialize};

/// Upload a large file to an HTTP endpoint in sequential chunks.
#[derive(Debug, Parser)]
#[command(name = "chunkup", version)]
pub struct Args {
    /// File to upload.
    pub file: Option<PathBuf>,

    /// URL every chunk is POSTed to.
    #[arg(short, long, env = "CHUNKUP_ENDPOINT")]
    pub endpoint: Option<String>,

    /// TOML file with upload settings.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Extra request header, as NAME=VALUE (repeatable).
    #[arg(short = 'H', long = "header", value_parser = parse_key_value)]
    pub headers: Vec<(String, String)>,

    /// Form field sent with the last chunk, as NAME=VALUE (repeatable).
    #[arg(short = 'p', long = "param", value_parser = parse_key_value)]
    pub post_params: Vec<(String, String)>,

    /// Chunk size in MiB.
    #[arg(long)]
    pub chunk_size: Option<f64>,

    /// Retries per chunk before giving up.
    #[arg(long)]
    pub retries: Option<u32>,

    /// Seconds to wait before retrying a chunk.
    #[arg(long = "delay")]
    pub delay_before_retry: Option<f64>,

    /// Per-chunk request timeout in milliseconds.
    #[arg(long = "timeout")]
    pub chunk_timeout: Option<u64>,

    /// Log every chunk.
    #[arg(short, long)]
    pub verbose: bool,
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    let (key, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got {s:?}"))?;
    if key.is_empty() {
        return Err(format!("empty name in {s:?}"));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Upload settings as read from a TOML file. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub file: Option<PathBuf>,
    pub headers: BTreeMap<String, String>,
    pub post_params: BTreeMap<String, String>,
    pub chunk_size: Option<f64>,
    pub retries: Option<u32>,
    pub delay_before_retry: Option<f64>,
    pub verbose: Option<bool>,
    pub chunk_timeout: Option<u64>,
}

impl FileConfig {
    /// Loads settings from a TOML file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: FileConfig = toml::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        tracing::debug!(path = %path.display(), "configuration loaded");
        Ok(config)
    }
}

/// Merges the command line over the config file into an [`UploadConfig`].
pub fn resolve(args: Args, file: FileConfig) -> anyhow::Result<UploadConfig> {
    let endpoint = args
        .endpoint
        .or(file.endpoint)
        .context("no endpoint given (use --endpoint or set it in the config file)")?;
    let path = args
        .file
        .or(file.file)
        .context("no file given (pass it as an argument or set it in the config file)")?;

    let mut config = UploadConfig::new(endpoint, path);
    config.headers = file.headers;
    config.headers.extend(args.headers);
    config.post_params = file.post_params;
    config.post_params.extend(args.post_params);

    if let Some(v) = args.chunk_size.or(file.chunk_size) {
        config.chunk_size = v;
    }
    if let Some(v) = args.retries.or(file.retries) {
        config.retries = v;
    }
    if let Some(v) = args.delay_before_retry.or(file.delay_before_retry) {
        config.delay_before_retry = v;
    }
    if let Some(v) = args.chunk_timeout.or(file.chunk_timeout) {
        config.chunk_timeout = v;
    }
    config.verbose = args.verbose || file.verbose.unwrap_or(false);

    Ok(config)
}
