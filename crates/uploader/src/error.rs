//! Upload error types.

use std::time::Duration;

/// Failure of a single chunk request below the HTTP status level.
///
/// Every variant is treated as transient by the controller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("network error: {0}")]
    Network(String),
}

/// Errors produced by an upload run.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("HTTP client error: {0}")]
    Client(#[from] reqwest::Error),

    #[error("transfer error: {0}")]
    Transfer(#[from] chunkup_transfer::TransferError),

    #[error("server responded with status {status} for chunk {chunk}, stopping upload")]
    Rejected { chunk: u64, status: u16 },

    #[error("chunk {chunk} failed after {retries} retries, no retries left: {last}")]
    RetriesExhausted {
        chunk: u64,
        retries: u32,
        last: String,
    },

    #[error("upload cancelled")]
    Cancelled,

    #[error("uploader has already run")]
    AlreadyRun,
}
