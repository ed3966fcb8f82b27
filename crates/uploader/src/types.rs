//! Data types for the upload flow.

/// Where the controller is in its send/classify cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TransferState {
    /// Constructed, not yet run.
    #[default]
    Idle,
    /// A chunk is being read or is in flight.
    Sending,
    /// Waiting out the delay before resending the current chunk.
    Retrying,
    /// The previous chunk was accepted; moving to the next one.
    Advancing,
    /// Every chunk was accepted.
    Finished,
    /// The run ended with an error.
    Failed,
}

impl TransferState {
    /// Returns `true` for `Finished` and `Failed`.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Failed)
    }
}

/// Event emitted during an upload run.
///
/// Exactly one of `Finished` or `Failed` ends every run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadEvent {
    /// Percentage of chunks accepted by the server (0-100).
    Progress { percent: u8 },
    /// A chunk failed transiently and will be resent after the delay.
    Retry {
        message: String,
        chunk_index: u64,
        retries_left: u32,
    },
    /// All chunks were accepted.
    Finished,
    /// The upload stopped for good.
    Failed { error: String },
}

impl UploadEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Finished | Self::Failed { .. })
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSummary {
    pub file_id: String,
    pub total_chunks: u64,
    pub bytes_sent: u64,
    /// Retries consumed over the whole run.
    pub retries: u32,
}
