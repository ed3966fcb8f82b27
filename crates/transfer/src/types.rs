use std::time::{SystemTime, UNIX_EPOCH};

use crate::chunked::total_chunks;

/// A chunk of file data for transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Zero-based position of this chunk in the file.
    pub index: u64,
    /// Byte offset within the file.
    pub offset: u64,
    /// Raw chunk data.
    pub data: Vec<u8>,
    /// `true` for the final chunk of the file.
    pub is_last: bool,
}

impl Chunk {
    /// Size of this chunk in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Builds an identifier for one logical upload.
///
/// Combines the file size, the current wall-clock time and a random
/// value so concurrent uploads of equally sized files still get distinct
/// server-side namespaces.
pub fn generate_file_id(file_size: u64) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    format!("{file_size}-{millis}-{:08x}", rand::random::<u32>())
}

/// Integer percentage of `done` out of `total`, rounded half up.
///
/// An empty transfer counts as complete.
pub fn progress_percent(done: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    let done = done.min(total) as u128;
    let total = total as u128;
    ((200 * done + total) / (2 * total)) as u8
}

/// State of one upload run: which chunk is current and how many retries
/// it has used.
///
/// `file_id` and `total_chunks` are fixed at construction.
#[derive(Debug, Clone)]
pub struct TransferSession {
    file_id: String,
    file_size: u64,
    chunk_size: u64,
    total_chunks: u64,
    current_chunk: u64,
    retries_used: u32,
    total_retries: u32,
    bytes_accepted: u64,
}

impl TransferSession {
    /// Creates a session with a freshly generated file ID.
    pub fn new(file_size: u64, chunk_size: u64) -> Self {
        Self::with_file_id(generate_file_id(file_size), file_size, chunk_size)
    }

    /// Creates a session with a caller-chosen file ID.
    pub fn with_file_id(file_id: String, file_size: u64, chunk_size: u64) -> Self {
        Self {
            file_id,
            file_size,
            chunk_size,
            total_chunks: total_chunks(file_size, chunk_size),
            current_chunk: 0,
            retries_used: 0,
            total_retries: 0,
            bytes_accepted: 0,
        }
    }

    pub fn file_id(&self) -> &str {
        &self.file_id
    }

    pub fn file_size(&self) -> u64 {
        self.file_size
    }

    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Index of the chunk awaiting acknowledgement.
    pub fn current_chunk(&self) -> u64 {
        self.current_chunk
    }

    /// Failures recorded against the current chunk.
    pub fn retries_used(&self) -> u32 {
        self.retries_used
    }

    /// Failures recorded over the whole run.
    pub fn total_retries(&self) -> u32 {
        self.total_retries
    }

    /// Bytes acknowledged by the server so far.
    pub fn bytes_accepted(&self) -> u64 {
        self.bytes_accepted
    }

    /// Returns `true` if the current chunk is the final one.
    pub fn is_last_chunk(&self) -> bool {
        self.current_chunk + 1 == self.total_chunks
    }

    /// Returns `true` once every chunk has been accepted.
    pub fn is_complete(&self) -> bool {
        self.current_chunk >= self.total_chunks
    }

    /// Records acceptance of the current chunk and moves to the next one.
    ///
    /// Resets the per-chunk retry counter and returns the new progress.
    pub fn accept(&mut self, bytes: u64) -> u8 {
        if self.current_chunk < self.total_chunks {
            self.current_chunk += 1;
        }
        self.bytes_accepted += bytes;
        self.retries_used = 0;
        self.progress()
    }

    /// Records a transient failure of the current chunk and returns the
    /// number of failures it has now accumulated.
    pub fn record_failure(&mut self) -> u32 {
        self.retries_used = self.retries_used.saturating_add(1);
        self.total_retries = self.total_retries.saturating_add(1);
        self.retries_used
    }

    /// Retries still available for the current chunk under `budget`.
    pub fn retries_left(&self, budget: u32) -> u32 {
        budget.saturating_sub(self.retries_used)
    }

    /// Percentage of chunks accepted.
    pub fn progress(&self) -> u8 {
        progress_percent(self.current_chunk, self.total_chunks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_session_starts_at_first_chunk() {
        let session = TransferSession::new(25, 10);
        assert_eq!(session.total_chunks(), 3);
        assert_eq!(session.current_chunk(), 0);
        assert_eq!(session.retries_used(), 0);
        assert!(!session.is_last_chunk());
        assert!(!session.is_complete());
        assert!(session.file_id().starts_with("25-"));
    }

    #[test]
    fn file_ids_differ_between_sessions() {
        let a = generate_file_id(1024);
        let b = generate_file_id(1024);
        assert_ne!(a, b);
        assert_eq!(a.split('-').count(), 3);
    }

    #[test]
    fn accept_advances_and_reports_progress() {
        let mut session = TransferSession::with_file_id("id".into(), 25, 10);
        assert_eq!(session.accept(10), 33);
        assert_eq!(session.current_chunk(), 1);
        assert_eq!(session.accept(10), 67);
        assert!(session.is_last_chunk());
        assert_eq!(session.accept(5), 100);
        assert!(session.is_complete());
        assert_eq!(session.bytes_accepted(), 25);
        assert_eq!(session.file_id(), "id");
    }

    #[test]
    fn accept_never_passes_total() {
        let mut session = TransferSession::with_file_id("id".into(), 4, 4);
        session.accept(4);
        session.accept(0);
        assert_eq!(session.current_chunk(), session.total_chunks());
    }

    #[test]
    fn failures_reset_on_accept() {
        let mut session = TransferSession::with_file_id("id".into(), 20, 10);
        assert_eq!(session.record_failure(), 1);
        assert_eq!(session.record_failure(), 2);
        assert_eq!(session.retries_left(5), 3);
        assert_eq!(session.retries_left(1), 0);

        session.accept(10);
        assert_eq!(session.retries_used(), 0);
        assert_eq!(session.retries_left(5), 5);
        assert_eq!(session.total_retries(), 2);
    }

    #[test]
    fn progress_percent_rounds() {
        assert_eq!(progress_percent(0, 3), 0);
        assert_eq!(progress_percent(1, 3), 33);
        assert_eq!(progress_percent(2, 3), 67);
        assert_eq!(progress_percent(1, 8), 13);
        assert_eq!(progress_percent(3, 3), 100);
        assert_eq!(progress_percent(5, 3), 100);
    }

    #[test]
    fn empty_transfer_is_complete() {
        let session = TransferSession::new(0, 10);
        assert_eq!(session.total_chunks(), 0);
        assert!(session.is_complete());
        assert_eq!(session.progress(), 100);
    }

    #[test]
    fn progress_is_non_decreasing() {
        let mut session = TransferSession::with_file_id("id".into(), 1000, 7);
        let mut last = session.progress();
        while !session.is_complete() {
            let p = session.accept(7);
            assert!(p >= last);
            last = p;
        }
        assert_eq!(last, 100);
    }
}
