//! Fixed-size chunk reading and per-run transfer session state.
//!
//! The reader hands out a file as a sequence of [`Chunk`]s, and the
//! [`TransferSession`] tracks which chunk is current, how many retries it
//! has consumed, and how far along the run is.

mod chunked;
mod types;

pub use chunked::{ChunkReader, total_chunks};
pub use types::{Chunk, TransferSession, generate_file_id, progress_percent};

/// Bytes in one mebibyte; chunk sizes are configured in MiB.
pub const MIB: u64 = 1024 * 1024;

/// Default chunk size: 10 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * MIB;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("read failed at offset {offset}: {source}")]
    Read {
        offset: u64,
        #[source]
        source: std::io::Error,
    },

    #[error("reader already closed")]
    Closed,
}
