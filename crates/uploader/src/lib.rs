//! Sequential chunked HTTP upload with retry and progress events.
//!
//! This crate implements the **transfer control loop**: it reads a local
//! file chunk by chunk, POSTs each chunk as multipart form data, and
//! decides after every response whether to advance, retry the same chunk,
//! or stop. The HTTP call sits behind [`ChunkTransport`] so the loop can
//! be driven by a mock in tests.
//!
//! # Pipeline
//!
//! 1. **Validate**: check the [`UploadConfig`] before any I/O
//! 2. **Open**: open the source file and size the session
//! 3. **Send**: one chunk in flight at a time, with a per-chunk timeout
//! 4. **Classify**: success advances, transient failures retry after a
//!    delay, anything else ends the run
//! 5. **Finish**: post parameters ride along with the last chunk
//!
//! Observers read [`UploadEvent`]s from the channel returned by
//! [`Uploader::take_events`].

pub mod config;
pub mod controller;
pub mod error;
pub mod sender;
pub mod transport;
pub mod types;

// Re-export primary types for convenience.
pub use config::UploadConfig;
pub use controller::{StatusClass, Uploader, classify_status};
pub use error::{TransportError, UploadError};
pub use sender::{CHUNK_NUMBER_HEADER, CHUNKS_TOTAL_HEADER, ChunkSender, FILE_ID_HEADER};
pub use transport::{ChunkRequest, ChunkTransport, HttpTransport};
pub use types::{TransferState, UploadEvent, UploadSummary};
